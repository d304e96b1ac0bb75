use axum::{extract::State, Json};

use crate::{
    error::OraError,
    models::{
        api::{CollectionView, LoadCollectionRequest},
        ora::Ora,
    },
    services::filter_store::available_trait_values,
    AppState,
};

/// Handler for GET /api/collection
pub async fn get_collection(State(state): State<AppState>) -> Json<CollectionView> {
    Json(build_view(&state))
}

/// Handler for POST /api/collection/load
/// Resolves the input and replaces the session with its first page
pub async fn load_collection(
    State(state): State<AppState>,
    Json(request): Json<LoadCollectionRequest>,
) -> Result<Json<CollectionView>, OraError> {
    tracing::info!("Loading collection for '{}'", request.input.trim());

    state.loader.load_into(&state.session, &request.input).await?;

    Ok(Json(build_view(&state)))
}

/// Handler for POST /api/collection/more
pub async fn load_more(State(state): State<AppState>) -> Result<Json<CollectionView>, OraError> {
    let appended = state.loader.load_more_into(&state.session).await?;
    tracing::debug!("Appended {} oras", appended);

    Ok(Json(build_view(&state)))
}

/// Live collection followed by imported records the fetch did not return
pub(crate) fn all_oras(state: &AppState) -> Vec<Ora> {
    let live = state.session.read().oras().to_vec();
    state.profiles.read().visible_oras(&live)
}

pub(crate) fn build_view(state: &AppState) -> CollectionView {
    let (address, source_label, live, has_more, report) = {
        let session = state.session.read();
        (
            session.address().map(str::to_string),
            session.source_label().map(str::to_string),
            session.oras().to_vec(),
            session.has_more(),
            session.report(),
        )
    };

    let all = state.profiles.read().visible_oras(&live);
    let facets = available_trait_values(&all);

    let filters = state.filters.read();
    let visible = filters.apply_filters(&all);

    CollectionView {
        address,
        source_label,
        total_count: all.len(),
        visible_count: visible.len(),
        imported_count: all.len() - live.len(),
        oras: visible,
        has_more,
        facets,
        filters: filters.filters().clone(),
        favorites: filters.favorites(),
        report,
    }
}
