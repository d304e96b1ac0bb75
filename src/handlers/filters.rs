use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    models::filter::{FilterPatch, FilterState},
    AppState,
};

/// Handler for PATCH /api/filters
pub async fn update_filters(
    State(state): State<AppState>,
    Json(patch): Json<FilterPatch>,
) -> Json<FilterState> {
    tracing::debug!("Applying filter patch: {:?}", patch);
    let mut filters = state.filters.write();
    Json(filters.set_filter(patch).clone())
}

/// Handler for DELETE /api/filters
pub async fn clear_filters(State(state): State<AppState>) -> Json<FilterState> {
    let mut filters = state.filters.write();
    filters.clear_all_filters();
    Json(filters.filters().clone())
}

/// Handler for DELETE /api/filters/traits/{trait_name}
pub async fn clear_trait_filter(
    State(state): State<AppState>,
    Path(trait_name): Path<String>,
) -> Json<FilterState> {
    let mut filters = state.filters.write();
    filters.clear_trait_filter(&trait_name);
    Json(filters.filters().clone())
}
