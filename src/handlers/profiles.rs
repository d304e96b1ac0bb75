use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::{
    error::OraError,
    handlers::collection::all_oras,
    models::{
        api::ProfileResponse,
        profile::{CmpProfile, ImportReport},
    },
    services::profiles::export_file_name,
    AppState,
};

/// Handler for GET /api/profiles/export
/// Downloads every overlay attached to a visible Ora
pub async fn export_profiles(State(state): State<AppState>) -> Result<impl IntoResponse, OraError> {
    let oras = all_oras(&state);
    let body = state.profiles.read().export(&oras)?;

    let filename = export_file_name(&state.loader.collection().slug, chrono::Utc::now().date_naive());
    tracing::info!("Exporting profiles as {}", filename);

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    ))
}

/// Handler for POST /api/profiles/import
/// Body is the raw export file
pub async fn import_profiles(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportReport>, OraError> {
    let live = state.session.read().oras().to_vec();
    let report = state.profiles.write().import_profiles(&body, &live)?;

    Ok(Json(report))
}

/// Handler for GET /api/profiles/{token_id}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Json<ProfileResponse> {
    let (profile, is_default) = state.profiles.read().profile_or_default(&token_id);

    Json(ProfileResponse {
        token_id,
        profile,
        is_default,
    })
}

/// Handler for PUT /api/profiles/{token_id}
pub async fn put_profile(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    Json(profile): Json<CmpProfile>,
) -> Result<Json<ProfileResponse>, OraError> {
    state.profiles.write().set_profile(&token_id, profile.clone())?;
    tracing::info!("Saved profile for token {}", token_id);

    Ok(Json(ProfileResponse {
        token_id,
        profile,
        is_default: false,
    }))
}

/// Handler for DELETE /api/profiles/{token_id}
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<StatusCode, OraError> {
    if state.profiles.write().remove_profile(&token_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
