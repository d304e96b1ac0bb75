use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::OraError,
    models::api::{FavoriteToggleResponse, FavoritesResponse},
    AppState,
};

/// Handler for GET /api/favorites
pub async fn list_favorites(State(state): State<AppState>) -> Json<FavoritesResponse> {
    Json(FavoritesResponse {
        favorites: state.filters.read().favorites(),
    })
}

/// Handler for POST /api/favorites/{token_id}/toggle
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Json<FavoriteToggleResponse>, OraError> {
    let token_id = token_id.trim().to_string();
    if token_id.is_empty() {
        return Err(OraError::InvalidInput("tokenId must not be empty".to_string()));
    }

    let favorite = state.filters.write().toggle_favorite(&token_id)?;
    tracing::info!("Token {} favorite: {}", token_id, favorite);

    Ok(Json(FavoriteToggleResponse { token_id, favorite }))
}
