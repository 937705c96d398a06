use crate::dtos::{SearchParams, SearchResult};
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

/// Products by name fragment (`q`) and owner location, with the owner embedded.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    let limit = params.effective_limit();
    let matches = state
        .catalog
        .search_products(&params.q, &params.location, limit)
        .await?;

    tracing::debug!(
        q = %params.q,
        location = %params.location,
        results = matches.len(),
        "Product search"
    );

    let origin = state.backend_origin();
    Ok(Json(
        matches
            .into_iter()
            .map(|(product, artisan)| SearchResult::new(product, artisan, origin))
            .collect(),
    ))
}
