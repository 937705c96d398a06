use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use service_core::error::AppError;

fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Enhanced image of a product.
pub async fn get_image(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .catalog
        .get_product(&product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if product.image_key.is_empty() {
        return Err(AppError::not_found("Image not found"));
    }

    let bytes = state.storage.download(&product.image_key).await?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&product.image_key))],
        bytes,
    ))
}
