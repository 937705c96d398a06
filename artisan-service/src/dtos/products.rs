use crate::models::Product;
use serde::{Deserialize, Serialize};

/// Public URL of an enhanced image.
///
/// Absolute when the service knows its public origin, otherwise relative.
pub fn image_url(origin: Option<&str>, image_key: &str) -> String {
    match origin {
        Some(origin) => format!("{}/static/{}", origin, image_key),
        None => format!("/static/{}", image_key),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
}

impl ProductSummary {
    pub fn new(product: Product, origin: Option<&str>) -> Self {
        Self {
            image_url: image_url(origin, &product.image_key),
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductCreatedResponse {
    pub id: String,
    /// URL of the enhanced image.
    pub image: String,
    pub enhanced: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub id: String,
}

impl StatusResponse {
    pub fn new(status: &str, id: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            id: id.into(),
        }
    }
}
