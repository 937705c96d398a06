use super::products::image_url;
use crate::models::{Artisan, Product};
use serde::{Deserialize, Serialize};

/// Default and ceiling for `/search` result counts.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub location: String,
    pub limit: Option<i64>,
}

impl SearchParams {
    /// Requested limit clamped to `1..=MAX_SEARCH_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .map(|l| l.clamp(1, MAX_SEARCH_LIMIT as i64) as usize)
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub product_id: String,
    pub name: String,
    pub price: String,
    pub image_url: String,
    pub artisan: SearchArtisan,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchArtisan {
    pub id: String,
    pub name: String,
    pub location: String,
    pub contact_number: String,
    /// The artisan's translated bio.
    pub bio: String,
}

impl SearchResult {
    pub fn new(product: Product, artisan: Artisan, origin: Option<&str>) -> Self {
        Self {
            image_url: image_url(origin, &product.image_key),
            product_id: product.id,
            name: product.name,
            price: product.price,
            artisan: SearchArtisan {
                id: artisan.id,
                name: artisan.name,
                location: artisan.location,
                contact_number: artisan.contact_number,
                bio: artisan.bio_translated,
            },
        }
    }
}
