use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub artisan_id: String,
    pub name: String,
    pub description: String,
    /// Free-form price text, exactly as the artisan typed it.
    pub price: String,
    /// Key of the bytes as uploaded, in the unserved originals store.
    pub raw_image_key: String,
    /// Storage key of the enhanced image; a bare filename served under `/static/`.
    pub image_key: String,
    pub enhanced: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(artisan_id: String, name: String, description: String, price: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            artisan_id,
            name,
            description,
            price,
            raw_image_key: String::new(),
            image_key: String::new(),
            enhanced: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
