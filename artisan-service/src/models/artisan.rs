use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an artisan's bio text came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorySource {
    /// Produced by the GenAI collaborator.
    Generated,
    /// Copied from the artisan's own input.
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artisan {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub location: String,
    pub language: String,
    pub contact_number: String,
    pub bio_original: String,
    pub bio_translated: String,
    pub bio_enriched: String,
    pub story_source: StorySource,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Artisan {
    pub fn new(name: String, location: String, language: String, contact_number: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            location,
            language,
            contact_number,
            bio_original: String::new(),
            bio_translated: String::new(),
            bio_enriched: String::new(),
            story_source: StorySource::Fallback,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
