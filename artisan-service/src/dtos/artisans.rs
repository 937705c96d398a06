use crate::models::{Artisan, StorySource};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::products::ProductSummary;

fn default_language() -> String {
    "English".to_string()
}

/// Empty, or exactly ten ASCII digits.
pub fn validate_contact_number(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || (value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit())) {
        Ok(())
    } else {
        let mut error = ValidationError::new("contact_number");
        error.message = Some("Contact number must be exactly 10 digits".into());
        Err(error)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterArtisanForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    #[validate(custom(function = "validate_contact_number"))]
    pub contact_number: String,
}

impl RegisterArtisanForm {
    /// Trim surrounding whitespace; a blank language becomes `English`.
    pub fn normalized(self) -> Self {
        let language = self.language.trim();
        Self {
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            language: if language.is_empty() {
                default_language()
            } else {
                language.to_string()
            },
            bio: self.bio.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
        }
    }
}

/// Profile update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateArtisanForm {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub location: Option<String>,
    pub language: Option<String>,
    pub bio: Option<String>,
    #[validate(custom(function = "validate_contact_number"))]
    pub contact_number: Option<String>,
}

impl UpdateArtisanForm {
    pub fn normalized(self) -> Self {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        Self {
            name: trim(self.name),
            location: trim(self.location),
            language: trim(self.language).filter(|l| !l.is_empty()),
            bio: trim(self.bio),
            contact_number: trim(self.contact_number),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterArtisanResponse {
    pub id: String,
    pub name: String,
    pub story_source: StorySource,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArtisanProfile {
    pub id: String,
    pub name: String,
    pub location: String,
    pub language: String,
    pub contact_number: String,
    pub bio_original: String,
    pub bio_translated: String,
    pub bio_enriched: String,
    pub story_source: StorySource,
    pub created_at: String,
    pub updated_at: String,
    pub products: Vec<ProductSummary>,
}

impl ArtisanProfile {
    pub fn new(artisan: Artisan, products: Vec<ProductSummary>) -> Self {
        Self {
            id: artisan.id,
            name: artisan.name,
            location: artisan.location,
            language: artisan.language,
            contact_number: artisan.contact_number,
            bio_original: artisan.bio_original,
            bio_translated: artisan.bio_translated,
            bio_enriched: artisan.bio_enriched,
            story_source: artisan.story_source,
            created_at: artisan.created_at.to_rfc3339(),
            updated_at: artisan.updated_at.to_rfc3339(),
            products,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FindArtisanParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArtisanSummary {
    pub id: String,
    pub name: String,
    pub location: String,
    pub language: String,
}

impl From<Artisan> for ArtisanSummary {
    fn from(artisan: Artisan) -> Self {
        Self {
            id: artisan.id,
            name: artisan.name,
            location: artisan.location,
            language: artisan.language,
        }
    }
}
