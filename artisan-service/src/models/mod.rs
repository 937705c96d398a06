pub mod artisan;
pub mod product;

pub use artisan::{Artisan, StorySource};
pub use product::Product;

/// Case-insensitive substring test used by every catalog backend.
///
/// An empty fragment matches everything.
pub fn matches_fragment(haystack: &str, fragment: &str) -> bool {
    let fragment = fragment.trim();
    fragment.is_empty() || haystack.to_lowercase().contains(&fragment.to_lowercase())
}
