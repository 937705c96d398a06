pub mod catalog;
pub mod enhancer;
pub mod memory;
pub mod providers;
pub mod storage;
pub mod storyteller;

pub use catalog::{CatalogStore, MongoCatalog};
pub use enhancer::{EnhancedImage, ImageEnhancer, PhotoEnhancer};
pub use memory::InMemoryCatalog;
pub use storage::{LocalStorage, Storage};
pub use storyteller::{Enrichment, Storyteller};
