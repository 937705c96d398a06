pub mod artisans;
pub mod health;
pub mod media;
pub mod products;
pub mod search;
pub mod story;

pub use artisans::{find_artisan, get_artisan, register_artisan, update_artisan};
pub use health::{check_gemini, health_check, metrics, readiness_check, root};
pub use media::get_image;
pub use products::{delete_product, update_product, upload_product};
pub use search::search;
pub use story::{generate_story, story_questions};
