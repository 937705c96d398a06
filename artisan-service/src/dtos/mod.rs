pub mod artisans;
pub mod products;
pub mod search;
pub mod story;

pub use artisans::{
    ArtisanProfile, ArtisanSummary, FindArtisanParams, RegisterArtisanForm,
    RegisterArtisanResponse, UpdateArtisanForm,
};
pub use products::{image_url, ProductCreatedResponse, ProductSummary, StatusResponse};
pub use search::{SearchArtisan, SearchParams, SearchResult};
pub use story::{QuestionsParams, QuestionsResponse, StoryRequest, StoryResponse};
