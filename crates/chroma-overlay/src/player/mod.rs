pub mod backend;
pub mod controller;
pub mod types;

pub use backend::MediaBackend;
pub use controller::PlaybackController;
pub use types::{PlayerState, VideoMetadata};
