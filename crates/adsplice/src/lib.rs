pub mod ads;
pub mod engine;
pub mod error;
pub mod media;
pub mod session;
pub mod settings;
pub mod surface;

pub use ads::{AdOrchestrator, AdState};
pub use error::{PlayerError, Result};
pub use media::types::{Video, VideoType};
pub use settings::PlayerSettings;
