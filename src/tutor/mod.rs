pub mod collaborators;
pub mod config;
pub mod decision;
pub mod engine;
pub mod modeling;
pub mod persistence;
pub mod types;
pub mod updater;

pub use config::TutorConfig;
pub use engine::{EngineError, ProfileView, TutorEngine};
pub use types::*;
