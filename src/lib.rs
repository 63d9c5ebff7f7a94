pub mod cache;
pub mod config;
pub mod error;
pub mod gemini;
pub mod insight;
pub mod web_pages;

pub use config::{AppState, Config};
pub use error::{ConfigError, GenerationError, InsightError, StoreError};
pub use insight::{ImageUpload, Insight, InsightService, Notice, Origin, Submission};
