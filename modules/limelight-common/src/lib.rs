pub mod config;
pub mod error;
pub mod text;
pub mod types;
pub mod window;

pub use config::{Config, SourcesConfig, WeightsConfig};
pub use error::PipelineError;
pub use text::{clean_text, content_hash, normalize_surface, similarity_hash, split_sentences};
pub use types::*;
pub use window::DailyWindow;
