//! Wrapper around the external `yt-dlp` extractor.

pub mod client;
pub mod models;
pub mod progress;

pub use client::{quality_labels, terminate, ExtractorClient, ExtractorError};
pub use models::ExtractorConfig;
pub use progress::{parse_progress_line, ProgressStatus};
