use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Subset of the `yt-dlp -J` info dictionary that the downloader needs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ext: String,
    /// Output path resolved by the extractor from the `-o` template
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "_filename")]
    pub internal_filename: Option<String>,
    #[serde(default)]
    pub formats: Vec<MediaFormat>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaFormat {
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
}

impl MediaInfo {
    pub fn resolved_filename(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .or(self.internal_filename.as_deref())
            .filter(|f| !f.is_empty())
    }
}

impl MediaFormat {
    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
    }
}

/// Configuration for the extractor client
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Program plus leading arguments, e.g. `["python3", "-m", "yt_dlp"]`
    pub command: Vec<String>,
    pub default_folder: PathBuf,
    pub audio_format: String,
    pub audio_quality: String,
    pub output_template: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            command: vec!["yt-dlp".to_string()],
            default_folder: PathBuf::from("youtube_output"),
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            output_template: "%(title)s.%(ext)s".to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Defaults overridden by `YTDLP_COMMAND` and `DOWNLOAD_DIR`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var("YTDLP_COMMAND").ok(),
            std::env::var("DOWNLOAD_DIR").ok(),
        )
    }

    fn with_overrides(mut self, command: Option<String>, folder: Option<String>) -> Self {
        if let Some(command) = command {
            let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                self.command = parts;
            }
        }

        if let Some(folder) = folder.filter(|f| !f.trim().is_empty()) {
            self.default_folder = PathBuf::from(folder.trim());
        }

        self
    }
}
