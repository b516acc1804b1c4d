use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, Command};

use super::models::{ExtractorConfig, MediaInfo};
use super::progress::PROGRESS_TEMPLATE;
use crate::domain::model::{Quality, AUDIO_ONLY_LABEL};
use crate::domain::DownloadRequest;

/// How much of the extractor's stderr is kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("No extractor command configured")]
    MissingCommand,

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Extractor failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

#[derive(Clone)]
pub struct ExtractorClient {
    config: ExtractorConfig,
}

impl ExtractorClient {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Result<Command> {
        let (program, leading) = self
            .config
            .command
            .split_first()
            .ok_or(ExtractorError::MissingCommand)?;

        let mut command = Command::new(program);
        command.args(leading).stdin(Stdio::null());
        Ok(command)
    }

    fn program_name(&self) -> String {
        self.config.command.join(" ")
    }

    fn output_template(&self, output_dir: &Path) -> String {
        output_dir
            .join(&self.config.output_template)
            .to_string_lossy()
            .into_owned()
    }

    /// Resolve a URL without downloading (`-J`).
    pub async fn probe(&self, url: &str) -> Result<MediaInfo> {
        self.run_probe(url, Vec::new()).await
    }

    /// Probe with the same output template and format selection as the
    /// download, so the returned info names the file that will be written.
    pub async fn probe_request(&self, request: &DownloadRequest) -> Result<MediaInfo> {
        let extra = vec![
            "-o".to_string(),
            self.output_template(&request.output_dir),
            "-f".to_string(),
            format_selector(request.quality),
        ];
        self.run_probe(&request.url, extra).await
    }

    async fn run_probe(&self, url: &str, extra: Vec<String>) -> Result<MediaInfo> {
        let mut command = self.command()?;
        command
            .args(["-J", "--no-playlist", "--no-warnings"])
            .args(extra)
            .arg(url);

        tracing::debug!(url = %url, "probing media formats");

        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ExtractorError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractorError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractorError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Command-line arguments for a download, excluding the program itself.
    pub fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-playlist",
            "--newline",
            "--progress",
            "--progress-template",
            PROGRESS_TEMPLATE,
            "-o",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.output_template(&request.output_dir));

        match request.quality {
            Quality::AudioOnly => {
                args.extend([
                    "-f".to_string(),
                    "bestaudio".to_string(),
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    self.config.audio_format.clone(),
                    "--audio-quality".to_string(),
                    self.config.audio_quality.clone(),
                ]);
            }
            quality => {
                args.push("-f".to_string());
                args.push(format_selector(quality));
            }
        }

        args.push(request.url.clone());
        args
    }

    /// Start the extractor for `request` with stdout and stderr piped.
    ///
    /// The child is killed if its handle is dropped.
    pub fn spawn_download(&self, request: &DownloadRequest) -> Result<Child> {
        let mut command = self.command()?;
        command
            .args(self.download_args(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a cancel reaches ffmpeg and wrapper children too
        #[cfg(unix)]
        command.process_group(0);

        tracing::info!(url = %request.url, quality = %request.quality, dir = %request.output_dir.display(), "starting extractor");

        command.spawn().map_err(|source| ExtractorError::Spawn {
            program: self.program_name(),
            source,
        })
    }

    /// Where the finished file will land: the extractor's resolved name with
    /// the extension swapped for the post-processed one.
    pub fn expected_output_path(&self, info: &MediaInfo, request: &DownloadRequest) -> PathBuf {
        let resolved = info
            .resolved_filename()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                request
                    .output_dir
                    .join(format!("{}.{}", crate::utils::sanitize_filename(&info.title), info.ext))
            });

        let ext = if request.quality.is_audio_only() {
            self.config.audio_format.as_str()
        } else {
            info.ext.as_str()
        };

        if ext.is_empty() {
            resolved
        } else {
            resolved.with_extension(ext)
        }
    }
}

/// Kill the extractor together with every process it started, then reap it.
pub async fn terminate(child: &mut Child) -> std::io::Result<()> {
    if let Some(pid) = child.id() {
        if let Err(e) = kill_tree(pid).await {
            tracing::debug!(pid, error = %e, "failed to kill process tree");
        }
    }

    // Already gone if the tree kill reached it
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "extractor already exited");
    }
    child.wait().await.map(|_| ())
}

#[cfg(unix)]
async fn kill_tree(pid: u32) -> std::io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    killpg(Pid::from_raw(pgid), Signal::SIGKILL).map_err(std::io::Error::from)
}

#[cfg(windows)]
async fn kill_tree(pid: u32) -> std::io::Result<()> {
    let status = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("taskkill exited with {}", status)))
    }
}

#[cfg(not(any(unix, windows)))]
async fn kill_tree(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

/// `-f` expression for a video quality.
pub fn format_selector(quality: Quality) -> String {
    match quality {
        Quality::Height(h) => format!("bestvideo[height<={}]+bestaudio/best", h),
        Quality::AudioOnly => "bestaudio".to_string(),
        Quality::Default => "bestvideo+bestaudio/best".to_string(),
    }
}

/// Dropdown labels for the formats a URL offers: every distinct height in
/// ascending order, then "Audio only" if an audio-only stream exists.
pub fn quality_labels(info: &MediaInfo) -> Vec<String> {
    let mut heights: Vec<u32> = info.formats.iter().filter_map(|f| f.height).collect();
    heights.sort_unstable();
    heights.dedup();

    let mut labels: Vec<String> = heights
        .into_iter()
        .map(|h| Quality::Height(h).to_string())
        .collect();

    if info.formats.iter().any(|f| f.is_audio_only()) {
        labels.push(AUDIO_ONLY_LABEL.to_string());
    }

    labels
}

pub(crate) fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
