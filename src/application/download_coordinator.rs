use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream::BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;

use super::cancel::{BusyGuard, CancelFlag};
use crate::{
    domain::{model::DEFAULT_LABEL, AppError, DownloadRequest},
    extractor::{
        client::stderr_tail, parse_progress_line, quality_labels, terminate, ExtractorClient,
        ExtractorError, ProgressStatus,
    },
    utils::remove_partial_files,
};

/// How often the cancel flag is checked while the extractor is silent.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Non-progress output lines kept for the failure message.
const OUTPUT_TAIL_LINES: usize = 20;

/// Give up on a pipe after this many read errors in a row.
const MAX_READ_ERRORS: u32 = 3;

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started,
    /// Output path the finished file is expected at
    Prepared(PathBuf),
    /// Percentage of the current stream (0.0 to 100.0)
    Progress(f32),
    /// One stream finished downloading; post-processing may follow
    Finished,
    Completed(PathBuf),
    Canceled,
    Failed(AppError),
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    client: ExtractorClient,
    cancel: CancelFlag,
    busy: Arc<AtomicBool>,
}

impl DownloadCoordinator {
    pub fn new(client: ExtractorClient) -> Self {
        Self {
            client,
            cancel: CancelFlag::new(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Quality labels for `url`, or `["Default"]` when the URL can't be
    /// resolved.
    pub async fn prepare_qualities(&self, url: String) -> Vec<String> {
        match self.client.probe(&url).await {
            Ok(info) => {
                let labels = quality_labels(&info);
                if labels.is_empty() {
                    tracing::warn!(url = %url, "no selectable formats found");
                    vec![DEFAULT_LABEL.to_string()]
                } else {
                    tracing::info!(url = %url, options = labels.len(), "fetched quality options");
                    labels
                }
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Failed to fetch formats");
                vec![DEFAULT_LABEL.to_string()]
            }
        }
    }

    /// Request cancellation of the running download. Best effort: the flag
    /// is noticed on the next progress line or poll tick.
    pub fn cancel(&self) {
        tracing::info!("cancel requested");
        self.cancel.set();
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run a download, reporting progress as a stream of events that always
    /// ends with `Completed`, `Canceled` or `Failed`.
    ///
    /// Returns an empty stream if another download is still running.
    pub fn start(&self, request: DownloadRequest) -> BoxStream<'static, DownloadEvent> {
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            tracing::warn!(url = %request.url, "download already running, ignoring request");
            return futures::stream::empty().boxed();
        };

        self.cancel.clear();

        let runtime = Runtime {
            client: self.client.clone(),
            cancel: self.cancel.clone(),
            _busy: guard,
        };

        futures::stream::unfold(
            DownloadRuntimeState::Start { runtime, request },
            |state| async move {
                match state {
                    DownloadRuntimeState::Start { runtime, request } => Some((
                        DownloadEvent::Started,
                        DownloadRuntimeState::Probing { runtime, request },
                    )),
                    DownloadRuntimeState::Probing { runtime, request } => {
                        if let Err(e) = tokio::fs::create_dir_all(&request.output_dir).await {
                            return finish(runtime.failed(AppError::Io(format!(
                                "Failed to create {}: {}",
                                request.output_dir.display(),
                                e
                            ))));
                        }

                        let info = match runtime.client.probe_request(&request).await {
                            Ok(info) => info,
                            Err(e) => return finish(runtime.failed(e.into())),
                        };

                        if runtime.cancel.is_set() {
                            return finish(DownloadEvent::Canceled);
                        }

                        let target = runtime.client.expected_output_path(&info, &request);
                        Some((
                            DownloadEvent::Prepared(target.clone()),
                            DownloadRuntimeState::Spawning {
                                runtime,
                                request,
                                target,
                            },
                        ))
                    }
                    DownloadRuntimeState::Spawning {
                        runtime,
                        request,
                        target,
                    } => {
                        let mut child = match runtime.client.spawn_download(&request) {
                            Ok(child) => child,
                            Err(e) => return finish(runtime.failed(e.into())),
                        };

                        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take())
                        else {
                            return finish(runtime.failed(AppError::Io(
                                "Extractor output is not captured".to_string(),
                            )));
                        };

                        let lines = futures::stream::select(line_stream(stdout), line_stream(stderr)).boxed();

                        Some((
                            DownloadEvent::Progress(0.0),
                            DownloadRuntimeState::Running {
                                runtime,
                                child,
                                lines,
                                target,
                                output_tail: VecDeque::new(),
                            },
                        ))
                    }
                    DownloadRuntimeState::Running {
                        runtime,
                        mut child,
                        mut lines,
                        target,
                        mut output_tail,
                    } => loop {
                        if runtime.cancel.is_set() {
                            if let Err(e) = terminate(&mut child).await {
                                tracing::warn!(error = %e, "failed to stop extractor");
                            }
                            runtime.cleanup(&target).await;
                            tracing::info!(path = %target.display(), "download canceled");
                            return finish(DownloadEvent::Canceled);
                        }

                        let line = match tokio::time::timeout(CANCEL_POLL_INTERVAL, lines.next()).await {
                            Err(_) => continue,
                            Ok(line) => line,
                        };

                        let Some(line) = line else {
                            let event = runtime.on_exit(&mut child, &target, &output_tail).await;
                            return finish(event);
                        };

                        let Some(update) = parse_progress_line(&line) else {
                            if line.starts_with("ERROR") {
                                tracing::warn!("{}", line);
                            } else {
                                tracing::debug!("{}", line);
                            }
                            if output_tail.len() == OUTPUT_TAIL_LINES {
                                output_tail.pop_front();
                            }
                            output_tail.push_back(line);
                            continue;
                        };

                        let event = match update.status {
                            ProgressStatus::Downloading => match update.percent() {
                                Some(percent) => DownloadEvent::Progress(percent),
                                None => continue,
                            },
                            ProgressStatus::Finished => DownloadEvent::Finished,
                            ProgressStatus::Other(_) => continue,
                        };

                        return Some((
                            event,
                            DownloadRuntimeState::Running {
                                runtime,
                                child,
                                lines,
                                target,
                                output_tail,
                            },
                        ));
                    },
                    DownloadRuntimeState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

fn finish(event: DownloadEvent) -> Option<(DownloadEvent, DownloadRuntimeState)> {
    Some((event, DownloadRuntimeState::Finished))
}

/// Lines of extractor output. Bytes that are not UTF-8 (titles printed in a
/// legacy code page) are replaced rather than ending the stream, so the pipe
/// keeps draining until the extractor closes it.
fn line_stream<R>(reader: R) -> BoxStream<'static, String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::unfold(
        (BufReader::new(reader), Vec::new()),
        |(mut reader, mut buf)| async move {
            let mut errors = 0;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => return None,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        return Some((line, (reader, buf)));
                    }
                    Err(e) => {
                        errors += 1;
                        tracing::warn!(error = %e, "failed to read extractor output");
                        if errors >= MAX_READ_ERRORS {
                            return None;
                        }
                    }
                }
            }
        },
    )
    .boxed()
}

/// State shared by every step of one download.
struct Runtime {
    client: ExtractorClient,
    cancel: CancelFlag,
    _busy: BusyGuard,
}

impl Runtime {
    fn failed(&self, error: AppError) -> DownloadEvent {
        if self.cancel.is_set() {
            DownloadEvent::Canceled
        } else {
            tracing::error!(error = %error, "download failed");
            DownloadEvent::Failed(error)
        }
    }

    async fn cleanup(&self, target: &Path) {
        match remove_partial_files(target).await {
            Ok(removed) => {
                for path in removed {
                    tracing::info!(path = %path.display(), "removed partial file");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to remove partial files"),
        }
    }

    async fn on_exit(&self, child: &mut Child, target: &Path, output_tail: &VecDeque<String>) -> DownloadEvent {
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                self.cleanup(target).await;
                return self.failed(ExtractorError::Io(e).into());
            }
        };

        if self.cancel.is_set() {
            self.cleanup(target).await;
            return DownloadEvent::Canceled;
        }

        if status.success() {
            tracing::info!(path = %target.display(), "download complete");
            return DownloadEvent::Completed(target.to_path_buf());
        }

        self.cleanup(target).await;
        let output = output_tail.iter().cloned().collect::<Vec<_>>().join("\n");
        self.failed(
            ExtractorError::Failed {
                status: status.to_string(),
                stderr: stderr_tail(&output),
            }
            .into(),
        )
    }
}

enum DownloadRuntimeState {
    Start {
        runtime: Runtime,
        request: DownloadRequest,
    },
    Probing {
        runtime: Runtime,
        request: DownloadRequest,
    },
    Spawning {
        runtime: Runtime,
        request: DownloadRequest,
        target: PathBuf,
    },
    Running {
        runtime: Runtime,
        child: Child,
        lines: BoxStream<'static, String>,
        target: PathBuf,
        output_tail: VecDeque<String>,
    },
    Finished,
}
