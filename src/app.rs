use std::path::PathBuf;

use futures::StreamExt;
use iced::Task;

use crate::application::{DownloadCoordinator, DownloadEvent};
use crate::domain::{AppError, DownloadPhase, DownloadRequest, Quality};
use crate::extractor::{ExtractorClient, ExtractorConfig};
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::{desktop, is_probe_candidate, normalize_url};

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
    default_folder: PathBuf,
    selected_folder: PathBuf,
    last_downloaded: Option<PathBuf>,
    // URL the quality options were last fetched for
    last_probed_url: String,
    phase: DownloadPhase,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(ExtractorConfig::from_env())
    }
}

impl DownloadApp {
    pub fn new(config: ExtractorConfig) -> Self {
        let default_folder = config.default_folder.clone();
        if let Err(e) = std::fs::create_dir_all(&default_folder) {
            tracing::warn!(folder = %default_folder.display(), error = %e, "failed to create download folder");
        }

        Self {
            view: DownloadView::default(),
            coordinator: DownloadCoordinator::new(ExtractorClient::new(config)),
            selected_folder: default_folder.clone(),
            default_folder,
            last_downloaded: None,
            last_probed_url: String::new(),
            phase: DownloadPhase::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Quality labels fetched for a URL
    QualitiesLoaded { url: String, labels: Vec<String> },
    FolderChosen(Option<PathBuf>),
    Download(DownloadEvent),
    FolderOpened(Result<(), String>),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::UrlChanged(_) => return on_url_changed(app),
                DownloadMessage::DownloadPressed => return start_download(app),
                DownloadMessage::CancelPressed => {
                    app.coordinator.cancel();
                    if app.phase.is_active() {
                        app.phase = DownloadPhase::Canceling;
                    }
                    app.view.progress = 0.0;
                    app.view.status_message = "Canceling...".to_string();
                }
                DownloadMessage::ChooseFolderPressed => {
                    return Task::perform(
                        async {
                            rfd::AsyncFileDialog::new()
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::FolderChosen,
                    );
                }
                DownloadMessage::OpenFolderPressed => {
                    let last = app.last_downloaded.clone();
                    let folder = app.selected_folder.clone();
                    return Task::perform(
                        async move { desktop::reveal(last, folder).await.map_err(|e| e.to_string()) },
                        Message::FolderOpened,
                    );
                }
                DownloadMessage::QualitySelected(_) => {}
            }
        }
        Message::QualitiesLoaded { url, labels } => {
            // A newer URL may have been typed while this one was probing
            if url == app.last_probed_url {
                app.view.set_quality_options(labels);
            }
        }
        Message::FolderChosen(folder) => match folder {
            Some(folder) => {
                app.view.status_message = format!("Folder set to: {}", folder.display());
                app.selected_folder = folder;
            }
            None => {
                app.selected_folder = app.default_folder.clone();
                app.view.status_message = format!(
                    "No folder selected. Using default: {}",
                    app.default_folder.display()
                );
            }
        },
        Message::Download(event) => on_download_event(app, event),
        Message::FolderOpened(result) => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to open folder");
            }
        }
    }
    Task::none()
}

fn on_url_changed(app: &mut DownloadApp) -> Task<Message> {
    let url = app.view.url.trim().to_string();
    if url == app.last_probed_url || !is_probe_candidate(&url) {
        return Task::none();
    }

    app.last_probed_url = url.clone();
    let coordinator = app.coordinator.clone();

    Task::perform(
        async move {
            let labels = coordinator.prepare_qualities(url.clone()).await;
            (url, labels)
        },
        |(url, labels)| Message::QualitiesLoaded { url, labels },
    )
}

fn start_download(app: &mut DownloadApp) -> Task<Message> {
    let url = app.view.url.trim().to_string();
    if url.is_empty() {
        app.view.status_message = AppError::EmptyUrl.to_string();
        return Task::none();
    }
    if app.coordinator.is_busy() {
        return Task::none();
    }

    let quality = app
        .view
        .selected_quality
        .as_deref()
        .map(Quality::from_label)
        .unwrap_or(Quality::Default);

    let request = DownloadRequest {
        url: normalize_url(&url),
        quality,
        output_dir: app.selected_folder.clone(),
    };

    app.phase = DownloadPhase::Downloading;
    app.view.download_enabled = false;
    app.view.open_folder_enabled = false;
    app.view.progress = 0.0;
    app.view.status_message = "Initializing...".to_string();

    Task::stream(app.coordinator.start(request).map(Message::Download))
}

fn on_download_event(app: &mut DownloadApp, event: DownloadEvent) {
    match event {
        DownloadEvent::Started => {
            if app.phase != DownloadPhase::Canceling {
                app.view.status_message = "Starting download...".to_string();
            }
        }
        DownloadEvent::Prepared(path) => {
            app.last_downloaded = Some(path);
        }
        DownloadEvent::Progress(percent) => {
            if app.phase != DownloadPhase::Canceling {
                app.view.progress = percent;
                app.view.status_message = format!("Downloading... {:.1}%", percent);
            }
        }
        DownloadEvent::Finished => {
            if app.phase != DownloadPhase::Canceling {
                app.view.progress = 100.0;
                app.view.status_message = "Download complete!".to_string();
            }
        }
        DownloadEvent::Completed(path) => {
            app.phase = DownloadPhase::Completed;
            app.last_downloaded = Some(path);
            app.view.status_message = "Download complete!".to_string();
            app.view.open_folder_enabled = true;
            app.view.download_enabled = true;
        }
        DownloadEvent::Canceled => {
            app.phase = DownloadPhase::Canceled;
            app.view.status_message = "Download canceled".to_string();
            app.view.download_enabled = true;
        }
        DownloadEvent::Failed(_) => {
            app.phase = DownloadPhase::Failed;
            app.view.status_message = "Download failed".to_string();
            app.view.download_enabled = true;
        }
    }
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(dir: &std::path::Path) -> DownloadApp {
        DownloadApp::new(ExtractorConfig {
            command: vec!["sh".to_string(), "-c".to_string(), "exit 1".to_string()],
            default_folder: dir.join("youtube_output"),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_folder_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        assert!(dir.path().join("youtube_output").is_dir());
        assert_eq!(app.selected_folder, app.default_folder);
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.view.url = "   ".to_string();

        let _ = update(&mut app, Message::UiMessage(DownloadMessage::DownloadPressed));
        assert_eq!(app.view.status_message, "Enter a URL");
        assert!(app.view.download_enabled);
        assert_eq!(app.phase, DownloadPhase::Idle);
    }

    #[test]
    fn test_folder_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let _ = update(&mut app, Message::FolderChosen(Some(PathBuf::from("/tmp/videos"))));
        assert_eq!(app.selected_folder, PathBuf::from("/tmp/videos"));
        assert_eq!(app.view.status_message, "Folder set to: /tmp/videos");

        let _ = update(&mut app, Message::FolderChosen(None));
        assert_eq!(app.selected_folder, app.default_folder);
        assert!(app
            .view
            .status_message
            .starts_with("No folder selected. Using default: "));
    }

    #[test]
    fn test_stale_quality_results_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.last_probed_url = "https://youtu.be/new".to_string();

        let _ = update(
            &mut app,
            Message::QualitiesLoaded {
                url: "https://youtu.be/old".to_string(),
                labels: vec!["144p".to_string()],
            },
        );
        assert_eq!(app.view.quality_options, vec!["Select URL first"]);

        let _ = update(
            &mut app,
            Message::QualitiesLoaded {
                url: "https://youtu.be/new".to_string(),
                labels: vec!["720p".to_string(), "Audio only".to_string()],
            },
        );
        assert_eq!(app.view.selected_quality.as_deref(), Some("720p"));
    }

    #[test]
    fn test_download_lifecycle_updates_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.phase = DownloadPhase::Downloading;
        app.view.download_enabled = false;

        on_download_event(&mut app, DownloadEvent::Progress(42.3));
        assert_eq!(app.view.status_message, "Downloading... 42.3%");
        assert_eq!(app.view.progress, 42.3);

        on_download_event(&mut app, DownloadEvent::Finished);
        assert_eq!(app.view.progress, 100.0);

        let file = dir.path().join("Clip.mp4");
        on_download_event(&mut app, DownloadEvent::Completed(file.clone()));
        assert_eq!(app.view.status_message, "Download complete!");
        assert!(app.view.open_folder_enabled);
        assert!(app.view.download_enabled);
        assert_eq!(app.last_downloaded, Some(file));
    }

    #[test]
    fn test_cancel_then_canceled_event() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.phase = DownloadPhase::Downloading;
        app.view.download_enabled = false;
        app.view.progress = 30.0;

        let _ = update(&mut app, Message::UiMessage(DownloadMessage::CancelPressed));
        assert_eq!(app.phase, DownloadPhase::Canceling);
        assert_eq!(app.view.progress, 0.0);
        assert_eq!(app.view.status_message, "Canceling...");

        // Late progress from the extractor must not overwrite the cancel state
        on_download_event(&mut app, DownloadEvent::Progress(55.0));
        assert_eq!(app.view.progress, 0.0);

        on_download_event(&mut app, DownloadEvent::Canceled);
        assert_eq!(app.view.status_message, "Download canceled");
        assert!(app.view.download_enabled);
        assert!(!app.view.open_folder_enabled);
    }

    #[test]
    fn test_failure_reports_generic_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.phase = DownloadPhase::Downloading;
        app.view.download_enabled = false;

        on_download_event(
            &mut app,
            DownloadEvent::Failed(AppError::Extractor("HTTP Error 403".to_string())),
        );
        assert_eq!(app.view.status_message, "Download failed");
        assert!(app.view.download_enabled);
        assert_eq!(app.phase, DownloadPhase::Failed);
    }
}
