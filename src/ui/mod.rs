use iced::{
    alignment::Horizontal,
    widget::{button, column, pick_list, progress_bar, text, text_input, Space},
    Element, Length,
};

use crate::domain::model::PLACEHOLDER_LABEL;

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub quality_options: Vec<String>,
    pub selected_quality: Option<String>,
    /// 0.0 to 100.0
    pub progress: f32,
    pub status_message: String,
    pub download_enabled: bool,
    pub open_folder_enabled: bool,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            quality_options: vec![PLACEHOLDER_LABEL.to_string()],
            selected_quality: None,
            progress: 0.0,
            status_message: "Waiting...".to_string(),
            download_enabled: true,
            open_folder_enabled: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    QualitySelected(String),
    ChooseFolderPressed,
    DownloadPressed,
    OpenFolderPressed,
    CancelPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::QualitySelected(label) => {
                self.selected_quality = Some(label);
            }
            DownloadMessage::ChooseFolderPressed
            | DownloadMessage::DownloadPressed
            | DownloadMessage::OpenFolderPressed
            | DownloadMessage::CancelPressed => {
                // Will be handled by the app
            }
        }
    }

    /// Replace the dropdown entries and select the first one.
    pub fn set_quality_options(&mut self, options: Vec<String>) {
        self.selected_quality = options.first().cloned();
        self.quality_options = options;
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        column![
            text("YouTube Downloader").size(24),
            Space::new().height(Length::Fixed(10.0)),
            text_input("Paste a video URL...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            pick_list(
                self.quality_options.as_slice(),
                self.selected_quality.clone(),
                DownloadMessage::QualitySelected,
            )
            .placeholder(PLACEHOLDER_LABEL)
            .width(Length::Fixed(160.0)),
            button("Select Download Folder").on_press(DownloadMessage::ChooseFolderPressed),
            button("Download")
                .on_press_maybe(self.download_enabled.then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            progress_bar(0.0..=100.0, self.progress),
            text(&self.status_message).size(14),
            button("Open Folder")
                .on_press_maybe(self.open_folder_enabled.then_some(DownloadMessage::OpenFolderPressed))
                .padding([10, 20]),
            button("Cancel Download")
                .on_press(DownloadMessage::CancelPressed)
                .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10)
        .align_x(Horizontal::Center)
        .into()
    }
}
