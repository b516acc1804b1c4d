mod app;
mod application;
mod domain;
mod extractor;
mod ui;
mod utils;

use iced::{window, Size};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "simple_video_downloader=info".into());

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> iced::Result {
    init_tracing();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("YouTube Downloader")
        .window(window::Settings {
            size: Size::new(650.0, 450.0),
            min_size: Some(Size::new(450.0, 400.0)),
            resizable: true,
            ..Default::default()
        })
        .run()
}
