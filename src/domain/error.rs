use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Enter a URL")]
    EmptyUrl,

    #[error("Extractor error: {0}")]
    Extractor(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<crate::extractor::ExtractorError> for AppError {
    fn from(err: crate::extractor::ExtractorError) -> Self {
        AppError::Extractor(err.to_string())
    }
}
