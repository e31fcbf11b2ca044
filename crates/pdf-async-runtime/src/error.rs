use pdf_pages::PagesError;
use pdf_thumbnails::ThumbnailError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A server-side conversion reported failure
    #[error("{0}")]
    ExternalService(String),
    #[error("PDF error: {0}")]
    Pages(#[from] PagesError),
    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),
    #[error("Invalid response: {0}")]
    Response(#[from] serde_json::Error),
    #[error("Worker has stopped")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
