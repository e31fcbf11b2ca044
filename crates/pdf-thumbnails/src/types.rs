use pdf_pages::{PagesError, SourceFile};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    /// Rendering kept failing after every retry
    #[error("Failed to render {name} after {attempts} attempts: {message}")]
    Render {
        name: String,
        attempts: u32,
        message: String,
    },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF error: {0}")]
    Pages(#[from] PagesError),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;

/// A first-page preview
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub page_count: usize,
    /// JPEG bytes, shared between the cache and its readers
    pub jpeg: Arc<Vec<u8>>,
}

/// Cache identity: the file as the user supplied it plus the requested size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    pub name: String,
    pub size: usize,
    pub last_modified: Option<SystemTime>,
    pub max_size: u32,
}

impl ThumbnailKey {
    pub fn new(file: &SourceFile, max_size: u32) -> Self {
        Self {
            name: file.name.clone(),
            size: file.size(),
            last_modified: file.last_modified,
            max_size,
        }
    }
}

/// Attempt bound and linear backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after attempt `n` is `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Preview sizes offered by the file list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ThumbnailSize {
    pub fn pixels(self) -> u32 {
        match self {
            ThumbnailSize::Small => 120,
            ThumbnailSize::Medium => 180,
            ThumbnailSize::Large => 240,
        }
    }
}
