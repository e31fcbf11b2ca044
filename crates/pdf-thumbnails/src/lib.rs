mod cache;
mod types;

pub use cache::{BATCH_CONCURRENCY, THUMBNAIL_JPEG_QUALITY, ThumbnailCache, page_count_or_default};
pub use types::*;
