//! Memoized first-page previews
//!
//! Thumbnails are keyed by file name, byte size, modification time and the
//! requested size. The cache only grows until `clear()` is called.

use crate::types::*;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use pdf_pages::transform::images::flatten_on_white;
use pdf_pages::{PagesError, PdfHandle, Rasterizer, RenderSize, SourceFile};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Thumbnails rendered at the same time by `generate_batch`
pub const BATCH_CONCURRENCY: usize = 3;

/// JPEG quality for previews
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

#[derive(Clone)]
pub struct ThumbnailCache {
    rasterizer: Arc<dyn Rasterizer>,
    entries: Arc<Mutex<HashMap<ThumbnailKey, Thumbnail>>>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("entries", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ThumbnailCache {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            entries: Arc::new(Mutex::new(HashMap::new())),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ThumbnailKey, Thumbnail>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &ThumbnailKey) -> Option<Thumbnail> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Return the cached preview or render one, retrying with linear backoff
    pub async fn generate(&self, file: Arc<SourceFile>, max_size: u32) -> Result<Thumbnail> {
        let key = ThumbnailKey::new(&file, max_size);
        if let Some(hit) = self.get(&key) {
            log::debug!("Thumbnail cache hit for {}", file.name);
            return Ok(hit);
        }

        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            let rasterizer = Arc::clone(&self.rasterizer);
            let source = Arc::clone(&file);
            let result =
                tokio::task::spawn_blocking(move || render_thumbnail(rasterizer.as_ref(), &source, max_size))
                    .await?;

            match result {
                Ok(thumbnail) => {
                    self.lock().insert(key, thumbnail.clone());
                    return Ok(thumbnail);
                }
                Err(e) => {
                    log::warn!(
                        "Thumbnail attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        file.name,
                        e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay_after(attempt)).await;
                    }
                }
            }
        }

        Err(ThumbnailError::Render {
            name: file.name.clone(),
            attempts,
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Generate previews for many files, at most `BATCH_CONCURRENCY` at a time.
    ///
    /// One failure does not affect the others; results follow input order.
    pub async fn generate_batch<K>(&self, files: Vec<(K, Arc<SourceFile>)>, max_size: u32) -> Vec<(K, Result<Thumbnail>)>
    where
        K: Send + 'static,
    {
        let limit = Arc::new(Semaphore::new(BATCH_CONCURRENCY));
        let mut tasks = Vec::with_capacity(files.len());
        for (key, file) in files {
            let cache = self.clone();
            let limit = Arc::clone(&limit);
            let task = tokio::spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                cache.generate(file, max_size).await
            });
            tasks.push((key, task));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (key, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(ThumbnailError::TaskJoin(e)),
            };
            results.push((key, result));
        }
        results
    }
}

/// Render page 1 to fit `max_size` on its longer side, flattened onto white
fn render_thumbnail(rasterizer: &dyn Rasterizer, file: &SourceFile, max_size: u32) -> Result<Thumbnail> {
    let page_count = rasterizer.page_count(file)?;
    let page = rasterizer.render_page(file, 0, RenderSize::MaxDimension(max_size))?;
    let (width, height) = page.dimensions();

    let rgb = RgbImage::from_raw(width, height, flatten_on_white(&page))
        .ok_or_else(|| PagesError::Render("Rendered buffer has the wrong size".to_string()))?;
    let mut jpeg = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, THUMBNAIL_JPEG_QUALITY))?;

    Ok(Thumbnail {
        width,
        height,
        page_count,
        jpeg: Arc::new(jpeg.into_inner()),
    })
}

/// Page count read with lopdf, or 1 when the file cannot be parsed
pub fn page_count_or_default(file: &SourceFile) -> usize {
    match PdfHandle::load(file) {
        Ok(handle) => handle.page_count(),
        Err(e) => {
            log::debug!("Counting pages of {} failed: {}", file.name, e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use pdf_pages::Result as PagesResult;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` renders, then draws a transparent page
    struct FlakyRasterizer {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyRasterizer {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Rasterizer for FlakyRasterizer {
        fn page_count(&self, _source: &SourceFile) -> PagesResult<usize> {
            Ok(7)
        }

        fn render_page(&self, _source: &SourceFile, _index: usize, size: RenderSize) -> PagesResult<RgbaImage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(PagesError::Render("canvas unavailable".to_string()));
            }
            let max = match size {
                RenderSize::MaxDimension(max) => max,
                RenderSize::Scale(_) => 100,
            };
            Ok(RgbaImage::from_pixel(max / 2, max, Rgba([0, 0, 0, 0])))
        }
    }

    /// Records how many renders run at the same time
    #[derive(Default)]
    struct SlowRasterizer {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Rasterizer for SlowRasterizer {
        fn page_count(&self, _source: &SourceFile) -> PagesResult<usize> {
            Ok(1)
        }

        fn render_page(&self, _source: &SourceFile, _index: usize, _size: RenderSize) -> PagesResult<RgbaImage> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn file(name: &str) -> Arc<SourceFile> {
        Arc::new(SourceFile::new(name, vec![1, 2, 3]))
    }

    #[tokio::test]
    async fn test_generate_fits_and_flattens_on_white() {
        let cache = ThumbnailCache::new(FlakyRasterizer::new(0));
        let thumbnail = cache.generate(file("a.pdf"), 180).await.unwrap();
        assert_eq!((thumbnail.width, thumbnail.height), (90, 180));
        assert_eq!(thumbnail.page_count, 7);

        let decoded = image::load_from_memory(&thumbnail.jpeg).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(10, 10).0;
        assert!(pixel.iter().all(|&c| c > 240), "expected white, got {:?}", pixel);
    }

    #[tokio::test]
    async fn test_generate_is_memoized() {
        let rasterizer = FlakyRasterizer::new(0);
        let cache = ThumbnailCache::new(rasterizer.clone());
        cache.generate(file("a.pdf"), 120).await.unwrap();
        cache.generate(file("a.pdf"), 120).await.unwrap();
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);

        // a different size is a different key
        cache.generate(file("a.pdf"), 240).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let rasterizer = FlakyRasterizer::new(2);
        let cache = ThumbnailCache::new(rasterizer.clone()).with_policy(fast_policy());
        assert!(cache.generate(file("a.pdf"), 120).await.is_ok());
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let rasterizer = FlakyRasterizer::new(10);
        let cache = ThumbnailCache::new(rasterizer.clone()).with_policy(fast_policy());
        match cache.generate(file("a.pdf"), 120).await {
            Err(ThumbnailError::Render { name, attempts, .. }) => {
                assert_eq!(name, "a.pdf");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected render failure, got {:?}", other),
        }
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let cache = ThumbnailCache::new(FlakyRasterizer::new(0));
        let files = (0..5).map(|i| (i, file(&format!("{}.pdf", i)))).collect();
        let results = cache.generate_batch(files, 60).await;
        let keys: Vec<_> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    #[tokio::test]
    async fn test_batch_renders_at_most_three_at_once() {
        let rasterizer = Arc::new(SlowRasterizer::default());
        let cache = ThumbnailCache::new(rasterizer.clone());
        let files = (0..10).map(|i| (i, file(&format!("{}.pdf", i)))).collect();
        let results = cache.generate_batch(files, 60).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        let peak = rasterizer.peak.load(Ordering::SeqCst);
        assert!(peak <= BATCH_CONCURRENCY, "{} renders ran at once", peak);
        assert!(peak > 1, "renders never overlapped");
        assert_eq!(rasterizer.active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retry_delay_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn test_page_count_falls_back_to_one() {
        assert_eq!(page_count_or_default(&SourceFile::new("x.pdf", b"junk".to_vec())), 1);
    }
}
