use image::RgbaImage;
use lopdf::{Dictionary, Document, Object};
use pdf_pages::{PagesError, Rasterizer, RenderSize, SourceFile};
use pdf_thumbnails::*;
use std::sync::Arc;
use std::time::Duration;

fn create_test_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..num_pages)
        .map(|_| {
            Object::Reference(doc.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
            ])))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(num_pages as i64)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut writer = Vec::new();
    doc.save_to(&mut writer).unwrap();
    writer
}

/// Counts pages with lopdf and refuses to draw files named `broken*`
struct CountingRasterizer;

impl Rasterizer for CountingRasterizer {
    fn page_count(&self, source: &SourceFile) -> pdf_pages::Result<usize> {
        Ok(page_count_or_default(source))
    }

    fn render_page(&self, source: &SourceFile, _index: usize, size: RenderSize) -> pdf_pages::Result<RgbaImage> {
        if source.name.starts_with("broken") {
            return Err(PagesError::Render("cannot draw".to_string()));
        }
        let side = match size {
            RenderSize::MaxDimension(max) => max,
            RenderSize::Scale(scale) => (100.0 * scale) as u32,
        };
        Ok(RgbaImage::new(side, side))
    }
}

#[test]
fn test_page_count_or_default() {
    let file = SourceFile::new("doc.pdf", create_test_pdf(4));
    assert_eq!(page_count_or_default(&file), 4);
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let cache = ThumbnailCache::new(Arc::new(CountingRasterizer)).with_policy(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
    });
    let files = vec![
        ("good", Arc::new(SourceFile::new("good.pdf", create_test_pdf(3)))),
        ("broken", Arc::new(SourceFile::new("broken.pdf", create_test_pdf(1)))),
    ];

    let results = cache
        .generate_batch(files, ThumbnailSize::Small.pixels())
        .await;

    let (key, good) = &results[0];
    assert_eq!(*key, "good");
    let good = good.as_ref().unwrap();
    assert_eq!(good.page_count, 3);
    assert_eq!((good.width, good.height), (120, 120));

    let (key, broken) = &results[1];
    assert_eq!(*key, "broken");
    assert!(matches!(broken, Err(ThumbnailError::Render { attempts: 2, .. })));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_modified_file_misses_the_cache() {
    let cache = ThumbnailCache::new(Arc::new(CountingRasterizer));
    let bytes = create_test_pdf(2);
    let first = Arc::new(SourceFile::new("doc.pdf", bytes.clone()));
    let later = Arc::new(
        SourceFile::new("doc.pdf", bytes).with_last_modified(std::time::SystemTime::UNIX_EPOCH),
    );

    cache.generate(first, 180).await.unwrap();
    cache.generate(later, 180).await.unwrap();
    assert_eq!(cache.len(), 2);
}
