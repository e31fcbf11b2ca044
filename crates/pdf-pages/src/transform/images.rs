//! Images to PDF
//!
//! Every decodable image becomes one page. Images are flattened onto white,
//! embedded as Flate-compressed DeviceRGB XObjects and scaled uniformly to fit
//! the page, centered. Files the `image` crate cannot decode are skipped and
//! reported instead of failing the whole conversion.

use crate::constants::DEFAULT_WORKERS;
use crate::document::{PdfHandle, pages_root_id, set_page_tree};
use crate::options::ImagePageOptions;
use crate::types::*;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const IMAGES_OUTPUT_NAME: &str = "images_combined.pdf";

/// An input that was left out of the output, and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedAsset {
    pub name: String,
    pub reason: String,
}

/// A decoded image ready to embed
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Packed 8-bit RGB, alpha already composited onto white
    pub rgb: Vec<u8>,
}

/// Decode any format the `image` crate recognizes
pub fn decode_image(file: &SourceFile) -> Result<DecodedImage> {
    let decoded = image::load_from_memory(&file.bytes).map_err(|e| PagesError::UnsupportedAsset {
        name: file.name.clone(),
        reason: e.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    Ok(DecodedImage {
        name: file.name.clone(),
        width: rgba.width(),
        height: rgba.height(),
        rgb: flatten_on_white(&rgba),
    })
}

/// Composite RGBA pixels over an opaque white background
pub fn flatten_on_white(image: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

/// Convert images sequentially, in input order
pub fn images_to_pdf(
    files: &[SourceFile],
    options: &ImagePageOptions,
) -> Result<(OutputFile, Vec<SkippedAsset>)> {
    if files.is_empty() {
        return Err(PagesError::validation("No images to convert"));
    }
    let decoded = files.iter().map(decode_image).collect();
    assemble(decoded, options)
}

/// Convert images with decoding spread over a bounded set of blocking tasks.
///
/// Page order follows input order regardless of which decode finishes first.
pub async fn images_to_pdf_parallel(
    files: Vec<SourceFile>,
    options: ImagePageOptions,
    workers: usize,
) -> Result<(OutputFile, Vec<SkippedAsset>)> {
    if files.is_empty() {
        return Err(PagesError::validation("No images to convert"));
    }
    let limit = Arc::new(Semaphore::new(workers.clamp(1, DEFAULT_WORKERS * 4)));

    let mut tasks = Vec::with_capacity(files.len());
    for file in files {
        let limit = Arc::clone(&limit);
        tasks.push(tokio::spawn(async move {
            let _permit = limit
                .acquire_owned()
                .await
                .map_err(|e| PagesError::Config(e.to_string()))?;
            tokio::task::spawn_blocking(move || Ok::<_, PagesError>(decode_image(&file))).await?
        }));
    }

    let mut decoded = Vec::with_capacity(tasks.len());
    for task in tasks {
        decoded.push(task.await??);
    }
    tokio::task::spawn_blocking(move || assemble(decoded, &options)).await?
}

/// Build the document from decode results, skipping the failures
fn assemble(
    decoded: Vec<Result<DecodedImage>>,
    options: &ImagePageOptions,
) -> Result<(OutputFile, Vec<SkippedAsset>)> {
    let mut handle = PdfHandle::empty(IMAGES_OUTPUT_NAME);
    let pages_id = pages_root_id(handle.document())?;
    let mut kids = Vec::new();
    let mut skipped = Vec::new();

    for result in decoded {
        let image = match result {
            Ok(image) => image,
            Err(PagesError::UnsupportedAsset { name, reason }) => {
                log::warn!("Skipping unsupported image {}: {}", name, reason);
                skipped.push(SkippedAsset { name, reason });
                continue;
            }
            Err(e) => return Err(e),
        };

        let (page_width, page_height) = options
            .page_size
            .dimensions_with_orientation(options.orientation)
            .unwrap_or((image.width as f32, image.height as f32));
        let placement = fit_centered(image.width, image.height, page_width, page_height);

        let doc = handle.document_mut();
        let mut stream = Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(i64::from(image.width))),
                ("Height", Object::Integer(i64::from(image.height))),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
            ]),
            image.rgb,
        );
        stream.compress()?;
        let image_id = doc.add_object(stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(placement.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(placement.height),
                        Object::Real(placement.x),
                        Object::Real(placement.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(page_width),
                    Object::Real(page_height),
                ]),
            ),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter(vec![(
                    "XObject",
                    Object::Dictionary(Dictionary::from_iter(vec![("Im0", Object::Reference(image_id))])),
                )])),
            ),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    if kids.is_empty() {
        return Err(PagesError::validation(format!(
            "None of the {} images could be decoded",
            skipped.len()
        )));
    }

    set_page_tree(handle.document_mut(), pages_id, kids)?;
    Ok((handle.into_output(IMAGES_OUTPUT_NAME)?, skipped))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Uniform scale to fit the page, centered
fn fit_centered(image_width: u32, image_height: u32, page_width: f32, page_height: f32) -> Placement {
    let scale = (page_width / image_width as f32).min(page_height / image_height as f32);
    let width = image_width as f32 * scale;
    let height = image_height as f32 * scale;
    Placement {
        x: (page_width - width) / 2.0,
        y: (page_height - height) / 2.0,
        width,
        height,
    }
}
