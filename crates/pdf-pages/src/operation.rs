//! Operation registry
//!
//! `Operation` is the closed set of tools. Page selections arrive as the
//! user's 1-based text and are parsed here, so everything below this layer
//! sees 0-based indices only.

use crate::constants::DEFAULT_WORKERS;
use crate::document::PdfHandle;
use crate::options::*;
use crate::selector::{filter_page_list, parse_page_sequence};
use crate::transform::images::SkippedAsset;
use crate::transform::raster::Rasterizer;
use crate::transform::{compress, edit, images, merge, overlay, protect, raster, split};
use crate::types::*;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "tool", rename_all = "kebab-case"))]
pub enum Operation {
    Merge,
    SplitRanges {
        ranges: String,
    },
    Extract {
        pages: String,
    },
    SplitEvery {
        n: usize,
    },
    SplitInto {
        n: usize,
    },
    SplitAll,
    Rotate {
        angle: RotationAngle,
        /// Every page when absent
        #[cfg_attr(feature = "serde", serde(default))]
        pages: Option<String>,
    },
    Watermark(WatermarkOptions),
    DeletePages {
        pages: String,
    },
    Reorder {
        order: String,
    },
    AddPageNumbers(PageNumberOptions),
    Protect {
        password: String,
    },
    ImagesToPdf(ImagePageOptions),
    PdfToImages(RasterOptions),
    Crop(CropMargins),
    Compress {
        #[cfg_attr(feature = "serde", serde(default))]
        quality: CompressionQuality,
    },
    Info,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Merge => "merge",
            Operation::SplitRanges { .. } => "split-ranges",
            Operation::Extract { .. } => "extract",
            Operation::SplitEvery { .. } => "split-every",
            Operation::SplitInto { .. } => "split-into",
            Operation::SplitAll => "split-all",
            Operation::Rotate { .. } => "rotate",
            Operation::Watermark(_) => "watermark",
            Operation::DeletePages { .. } => "delete-pages",
            Operation::Reorder { .. } => "reorder",
            Operation::AddPageNumbers(_) => "add-page-numbers",
            Operation::Protect { .. } => "protect",
            Operation::ImagesToPdf(_) => "images-to-pdf",
            Operation::PdfToImages(_) => "pdf-to-images",
            Operation::Crop(_) => "crop",
            Operation::Compress { .. } => "compress",
            Operation::Info => "info",
        }
    }

    /// Whether the operation consumes every input rather than exactly one
    pub fn takes_many(&self) -> bool {
        matches!(self, Operation::Merge | Operation::ImagesToPdf(_))
    }

    /// Check parameters that do not depend on the document
    pub fn validate(&self) -> Result<()> {
        match self {
            Operation::SplitEvery { n } if *n < 1 => {
                Err(PagesError::validation("Number of pages must be at least 1"))
            }
            Operation::SplitInto { n } if *n < 2 => {
                Err(PagesError::validation("Must split into at least 2 files"))
            }
            Operation::Watermark(options) => options.validate(),
            Operation::AddPageNumbers(options) => options.validate(),
            Operation::Protect { password } if password.is_empty() => {
                Err(PagesError::validation("Password cannot be empty"))
            }
            Operation::PdfToImages(options) => options.validate(),
            Operation::Crop(margins) => margins.validate(),
            _ => Ok(()),
        }
    }

    /// Load a job from a JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let operation = serde_json::from_slice(&bytes)
            .map_err(|e| PagesError::Config(format!("Failed to parse job: {}", e)))?;
        Ok(operation)
    }

    /// Save a job to a JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PagesError::Config(format!("Failed to serialize job: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Operation-specific result data beside the output files
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OutcomeDetail {
    #[default]
    None,
    Deleted(usize),
    Compression(CompressionStats),
    Skipped(Vec<SkippedAsset>),
    Info(DocumentInfo),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub files: Vec<OutputFile>,
    pub detail: OutcomeDetail,
}

impl Outcome {
    fn files(files: Vec<OutputFile>) -> Self {
        Self {
            files,
            detail: OutcomeDetail::None,
        }
    }

    fn single(file: OutputFile) -> Self {
        Self::files(vec![file])
    }
}

/// Executes operations. Holds the optional page renderer.
#[derive(Clone, Default)]
pub struct Engine {
    rasterizer: Option<Arc<dyn Rasterizer>>,
    workers: usize,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rasterizer", &self.rasterizer.is_some())
            .field("workers", &self.workers())
            .finish()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn workers(&self) -> usize {
        if self.workers == 0 { DEFAULT_WORKERS } else { self.workers }
    }

    pub fn rasterizer(&self) -> Option<&Arc<dyn Rasterizer>> {
        self.rasterizer.as_ref()
    }

    /// Run an operation to completion on the calling thread
    pub fn execute(&self, operation: &Operation, inputs: Vec<SourceFile>) -> Result<Outcome> {
        operation.validate()?;
        log::debug!("Executing {} on {} input(s)", operation.name(), inputs.len());

        match operation {
            Operation::Merge => return Ok(Outcome::single(merge::merge(&inputs)?)),
            Operation::ImagesToPdf(options) => {
                let (file, skipped) = images::images_to_pdf(&inputs, options)?;
                return Ok(with_skipped(file, skipped));
            }
            _ => {}
        }

        let source = single_input(operation, inputs)?;
        match operation {
            Operation::SplitRanges { ranges } => Ok(Outcome::files(split::split_by_ranges(&source, ranges)?)),
            Operation::Extract { pages } => Ok(Outcome::single(split::extract_pages(&source, pages)?)),
            Operation::SplitEvery { n } => Ok(Outcome::files(split::split_every(&source, *n)?)),
            Operation::SplitInto { n } => Ok(Outcome::files(split::split_into(&source, *n)?)),
            Operation::SplitAll => Ok(Outcome::files(split::split_all(&source)?)),
            Operation::Rotate { angle, pages } => {
                let indices = match pages.as_deref() {
                    Some(selection) => Some(filter_page_list(selection, page_count(&source)?)),
                    None => None,
                };
                Ok(Outcome::single(edit::rotate(&source, *angle, indices.as_deref())?))
            }
            Operation::Watermark(options) => Ok(Outcome::single(overlay::watermark(&source, options)?)),
            Operation::DeletePages { pages } => {
                let indices = filter_page_list(pages, page_count(&source)?);
                let (file, deleted) = edit::delete_pages(&source, &indices)?;
                Ok(Outcome {
                    files: vec![file],
                    detail: OutcomeDetail::Deleted(deleted),
                })
            }
            Operation::Reorder { order } => {
                let indices = parse_page_sequence(order, page_count(&source)?)?;
                Ok(Outcome::single(edit::reorder(&source, &indices)?))
            }
            Operation::AddPageNumbers(options) => {
                Ok(Outcome::single(overlay::add_page_numbers(&source, options)?))
            }
            Operation::Protect { password } => Ok(Outcome::single(protect::protect(&source, password)?)),
            Operation::PdfToImages(options) => {
                let rasterizer = self.rasterizer.as_deref().ok_or_else(|| {
                    PagesError::Config("No page renderer is configured".to_string())
                })?;
                Ok(Outcome::files(raster::pdf_to_images(rasterizer, &source, options)?))
            }
            Operation::Crop(margins) => Ok(Outcome::single(edit::crop(&source, margins)?)),
            Operation::Compress { quality } => {
                let (file, stats) = compress::compress(&source, *quality)?;
                Ok(Outcome {
                    files: vec![file],
                    detail: OutcomeDetail::Compression(stats),
                })
            }
            Operation::Info => {
                let info = PdfHandle::load(&source)?.info(source.size());
                Ok(Outcome {
                    files: Vec::new(),
                    detail: OutcomeDetail::Info(info),
                })
            }
            Operation::Merge | Operation::ImagesToPdf(_) => Err(PagesError::validation(format!(
                "{} takes a list of inputs",
                operation.name()
            ))),
        }
    }

    /// Run an operation off the async executor.
    ///
    /// Split-all and image decoding fan out over blocking tasks bounded by
    /// `workers()`; everything else runs as a single blocking task.
    pub async fn execute_async(&self, operation: Operation, inputs: Vec<SourceFile>) -> Result<Outcome> {
        operation.validate()?;
        match operation {
            Operation::SplitAll => {
                let source = single_input(&operation, inputs)?;
                Ok(Outcome::files(split::split_all_parallel(source, self.workers()).await?))
            }
            Operation::ImagesToPdf(options) => {
                let (file, skipped) = images::images_to_pdf_parallel(inputs, options, self.workers()).await?;
                Ok(with_skipped(file, skipped))
            }
            operation => {
                let engine = self.clone();
                tokio::task::spawn_blocking(move || engine.execute(&operation, inputs)).await?
            }
        }
    }
}

fn with_skipped(file: OutputFile, skipped: Vec<SkippedAsset>) -> Outcome {
    let detail = if skipped.is_empty() {
        OutcomeDetail::None
    } else {
        OutcomeDetail::Skipped(skipped)
    };
    Outcome {
        files: vec![file],
        detail,
    }
}

fn single_input(operation: &Operation, inputs: Vec<SourceFile>) -> Result<SourceFile> {
    let count = inputs.len();
    let mut inputs = inputs.into_iter();
    match (inputs.next(), count) {
        (Some(source), 1) => Ok(source),
        _ => Err(PagesError::validation(format!(
            "{} takes exactly one PDF, got {}",
            operation.name(),
            count
        ))),
    }
}

fn page_count(source: &SourceFile) -> Result<usize> {
    Ok(PdfHandle::load(source)?.page_count())
}
