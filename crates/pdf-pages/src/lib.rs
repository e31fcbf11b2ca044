pub mod constants;
mod document;
mod operation;
mod options;
pub mod selector;
pub mod transform;
mod types;

#[cfg(test)]
mod test_support;

pub use document::{PageBox, PdfHandle, load_pdf, save_pdf};
pub use operation::*;
pub use options::*;
pub use selector::{filter_page_list, parse_page_list, parse_page_sequence, parse_ranges};
pub use transform::{Rasterizer, RenderSize, SkippedAsset};
pub use types::*;

#[cfg(feature = "pdfium")]
pub use transform::raster::{PdfiumRasterizer, bind_pdfium};
