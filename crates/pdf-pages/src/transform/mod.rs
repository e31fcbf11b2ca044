//! Document transforms
//!
//! Every transform loads its own `PdfHandle` from the source bytes and drops
//! it before returning. Parameters are validated before output is built, so
//! a transform yields either its complete output set or an error.

pub mod compress;
pub mod edit;
pub mod images;
pub mod merge;
pub mod overlay;
pub mod protect;
pub mod raster;
pub mod split;

pub use compress::compress;
pub use edit::{crop, delete_pages, reorder, rotate};
pub use images::{SkippedAsset, images_to_pdf, images_to_pdf_parallel};
pub use merge::{merge, merge_handles};
pub use overlay::{add_page_numbers, watermark};
pub use protect::protect;
pub use raster::{Rasterizer, RenderSize, pdf_to_images};
pub use split::{extract_pages, split_all, split_all_parallel, split_by_ranges, split_every, split_into};
