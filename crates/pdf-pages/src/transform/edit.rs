//! In-place page edits: rotate, delete, reorder, crop

use crate::document::{PageBox, PdfHandle};
use crate::options::CropMargins;
use crate::types::*;

/// Rotate pages by `angle` on top of their current rotation.
///
/// `pages` holds 0-based indices; `None` rotates every page. Indices past the
/// end are ignored.
pub fn rotate(source: &SourceFile, angle: RotationAngle, pages: Option<&[usize]>) -> Result<OutputFile> {
    let mut handle = PdfHandle::load(source)?;
    let total = handle.page_count();
    let targets: Vec<usize> = match pages {
        Some(pages) => pages.iter().copied().filter(|&i| i < total).collect(),
        None => (0..total).collect(),
    };

    for index in targets {
        handle.rotate_page(index, angle.degrees())?;
    }

    let name = format!("{}_rotated_{}deg.pdf", source.base_name(), angle.degrees());
    handle.into_output(name)
}

/// Delete pages by 0-based index; returns the output and how many were removed
pub fn delete_pages(source: &SourceFile, pages: &[usize]) -> Result<(OutputFile, usize)> {
    let mut handle = PdfHandle::load(source)?;
    let total = handle.page_count();
    let remaining = (0..total).filter(|i| !pages.contains(i)).count();
    if remaining == 0 {
        return Err(PagesError::validation("Cannot delete every page of a document"));
    }

    let deleted = handle.remove_pages(pages);
    log::debug!("Deleted {} of {} pages from {}", deleted, total, source.name);
    let name = format!("{}_pages_removed.pdf", source.base_name());
    Ok((handle.into_output(name)?, deleted))
}

/// Rebuild the document with pages in `order` (0-based, repeats allowed)
pub fn reorder(source: &SourceFile, order: &[usize]) -> Result<OutputFile> {
    if order.is_empty() {
        return Err(PagesError::validation("No pages given for the new order"));
    }
    let handle = PdfHandle::load(source)?;
    let name = format!("{}_reordered.pdf", source.base_name());
    handle.copy_pages(order, name.clone())?.into_output(name)
}

/// Shrink each page's visible box by the given margins
pub fn crop(source: &SourceFile, margins: &CropMargins) -> Result<OutputFile> {
    margins.validate()?;
    let mut handle = PdfHandle::load(source)?;

    // Compute every box before touching the document
    let mut boxes = Vec::with_capacity(handle.page_count());
    for index in 0..handle.page_count() {
        let current = handle.crop_box(index)?;
        let cropped = margins.apply(current);
        if cropped.width() <= 0.0 || cropped.height() <= 0.0 {
            return Err(PagesError::validation(format!(
                "Margins leave no visible area on page {} ({} x {} pt)",
                index + 1,
                current.width(),
                current.height()
            )));
        }
        boxes.push(cropped);
    }

    for (index, page_box) in boxes.into_iter().enumerate() {
        handle.set_crop_box(index, page_box)?;
    }

    let name = format!("{}_cropped.pdf", source.base_name());
    handle.into_output(name)
}

impl CropMargins {
    pub fn apply(&self, page_box: PageBox) -> PageBox {
        PageBox {
            left: page_box.left + self.left,
            bottom: page_box.bottom + self.bottom,
            right: page_box.right - self.right,
            top: page_box.top - self.top,
        }
    }
}
