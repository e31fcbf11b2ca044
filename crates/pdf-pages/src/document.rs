//! Loaded document handle
//!
//! `PdfHandle` owns one parsed `lopdf::Document` for the duration of a single
//! transform. It exposes the page-level primitives the transforms are built
//! from: page lookup, copying a page sequence into a fresh document, page
//! removal, rotation, page boxes and serialization.

use crate::constants::DEFAULT_PAGE_DIMENSIONS;
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::path::Path;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Catalog entries that point into the page tree and would keep dropped pages alive
const NAVIGATION_ENTRIES: [&[u8]; 5] = [
    b"Outlines",
    b"Dests",
    b"OpenAction",
    b"PageLabels",
    b"StructTreeRoot",
];

/// Axis-aligned page box in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    fn from_array(arr: &[Object]) -> Option<Self> {
        if arr.len() != 4 {
            return None;
        }
        let x0 = extract_number(&arr[0])?;
        let y0 = extract_number(&arr[1])?;
        let x1 = extract_number(&arr[2])?;
        let y1 = extract_number(&arr[3])?;
        Some(Self {
            left: x0.min(x1),
            bottom: y0.min(y1),
            right: x0.max(x1),
            top: y0.max(y1),
        })
    }

    pub(crate) fn to_object(self) -> Object {
        Object::Array(vec![
            Object::Real(self.left),
            Object::Real(self.bottom),
            Object::Real(self.right),
            Object::Real(self.top),
        ])
    }
}

impl Default for PageBox {
    fn default() -> Self {
        Self {
            left: 0.0,
            bottom: 0.0,
            right: DEFAULT_PAGE_DIMENSIONS.0,
            top: DEFAULT_PAGE_DIMENSIONS.1,
        }
    }
}

/// An in-memory PDF, created per operation and dropped when it completes
#[derive(Debug, Clone)]
pub struct PdfHandle {
    doc: Document,
    name: String,
}

impl PdfHandle {
    /// Parse a source file. Encrypted files are accepted when lopdf can open them.
    pub fn load(source: &SourceFile) -> Result<Self> {
        let doc = Document::load_mem(&source.bytes).map_err(|e| PagesError::DocumentLoad {
            name: source.name.clone(),
            source: e,
        })?;
        Ok(Self {
            doc,
            name: source.name.clone(),
        })
    }

    pub fn from_document(doc: Document, name: impl Into<String>) -> Self {
        Self {
            doc,
            name: name.into(),
        }
    }

    /// A document with an empty page tree
    pub fn empty(name: impl Into<String>) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(Vec::new())),
                ("Count", Object::Integer(0)),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        Self::from_document(doc, name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object ids in document order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().values().copied().collect()
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        let ids = self.page_ids();
        ids.get(index).copied().ok_or_else(|| {
            PagesError::validation(format!(
                "Page index {} out of range ({} pages)",
                index,
                ids.len()
            ))
        })
    }

    /// Build a new document holding the given pages in the given order.
    ///
    /// Inherited attributes are copied onto each page so the result has a
    /// flat page tree. An index may appear more than once.
    pub fn copy_pages(&self, indices: &[usize], name: impl Into<String>) -> Result<PdfHandle> {
        let page_ids = self.page_ids();
        if let Some(&bad) = indices.iter().find(|&&i| i >= page_ids.len()) {
            return Err(PagesError::validation(format!(
                "Page index {} out of range ({} pages)",
                bad,
                page_ids.len()
            )));
        }

        let mut doc = self.doc.clone();
        let pages_id = pages_root_id(&doc)?;

        let mut kids = Vec::with_capacity(indices.len());
        let mut placed = HashSet::new();
        for &index in indices {
            let source_id = page_ids[index];
            let mut page = materialize_page(&doc, source_id)?;
            page.set("Parent", Object::Reference(pages_id));

            let page_id = if placed.insert(source_id) {
                doc.objects.insert(source_id, Object::Dictionary(page));
                source_id
            } else {
                doc.add_object(page)
            };
            kids.push(Object::Reference(page_id));
        }

        set_page_tree(&mut doc, pages_id, kids)?;
        strip_navigation(&mut doc)?;
        doc.prune_objects();

        Ok(PdfHandle::from_document(doc, name))
    }

    /// Remove pages by 0-based index and return how many were removed.
    ///
    /// Indices are deduplicated, out-of-range ones ignored, and removal runs
    /// from the highest index down so earlier removals never shift later ones.
    pub fn remove_pages(&mut self, indices: &[usize]) -> usize {
        let total = self.page_count();
        let mut targets: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < total)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        targets.sort_unstable_by(|a, b| b.cmp(a));

        for &index in &targets {
            self.doc.delete_pages(&[index as u32 + 1]);
        }
        if !targets.is_empty() {
            self.doc.prune_objects();
        }
        targets.len()
    }

    /// Effective rotation of a page in degrees, following inheritance
    pub fn rotation(&self, index: usize) -> Result<i64> {
        let page_id = self.page_id(index)?;
        Ok(inherited(&self.doc, page_id, b"Rotate")?
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0))
    }

    /// Add `degrees` to a page's current rotation, modulo 360
    pub fn rotate_page(&mut self, index: usize, degrees: i64) -> Result<i64> {
        let page_id = self.page_id(index)?;
        let rotation = (self.rotation(index)? + degrees).rem_euclid(360);
        self.doc
            .get_dictionary_mut(page_id)?
            .set("Rotate", Object::Integer(rotation));
        Ok(rotation)
    }

    /// The page's MediaBox, following inheritance
    pub fn media_box(&self, index: usize) -> Result<PageBox> {
        let page_id = self.page_id(index)?;
        Ok(inherited_box(&self.doc, page_id, b"MediaBox")?.unwrap_or_default())
    }

    /// The visible region: CropBox when set, otherwise MediaBox
    pub fn crop_box(&self, index: usize) -> Result<PageBox> {
        let page_id = self.page_id(index)?;
        match inherited_box(&self.doc, page_id, b"CropBox")? {
            Some(b) => Ok(b),
            None => self.media_box(index),
        }
    }

    pub fn set_crop_box(&mut self, index: usize, page_box: PageBox) -> Result<()> {
        let page_id = self.page_id(index)?;
        self.doc
            .get_dictionary_mut(page_id)?
            .set("CropBox", page_box.to_object());
        Ok(())
    }

    /// Copy inherited attributes onto the page so it can be edited in place
    pub(crate) fn materialize(&mut self, index: usize) -> Result<ObjectId> {
        let page_id = self.page_id(index)?;
        let page = materialize_page(&self.doc, page_id)?;
        self.doc.objects.insert(page_id, Object::Dictionary(page));
        Ok(page_id)
    }

    /// Page count, size and Info dictionary fields
    pub fn info(&self, file_size: usize) -> DocumentInfo {
        let info = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| match obj {
                Object::Reference(id) => self.doc.get_dictionary(*id).ok(),
                Object::Dictionary(dict) => Some(dict),
                _ => None,
            });
        let field = |key: &[u8]| info.and_then(|dict| dict.get(key).ok()).and_then(text_string);

        DocumentInfo {
            page_count: self.page_count(),
            file_size,
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
        }
    }

    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        let mut writer = Vec::new();
        self.doc.save_to(&mut writer)?;
        Ok(writer)
    }

    pub fn into_output(self, name: impl Into<String>) -> Result<OutputFile> {
        Ok(OutputFile::new(name, self.to_bytes()?))
    }
}

/// Load a PDF from disk
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<PdfHandle> {
    let source = SourceFile::read(path).await?;
    tokio::task::spawn_blocking(move || PdfHandle::load(&source)).await?
}

/// Serialize and write a document
pub async fn save_pdf(handle: PdfHandle, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref().to_owned();
    let bytes = tokio::task::spawn_blocking(move || handle.to_bytes()).await??;
    tokio::fs::write(&path, bytes).await?;
    Ok(())
}

// =============================================================================
// Page Tree Helpers
// =============================================================================

pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_dictionary(catalog_id)?;
    Ok(catalog.get(b"Pages")?.as_reference()?)
}

pub(crate) fn set_page_tree(doc: &mut Document, pages_id: ObjectId, kids: Vec<Object>) -> Result<()> {
    let count = kids.len() as i64;
    let pages = doc.get_dictionary_mut(pages_id)?;
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", Object::Integer(count));
    Ok(())
}

fn strip_navigation(doc: &mut Document) -> Result<()> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_dictionary_mut(catalog_id)?;
    for key in NAVIGATION_ENTRIES {
        catalog.remove(key);
    }
    Ok(())
}

/// Clone a page dictionary with inherited attributes made explicit
pub(crate) fn materialize_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    for key in INHERITABLE_ATTRIBUTES {
        if !page.has(key) {
            if let Some(value) = inherited(doc, page_id, key)? {
                page.set(key.to_vec(), value.clone());
            }
        }
    }
    Ok(page)
}

/// Look up `key` on a page, then on each ancestor
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut current = page_id;
    let mut visited = HashSet::new();
    while visited.insert(current) {
        let dict = doc.get_dictionary(current)?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    Ok(None)
}

fn inherited_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<PageBox>> {
    let obj = match inherited(doc, page_id, key)? {
        Some(Object::Reference(id)) => doc.get_object(*id)?,
        Some(obj) => obj,
        None => return Ok(None),
    };
    Ok(obj.as_array().ok().and_then(|arr| PageBox::from_array(arr)))
}

/// Extract numeric value from a PDF object
pub(crate) fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char)
fn text_string(obj: &Object) -> Option<String> {
    let bytes = match obj {
        Object::String(bytes, _) => bytes,
        _ => return None,
    };
    let text = if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    };
    Some(text).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, page_labels};

    #[test]
    fn test_load_reports_file_name_on_failure() {
        let source = SourceFile::new("broken.pdf", b"not a pdf".to_vec());
        match PdfHandle::load(&source) {
            Err(PagesError::DocumentLoad { name, .. }) => assert_eq!(name, "broken.pdf"),
            other => panic!("Expected DocumentLoad error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_copy_pages_in_plan_order() {
        let handle = PdfHandle::load(&create_test_pdf("doc.pdf", 5)).unwrap();
        let copy = handle.copy_pages(&[3, 0, 2], "copy.pdf").unwrap();
        assert_eq!(copy.page_count(), 3);
        assert_eq!(page_labels(copy.document()), vec!["doc-4", "doc-1", "doc-3"]);
    }

    #[test]
    fn test_copy_pages_allows_repeats() {
        let handle = PdfHandle::load(&create_test_pdf("doc.pdf", 2)).unwrap();
        let copy = handle.copy_pages(&[1, 1, 0], "copy.pdf").unwrap();
        assert_eq!(page_labels(copy.document()), vec!["doc-2", "doc-2", "doc-1"]);
    }

    #[test]
    fn test_copy_pages_rejects_out_of_range() {
        let handle = PdfHandle::load(&create_test_pdf("doc.pdf", 2)).unwrap();
        assert!(matches!(
            handle.copy_pages(&[2], "copy.pdf"),
            Err(PagesError::Validation(_))
        ));
    }

    #[test]
    fn test_remove_pages_dedups_and_ignores_out_of_range() {
        let mut handle = PdfHandle::load(&create_test_pdf("doc.pdf", 6)).unwrap();
        let removed = handle.remove_pages(&[4, 4, 1, 17]);
        assert_eq!(removed, 2);
        assert_eq!(
            page_labels(handle.document()),
            vec!["doc-1", "doc-3", "doc-4", "doc-6"]
        );
    }

    #[test]
    fn test_rotation_is_additive() {
        let mut handle = PdfHandle::load(&create_test_pdf("doc.pdf", 1)).unwrap();
        handle.rotate_page(0, 270).unwrap();
        assert_eq!(handle.rotate_page(0, 270).unwrap(), 180);
        assert_eq!(handle.rotation(0).unwrap(), 180);
    }

    #[test]
    fn test_empty_document_round_trips() {
        let bytes = PdfHandle::empty("empty.pdf").to_bytes().unwrap();
        let reloaded = PdfHandle::load(&SourceFile::new("empty.pdf", bytes)).unwrap();
        assert_eq!(reloaded.page_count(), 0);
    }

    #[test]
    fn test_media_box_defaults() {
        let handle = PdfHandle::load(&create_test_pdf("doc.pdf", 1)).unwrap();
        let media = handle.media_box(0).unwrap();
        assert_eq!((media.width(), media.height()), (612.0, 792.0));
        assert_eq!(handle.crop_box(0).unwrap(), media);
    }
}
