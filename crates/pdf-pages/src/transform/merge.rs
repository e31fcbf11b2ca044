//! Merge documents by concatenating their pages
//!
//! Each source is renumbered past the current maximum object id, its page
//! tree and catalog are dropped, and its pages are re-parented under a single
//! flat page tree in input order.

use crate::document::{PdfHandle, materialize_page, pages_root_id, set_page_tree};
use crate::types::*;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashSet;

pub const MERGED_NAME: &str = "merged.pdf";

/// Merge source files in list order. An empty list yields a 0-page document.
pub fn merge(sources: &[SourceFile]) -> Result<OutputFile> {
    let mut handles = Vec::with_capacity(sources.len());
    for source in sources {
        handles.push(PdfHandle::load(source)?);
    }
    merge_handles(handles)?.into_output(MERGED_NAME)
}

/// Merge already loaded documents, consuming them
pub fn merge_handles(handles: Vec<PdfHandle>) -> Result<PdfHandle> {
    let mut merged = PdfHandle::empty(MERGED_NAME);
    let pages_id = pages_root_id(merged.document())?;
    let mut kids = Vec::new();

    for handle in handles {
        log::debug!("Merging {} ({} pages)", handle.name(), handle.page_count());
        let mut doc = handle.into_document();
        doc.renumber_objects_with(merged.document().max_id + 1);

        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        let mut pages = Vec::with_capacity(page_ids.len());
        for &page_id in &page_ids {
            let mut page = materialize_page(&doc, page_id)?;
            page.set("Parent", Object::Reference(pages_id));
            pages.push((page_id, page));
        }

        let structural = structural_objects(&doc);
        let source_max = doc.max_id;
        let target = merged.document_mut();
        for (id, object) in doc.objects {
            if !structural.contains(&id) {
                target.objects.insert(id, object);
            }
        }
        for (page_id, page) in pages {
            target.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }
        target.max_id = target.max_id.max(source_max);
    }

    set_page_tree(merged.document_mut(), pages_id, kids)?;
    merged.document_mut().prune_objects();
    Ok(merged)
}

/// Catalog and page tree node ids, which the merged document replaces
fn structural_objects(doc: &Document) -> HashSet<ObjectId> {
    doc.objects
        .iter()
        .filter(|(_, object)| {
            object.as_dict().is_ok_and(|dict| {
                matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Pages" || name == b"Catalog")
            })
        })
        .map(|(&id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, load, page_labels};
    use crate::transform::split::split_all;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_concatenates_in_order() {
        let a = create_test_pdf("a.pdf", 2);
        let b = create_test_pdf("b.pdf", 3);
        let output = merge(&[a, b]).unwrap();
        assert_eq!(output.name, "merged.pdf");
        assert_eq!(
            page_labels(&load(&output.bytes)),
            vec!["a-1", "a-2", "b-1", "b-2", "b-3"]
        );
    }

    #[test]
    fn test_merge_empty_list_is_empty_document() {
        let output = merge(&[]).unwrap();
        assert_eq!(load(&output.bytes).get_pages().len(), 0);
    }

    #[test]
    fn test_merge_single_document_round_trips() {
        let a = create_test_pdf("a.pdf", 3);
        let output = merge(&[a]).unwrap();
        assert_eq!(page_labels(&load(&output.bytes)), vec!["a-1", "a-2", "a-3"]);
    }

    #[test]
    fn test_merge_rejects_corrupt_input() {
        let a = create_test_pdf("a.pdf", 1);
        let bad = SourceFile::new("bad.pdf", b"%PDF-1.7 garbage".to_vec());
        match merge(&[a, bad]) {
            Err(PagesError::DocumentLoad { name, .. }) => assert_eq!(name, "bad.pdf"),
            other => panic!("Expected DocumentLoad, got {:?}", other.map(|o| o.name)),
        }
    }

    #[test]
    fn test_split_all_then_merge_restores_page_count() {
        let source = create_test_pdf("doc.pdf", 4);
        let parts: Vec<SourceFile> = split_all(&source)
            .unwrap()
            .into_iter()
            .map(|o| SourceFile::new(o.name, o.bytes))
            .collect();
        let merged = merge(&parts).unwrap();
        assert_eq!(
            page_labels(&load(&merged.bytes)),
            vec!["doc-1", "doc-2", "doc-3", "doc-4"]
        );
    }
}
