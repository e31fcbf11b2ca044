//! Best-effort size reduction
//!
//! Unreferenced objects and empty streams are dropped, the remaining objects
//! renumbered densely and every uncompressed stream Flate-encoded. Input that
//! is already compact can come out the same size or larger.

use crate::document::PdfHandle;
use crate::options::CompressionQuality;
use crate::types::*;

pub fn compress(source: &SourceFile, quality: CompressionQuality) -> Result<(OutputFile, CompressionStats)> {
    let mut handle = PdfHandle::load(source)?;
    let doc = handle.document_mut();

    let pruned = doc.prune_objects().len();
    let empty = doc.delete_zero_length_streams().len();
    doc.renumber_objects();
    doc.compress();
    log::debug!(
        "Compacting {}: pruned {} objects, {} empty streams",
        source.name,
        pruned,
        empty
    );

    let name = format!("{}_{}.pdf", source.base_name(), quality.suffix());
    let output = handle.into_output(name)?;
    let stats = CompressionStats::new(source.size(), output.bytes.len());
    Ok((output, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, load, page_labels};

    #[test]
    fn test_compress_keeps_pages_and_reports_sizes() {
        let source = create_test_pdf("doc.pdf", 3);
        let (output, stats) = compress(&source, CompressionQuality::Medium).unwrap();
        assert_eq!(output.name, "doc_compressed.pdf");
        assert_eq!(stats.original_size, source.size());
        assert_eq!(stats.compressed_size, output.bytes.len());
        assert_eq!(page_labels(&load(&output.bytes)), vec!["doc-1", "doc-2", "doc-3"]);
    }

    #[test]
    fn test_quality_only_changes_suffix() {
        let source = create_test_pdf("doc.pdf", 1);
        let (low, _) = compress(&source, CompressionQuality::Low).unwrap();
        let (high, _) = compress(&source, CompressionQuality::High).unwrap();
        assert_eq!(low.name, "doc_maxcompressed.pdf");
        assert_eq!(high.name, "doc_optimized.pdf");
        assert_eq!(low.bytes.len(), high.bytes.len());
    }
}
