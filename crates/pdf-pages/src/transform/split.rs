//! Splitting and extraction
//!
//! Every function loads its own handle, validates its parameters before
//! producing anything, and returns either the full output set or an error.

use crate::constants::DEFAULT_WORKERS;
use crate::document::PdfHandle;
use crate::selector::{parse_page_list, parse_ranges};
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One output document per usable range group, groups in the order typed
pub fn split_by_ranges(source: &SourceFile, ranges: &str) -> Result<Vec<OutputFile>> {
    let handle = PdfHandle::load(source)?;
    let groups = parse_ranges(ranges, handle.page_count())?;
    let base = source.base_name();

    groups
        .iter()
        .map(|pages| {
            let label = pages
                .iter()
                .map(|p| (p + 1).to_string())
                .collect::<Vec<_>>()
                .join("-");
            let name = format!("{}_pages_{}.pdf", base, label);
            handle.copy_pages(pages, name.clone())?.into_output(name)
        })
        .collect()
}

/// Selected pages, deduplicated and ascending, in a single document
pub fn extract_pages(source: &SourceFile, pages: &str) -> Result<OutputFile> {
    let handle = PdfHandle::load(source)?;
    let indices = parse_page_list(pages, handle.page_count())?;
    let name = format!("{}_extracted.pdf", source.base_name());
    handle.copy_pages(&indices, name.clone())?.into_output(name)
}

/// Consecutive chunks of `n` pages; the last chunk may be shorter
pub fn split_every(source: &SourceFile, n: usize) -> Result<Vec<OutputFile>> {
    if n < 1 {
        return Err(PagesError::validation("Number of pages must be at least 1"));
    }
    let handle = PdfHandle::load(source)?;
    let plan = chunk_plan(handle.page_count(), n);
    write_parts(&handle, source.base_name(), &plan)
}

/// Exactly `n` documents; the first `total % n` get one extra page
pub fn split_into(source: &SourceFile, n: usize) -> Result<Vec<OutputFile>> {
    if n < 2 {
        return Err(PagesError::validation("Must split into at least 2 files"));
    }
    let handle = PdfHandle::load(source)?;
    let plan = equal_parts_plan(handle.page_count(), n)?;
    write_parts(&handle, source.base_name(), &plan)
}

/// One single-page document per page
pub fn split_all(source: &SourceFile) -> Result<Vec<OutputFile>> {
    let handle = PdfHandle::load(source)?;
    let base = source.base_name();
    (0..handle.page_count())
        .map(|i| {
            let name = format!("{}_page_{}.pdf", base, i + 1);
            handle.copy_pages(&[i], name.clone())?.into_output(name)
        })
        .collect()
}

/// `split_all` with each page built on a bounded pool of blocking tasks.
///
/// Output order matches page order regardless of completion order.
pub async fn split_all_parallel(source: SourceFile, workers: usize) -> Result<Vec<OutputFile>> {
    let handle = tokio::task::spawn_blocking(move || PdfHandle::load(&source).map(|h| (h, source)))
        .await??;
    let (handle, source) = handle;
    let handle = Arc::new(handle);
    let base = source.base_name().to_string();
    let limit = Arc::new(Semaphore::new(workers.clamp(1, DEFAULT_WORKERS * 4)));

    let mut tasks = Vec::with_capacity(handle.page_count());
    for i in 0..handle.page_count() {
        let handle = Arc::clone(&handle);
        let limit = Arc::clone(&limit);
        let name = format!("{}_page_{}.pdf", base, i + 1);
        tasks.push(tokio::spawn(async move {
            let _permit = limit
                .acquire_owned()
                .await
                .map_err(|e| PagesError::Config(e.to_string()))?;
            tokio::task::spawn_blocking(move || handle.copy_pages(&[i], name.clone())?.into_output(name))
                .await?
        }));
    }

    let mut outputs = Vec::with_capacity(tasks.len());
    for task in tasks {
        outputs.push(task.await??);
    }
    Ok(outputs)
}

/// Index groups of at most `n` consecutive pages
pub fn chunk_plan(total_pages: usize, n: usize) -> Vec<Vec<usize>> {
    (0..total_pages)
        .collect::<Vec<_>>()
        .chunks(n.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

/// Index groups for `n` near-equal parts, larger parts first
pub fn equal_parts_plan(total_pages: usize, n: usize) -> Result<Vec<Vec<usize>>> {
    if n == 0 || n > total_pages {
        return Err(PagesError::validation(format!(
            "Cannot split {} pages into {} files",
            total_pages, n
        )));
    }

    let per_part = total_pages / n;
    let extra = total_pages % n;
    let mut next = 0;
    Ok((0..n)
        .map(|part| {
            let len = per_part + usize::from(part < extra);
            let group: Vec<usize> = (next..next + len).collect();
            next += len;
            group
        })
        .collect())
}

fn write_parts(handle: &PdfHandle, base: &str, plan: &[Vec<usize>]) -> Result<Vec<OutputFile>> {
    plan.iter()
        .enumerate()
        .map(|(i, pages)| {
            let name = format!("{}_part_{}.pdf", base, i + 1);
            handle.copy_pages(pages, name.clone())?.into_output(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, load, page_labels};
    use pretty_assertions::assert_eq;

    fn page_counts(outputs: &[OutputFile]) -> Vec<usize> {
        outputs.iter().map(|o| load(&o.bytes).get_pages().len()).collect()
    }

    #[test]
    fn test_split_by_ranges_names_and_order() {
        let source = create_test_pdf("report.pdf", 5);
        let outputs = split_by_ranges(&source, "4-5, 1").unwrap();
        assert_eq!(outputs[0].name, "report_pages_4-5.pdf");
        assert_eq!(outputs[1].name, "report_pages_1.pdf");
        assert_eq!(page_labels(&load(&outputs[0].bytes)), vec!["report-4", "report-5"]);
    }

    #[test]
    fn test_extract_is_sorted_and_deduplicated() {
        let source = create_test_pdf("doc.pdf", 5);
        let output = extract_pages(&source, "5, 2, 5").unwrap();
        assert_eq!(output.name, "doc_extracted.pdf");
        assert_eq!(page_labels(&load(&output.bytes)), vec!["doc-2", "doc-5"]);
    }

    #[test]
    fn test_extract_without_valid_pages_fails() {
        let source = create_test_pdf("doc.pdf", 3);
        assert!(matches!(
            extract_pages(&source, "9"),
            Err(PagesError::Validation(_))
        ));
    }

    #[test]
    fn test_split_every_n() {
        let source = create_test_pdf("doc.pdf", 7);
        let outputs = split_every(&source, 3).unwrap();
        assert_eq!(page_counts(&outputs), vec![3, 3, 1]);
        assert_eq!(outputs[2].name, "doc_part_3.pdf");
        assert!(matches!(split_every(&source, 0), Err(PagesError::Validation(_))));
    }

    #[test]
    fn test_split_into_assigns_extra_pages_first() {
        let source = create_test_pdf("doc.pdf", 10);
        let outputs = split_into(&source, 3).unwrap();
        assert_eq!(page_counts(&outputs), vec![4, 3, 3]);
    }

    #[test]
    fn test_split_into_more_parts_than_pages_fails() {
        let source = create_test_pdf("doc.pdf", 2);
        assert!(matches!(split_into(&source, 3), Err(PagesError::Validation(_))));
        assert!(matches!(split_into(&source, 1), Err(PagesError::Validation(_))));
    }

    #[test]
    fn test_split_all_single_pages() {
        let source = create_test_pdf("doc.pdf", 4);
        let outputs = split_all(&source).unwrap();
        assert_eq!(page_counts(&outputs), vec![1, 1, 1, 1]);
        assert_eq!(outputs[3].name, "doc_page_4.pdf");
    }

    #[tokio::test]
    async fn test_split_all_parallel_keeps_page_order() {
        let source = create_test_pdf("doc.pdf", 6);
        let outputs = split_all_parallel(source, 3).await.unwrap();
        let labels: Vec<String> = outputs
            .iter()
            .flat_map(|o| page_labels(&load(&o.bytes)))
            .collect();
        assert_eq!(labels, vec!["doc-1", "doc-2", "doc-3", "doc-4", "doc-5", "doc-6"]);
    }

    #[test]
    fn test_equal_parts_plan() {
        assert_eq!(
            equal_parts_plan(5, 2).unwrap(),
            vec![vec![0, 1, 2], vec![3, 4]]
        );
        assert!(equal_parts_plan(2, 3).is_err());
    }
}
