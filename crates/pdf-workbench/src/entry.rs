use chrono::{DateTime, Utc};
use pdf_pages::SourceFile;
use pdf_thumbnails::Thumbnail;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Stable identity of a collection entry, unique within one workbench
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pdf-{}", self.0)
    }
}

/// One pending source file and what has been derived from it so far
#[derive(Debug, Clone, PartialEq)]
pub struct PdfFileItem {
    pub id: EntryId,
    pub file: Arc<SourceFile>,
    pub name: String,
    pub size: usize,
    /// 1 until a thumbnail pass reports the real count
    pub page_count: usize,
    pub thumbnail: Option<Thumbnail>,
    pub thumbnail_loading: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PdfFileItem {
    pub(crate) fn new(id: EntryId, file: Arc<SourceFile>) -> Self {
        Self {
            id,
            name: file.name.clone(),
            size: file.size(),
            file,
            page_count: 1,
            thumbnail: None,
            thumbnail_loading: true,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn derived(&self) -> DerivedState {
        DerivedState {
            page_count: self.page_count,
            thumbnail: self.thumbnail.clone(),
            thumbnail_loading: self.thumbnail_loading,
            error: self.error.clone(),
        }
    }

    pub(crate) fn apply(&mut self, derived: &DerivedState) {
        self.page_count = derived.page_count;
        self.thumbnail = derived.thumbnail.clone();
        self.thumbnail_loading = derived.thumbnail_loading;
        self.error = derived.error.clone();
    }
}

/// Per-entry fields that change outside of history
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DerivedState {
    pub page_count: usize,
    pub thumbnail: Option<Thumbnail>,
    pub thumbnail_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Leave the list as it is
    #[default]
    Upload,
    NameAsc,
    NameDesc,
    SizeAsc,
    SizeDesc,
}

impl SortOrder {
    /// Stable sort of `files`; `Upload` leaves them untouched
    pub fn apply(self, files: &mut [PdfFileItem]) {
        match self {
            SortOrder::Upload => {}
            SortOrder::NameAsc => files.sort_by(compare_names),
            SortOrder::NameDesc => files.sort_by(|a, b| compare_names(b, a)),
            SortOrder::SizeAsc => files.sort_by_key(|f| f.size),
            SortOrder::SizeDesc => files.sort_by(|a, b| b.size.cmp(&a.size)),
        }
    }
}

fn compare_names(a: &PdfFileItem, b: &PdfFileItem) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}
