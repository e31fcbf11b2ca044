//! Ordered file collection with linear undo/redo
//!
//! Structural edits (add, remove, clear, reorder) truncate any redo tail and
//! push one full snapshot. Selection, sorting, search and thumbnail results
//! are not part of history.

use crate::entry::*;
use pdf_pages::SourceFile;
use pdf_thumbnails::{Thumbnail, ThumbnailSize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Every state transition the workbench understands
#[derive(Debug, Clone)]
pub enum Action {
    AddFiles(Vec<Arc<SourceFile>>),
    RemoveFile(EntryId),
    RemoveFiles(Vec<EntryId>),
    ClearAll,
    Reorder {
        from: usize,
        to: usize,
    },
    Select(EntryId),
    ToggleSelect(EntryId),
    SelectAll,
    DeselectAll,
    SetSortOrder(SortOrder),
    SetSearchQuery(String),
    SetThumbnailSize(ThumbnailSize),
    UpdateThumbnail {
        id: EntryId,
        thumbnail: Thumbnail,
        page_count: usize,
    },
    SetThumbnailLoading {
        id: EntryId,
        loading: bool,
    },
    /// Record (or clear) a failure; always ends loading
    SetError {
        id: EntryId,
        error: Option<String>,
    },
    Undo,
    Redo,
}

/// What a view renders
#[derive(Debug, Clone, Default)]
pub struct WorkbenchState {
    pub files: Vec<PdfFileItem>,
    pub selection: BTreeSet<EntryId>,
    pub sort_order: SortOrder,
    pub search_query: String,
    pub thumbnail_size: ThumbnailSize,
}

impl WorkbenchState {
    /// Entries whose name contains the search query, ignoring case
    pub fn filtered_files(&self) -> Vec<&PdfFileItem> {
        if self.search_query.is_empty() {
            return self.files.iter().collect();
        }
        let query = self.search_query.to_lowercase();
        self.files
            .iter()
            .filter(|f| f.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn total_size(&self) -> usize {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn total_pages(&self) -> usize {
        self.files.iter().map(|f| f.page_count).sum()
    }

    pub fn entry(&self, id: EntryId) -> Option<&PdfFileItem> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn is_selected(&self, id: EntryId) -> bool {
        self.selection.contains(&id)
    }

    /// Selected entries in list order
    pub fn selected_files(&self) -> Vec<&PdfFileItem> {
        self.files
            .iter()
            .filter(|f| self.selection.contains(&f.id))
            .collect()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut PdfFileItem> {
        self.files.iter_mut().find(|f| f.id == id)
    }

    fn prune_selection(&mut self) {
        let files = &self.files;
        self.selection
            .retain(|id| files.iter().any(|f| f.id == *id));
    }
}

#[derive(Debug)]
pub struct Workbench {
    state: WorkbenchState,
    history: Vec<Vec<PdfFileItem>>,
    cursor: usize,
    /// Latest thumbnail results per entry, reapplied when a snapshot is restored
    derived: HashMap<EntryId, DerivedState>,
    next_id: u64,
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbench {
    pub fn new() -> Self {
        Self {
            state: WorkbenchState::default(),
            history: vec![Vec::new()],
            cursor: 0,
            derived: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn state(&self) -> &WorkbenchState {
        &self.state
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Apply one action and return the resulting state
    pub fn dispatch(&mut self, action: Action) -> &WorkbenchState {
        match action {
            Action::AddFiles(files) => {
                self.add_files(files);
            }
            Action::RemoveFile(id) => self.remove(&[id]),
            Action::RemoveFiles(ids) => self.remove(&ids),
            Action::ClearAll => {
                self.state.files.clear();
                self.state.selection.clear();
                self.snapshot();
            }
            Action::Reorder { from, to } => self.reorder(from, to),
            Action::Select(id) => {
                if self.state.entry(id).is_some() {
                    self.state.selection.insert(id);
                }
            }
            Action::ToggleSelect(id) => {
                if !self.state.selection.remove(&id) && self.state.entry(id).is_some() {
                    self.state.selection.insert(id);
                }
            }
            Action::SelectAll => {
                self.state.selection = self.state.files.iter().map(|f| f.id).collect();
            }
            Action::DeselectAll => self.state.selection.clear(),
            Action::SetSortOrder(order) => {
                self.state.sort_order = order;
                order.apply(&mut self.state.files);
            }
            Action::SetSearchQuery(query) => self.state.search_query = query,
            Action::SetThumbnailSize(size) => self.state.thumbnail_size = size,
            Action::UpdateThumbnail {
                id,
                thumbnail,
                page_count,
            } => self.update_derived(id, |d| {
                d.thumbnail = Some(thumbnail);
                d.page_count = page_count;
                d.thumbnail_loading = false;
            }),
            Action::SetThumbnailLoading { id, loading } => {
                self.update_derived(id, |d| d.thumbnail_loading = loading)
            }
            Action::SetError { id, error } => self.update_derived(id, |d| {
                d.error = error;
                d.thumbnail_loading = false;
            }),
            Action::Undo => {
                if self.can_undo() {
                    self.restore(self.cursor - 1);
                }
            }
            Action::Redo => {
                if self.can_redo() {
                    self.restore(self.cursor + 1);
                }
            }
        }
        &self.state
    }

    /// Append entries for `files` and return their new ids in input order
    pub fn add_files(&mut self, files: Vec<Arc<SourceFile>>) -> Vec<EntryId> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = EntryId(self.next_id);
            self.next_id += 1;
            self.state.files.push(PdfFileItem::new(id, file));
            ids.push(id);
        }
        self.snapshot();
        ids
    }

    fn remove(&mut self, ids: &[EntryId]) {
        self.state.files.retain(|f| !ids.contains(&f.id));
        self.state.prune_selection();
        self.snapshot();
    }

    fn reorder(&mut self, from: usize, to: usize) {
        let len = self.state.files.len();
        if from >= len || to >= len {
            log::warn!("Ignoring reorder {} -> {} in a list of {}", from, to, len);
            return;
        }
        let moved = self.state.files.remove(from);
        self.state.files.insert(to, moved);
        self.snapshot();
    }

    fn snapshot(&mut self) {
        self.history.truncate(self.cursor + 1);
        self.history.push(self.state.files.clone());
        self.cursor = self.history.len() - 1;
    }

    fn restore(&mut self, index: usize) {
        self.cursor = index;
        let mut files = self.history[index].clone();
        for file in &mut files {
            if let Some(derived) = self.derived.get(&file.id) {
                file.apply(derived);
            }
        }
        self.state.files = files;
        self.state.prune_selection();
    }

    /// Update the live entry and remember the result for entries that may
    /// come back through undo or redo
    fn update_derived(&mut self, id: EntryId, change: impl FnOnce(&mut DerivedState)) {
        if id.0 == 0 || id.0 >= self.next_id {
            log::debug!("Ignoring update for unknown entry {}", id);
            return;
        }
        let mut derived = match (self.derived.get(&id), self.state.entry(id)) {
            (_, Some(entry)) => entry.derived(),
            (Some(derived), None) => derived.clone(),
            (None, None) => self.last_known(id),
        };
        change(&mut derived);
        if let Some(entry) = self.state.entry_mut(id) {
            entry.apply(&derived);
        }
        self.derived.insert(id, derived);
    }

    fn last_known(&self, id: EntryId) -> DerivedState {
        self.history
            .iter()
            .rev()
            .flatten()
            .find(|f| f.id == id)
            .map(PdfFileItem::derived)
            .unwrap_or(DerivedState {
                page_count: 1,
                thumbnail: None,
                thumbnail_loading: true,
                error: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pdf(name: &str) -> Arc<SourceFile> {
        Arc::new(SourceFile::new(name, name.as_bytes().to_vec()))
    }

    fn names(state: &WorkbenchState) -> Vec<&str> {
        state.files.iter().map(|f| f.name.as_str()).collect()
    }

    fn thumbnail() -> Thumbnail {
        Thumbnail {
            width: 10,
            height: 12,
            page_count: 4,
            jpeg: Arc::new(vec![0xFF, 0xD8]),
        }
    }

    #[test]
    fn test_starts_empty() {
        let wb = Workbench::new();
        assert!(wb.state().files.is_empty());
        assert_eq!(wb.history_len(), 1);
        assert!(!wb.can_undo());
        assert!(!wb.can_redo());
    }

    #[test]
    fn test_undo_redo_and_redo_discard() {
        let mut wb = Workbench::new();
        wb.dispatch(Action::AddFiles(vec![pdf("a.pdf")]));
        wb.dispatch(Action::AddFiles(vec![pdf("b.pdf")]));

        assert_eq!(names(wb.dispatch(Action::Undo)), vec!["a.pdf"]);
        assert!(wb.can_redo());
        assert_eq!(names(wb.dispatch(Action::Redo)), vec!["a.pdf", "b.pdf"]);

        wb.dispatch(Action::Undo);
        wb.dispatch(Action::AddFiles(vec![pdf("c.pdf")]));
        assert!(!wb.can_redo());
        assert_eq!(names(wb.dispatch(Action::Redo)), vec!["a.pdf", "c.pdf"]);
        assert_eq!(wb.history_len(), 3);
    }

    #[test]
    fn test_undo_at_start_is_noop() {
        let mut wb = Workbench::new();
        wb.dispatch(Action::Undo);
        wb.dispatch(Action::Redo);
        assert!(wb.state().files.is_empty());
        assert_eq!(wb.history_len(), 1);
    }

    #[test]
    fn test_ids_are_unique_and_stable_across_reorder() {
        let mut wb = Workbench::new();
        let ids = wb.add_files(vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")]);
        assert_eq!(ids, vec![EntryId(1), EntryId(2), EntryId(3)]);

        let state = wb.dispatch(Action::Reorder { from: 0, to: 2 });
        assert_eq!(names(state), vec!["b.pdf", "c.pdf", "a.pdf"]);
        assert_eq!(state.files[2].id, EntryId(1));
    }

    #[test]
    fn test_reorder_same_index_still_snapshots() {
        let mut wb = Workbench::new();
        wb.add_files(vec![pdf("a.pdf"), pdf("b.pdf")]);
        wb.dispatch(Action::Reorder { from: 1, to: 1 });
        assert_eq!(wb.history_len(), 3);

        // out of range does nothing at all
        wb.dispatch(Action::Reorder { from: 0, to: 5 });
        assert_eq!(wb.history_len(), 3);
        assert_eq!(names(wb.state()), vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_remove_prunes_selection() {
        let mut wb = Workbench::new();
        let ids = wb.add_files(vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")]);
        wb.dispatch(Action::Select(ids[0]));
        wb.dispatch(Action::Select(ids[1]));

        let state = wb.dispatch(Action::RemoveFile(ids[0]));
        assert!(!state.is_selected(ids[0]));
        assert!(state.is_selected(ids[1]));

        let state = wb.dispatch(Action::RemoveFiles(vec![ids[1], ids[2]]));
        assert!(state.selection.is_empty());
        assert!(state.files.is_empty());
    }

    #[test]
    fn test_selection_is_not_undoable() {
        let mut wb = Workbench::new();
        let ids = wb.add_files(vec![pdf("a.pdf"), pdf("b.pdf")]);
        wb.dispatch(Action::SelectAll);
        assert_eq!(wb.history_len(), 2);

        wb.dispatch(Action::ToggleSelect(ids[0]));
        assert_eq!(wb.state().selection, BTreeSet::from([ids[1]]));

        wb.dispatch(Action::Select(EntryId(99)));
        assert!(!wb.state().is_selected(EntryId(99)));

        // undo back to empty drops the selection with the entries
        wb.dispatch(Action::Undo);
        assert!(wb.state().selection.is_empty());

        wb.dispatch(Action::Redo);
        wb.dispatch(Action::SelectAll);
        wb.dispatch(Action::DeselectAll);
        assert!(wb.state().selected_files().is_empty());
    }

    #[test]
    fn test_clear_all_snapshots() {
        let mut wb = Workbench::new();
        let ids = wb.add_files(vec![pdf("a.pdf")]);
        wb.dispatch(Action::Select(ids[0]));
        let state = wb.dispatch(Action::ClearAll);
        assert!(state.files.is_empty());
        assert!(state.selection.is_empty());

        assert_eq!(names(wb.dispatch(Action::Undo)), vec!["a.pdf"]);
    }

    #[test]
    fn test_sort_is_not_undoable() {
        let mut wb = Workbench::new();
        wb.add_files(vec![pdf("bbbb.pdf"), pdf("a.pdf")]);
        let state = wb.dispatch(Action::SetSortOrder(SortOrder::SizeAsc));
        assert_eq!(names(state), vec!["a.pdf", "bbbb.pdf"]);
        assert_eq!(state.sort_order, SortOrder::SizeAsc);
        assert_eq!(wb.history_len(), 2);
    }

    #[test]
    fn test_search_filters_by_name() {
        let mut wb = Workbench::new();
        wb.add_files(vec![pdf("Invoice.pdf"), pdf("notes.pdf")]);
        let state = wb.dispatch(Action::SetSearchQuery("INV".to_string()));
        let found: Vec<_> = state.filtered_files().iter().map(|f| f.name.clone()).collect();
        assert_eq!(found, vec!["Invoice.pdf"]);

        let state = wb.dispatch(Action::SetSearchQuery(String::new()));
        assert_eq!(state.filtered_files().len(), 2);
    }

    #[test]
    fn test_thumbnail_updates_totals() {
        let mut wb = Workbench::new();
        let ids = wb.add_files(vec![pdf("a.pdf"), pdf("bb.pdf")]);
        let state = wb.dispatch(Action::UpdateThumbnail {
            id: ids[0],
            thumbnail: thumbnail(),
            page_count: 4,
        });
        assert_eq!(state.total_pages(), 5);
        assert_eq!(state.total_size(), "a.pdf".len() + "bb.pdf".len());

        let entry = state.entry(ids[0]).unwrap();
        assert!(!entry.thumbnail_loading);
        assert!(entry.thumbnail.is_some());
        assert_eq!(wb.history_len(), 2);
    }

    #[test]
    fn test_error_ends_loading() {
        let mut wb = Workbench::new();
        let ids = wb.add_files(vec![pdf("a.pdf")]);
        let state = wb.dispatch(Action::SetError {
            id: ids[0],
            error: Some("render failed".to_string()),
        });
        let entry = state.entry(ids[0]).unwrap();
        assert_eq!(entry.error.as_deref(), Some("render failed"));
        assert!(!entry.thumbnail_loading);
    }

    #[test]
    fn test_derived_state_survives_undo_redo() {
        let mut wb = Workbench::new();
        let a = wb.add_files(vec![pdf("a.pdf")])[0];
        let b = wb.add_files(vec![pdf("b.pdf")])[0];
        wb.dispatch(Action::UpdateThumbnail {
            id: a,
            thumbnail: thumbnail(),
            page_count: 4,
        });

        // b resolves while it is undone
        wb.dispatch(Action::Undo);
        wb.dispatch(Action::SetError {
            id: b,
            error: Some("bad".to_string()),
        });

        let state = wb.dispatch(Action::Undo);
        assert!(state.files.is_empty());

        let state = wb.dispatch(Action::Redo);
        let entry = state.entry(a).unwrap();
        assert!(!entry.thumbnail_loading);
        assert_eq!(entry.page_count, 4);

        let state = wb.dispatch(Action::Redo);
        let entry = state.entry(b).unwrap();
        assert!(!entry.thumbnail_loading);
        assert_eq!(entry.error.as_deref(), Some("bad"));
    }

    #[test]
    fn test_thumbnail_size_setting() {
        let mut wb = Workbench::new();
        assert_eq!(wb.state().thumbnail_size.pixels(), 180);
        let state = wb.dispatch(Action::SetThumbnailSize(ThumbnailSize::Large));
        assert_eq!(state.thumbnail_size.pixels(), 240);
    }
}
