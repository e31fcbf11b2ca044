use std::path::PathBuf;

mod error;
mod remote;
mod worker;

pub use error::{Result, RuntimeError};
pub use remote::{DownloadTarget, ProcessingResponse, content_type_for};
pub use worker::{Worker, worker_task};

// Re-export types from library crates
pub use pdf_pages::{Engine, Operation, OutcomeDetail};
pub use pdf_thumbnails::{Thumbnail, ThumbnailCache, ThumbnailSize};
pub use pdf_workbench::{Action, EntryId, WorkbenchState};

/// Commands sent from a front end to the worker
#[derive(Debug)]
pub enum PdfCommand {
    /// Read files from disk into the collection and start their thumbnails
    AddFiles {
        paths: Vec<PathBuf>,
    },
    /// Any other collection transition
    Workbench(Action),
    /// Render (or re-render) previews at the current thumbnail size
    GenerateThumbnails {
        ids: Vec<EntryId>,
    },
    /// Merge the selected entries, or all entries when nothing is selected
    MergeCollection {
        output_dir: PathBuf,
    },
    Execute {
        operation: Operation,
        inputs: Vec<PathBuf>,
        output_dir: PathBuf,
    },
}

/// Updates sent from the worker to the front end
#[derive(Debug, Clone)]
pub enum PdfUpdate {
    Progress {
        operation: String,
        current: usize,
        total: usize,
    },
    StateChanged {
        state: WorkbenchState,
        can_undo: bool,
        can_redo: bool,
    },
    ThumbnailReady {
        id: EntryId,
        width: u32,
        height: u32,
        page_count: usize,
    },
    ThumbnailFailed {
        id: EntryId,
        message: String,
    },
    OperationComplete {
        operation: String,
        paths: Vec<PathBuf>,
        detail: OutcomeDetail,
    },
    Error {
        message: String,
    },
}
