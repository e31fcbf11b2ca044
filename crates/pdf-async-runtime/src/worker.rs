use crate::error::{Result, RuntimeError};
use crate::{PdfCommand, PdfUpdate};
use pdf_pages::{Engine, Operation, OutcomeDetail, OutputFile, SourceFile};
use pdf_thumbnails::ThumbnailCache;
use pdf_workbench::{Action, EntryId, Workbench};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Front-end handle to a running worker task
#[derive(Debug, Clone)]
pub struct Worker {
    command_tx: mpsc::UnboundedSender<PdfCommand>,
}

impl Worker {
    /// Spawn the worker on the current runtime
    pub fn spawn(engine: Engine) -> (Self, mpsc::UnboundedReceiver<PdfUpdate>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        tokio::spawn(worker_task(command_rx, update_tx, engine));
        (Self { command_tx }, update_rx)
    }

    pub fn send(&self, command: PdfCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| RuntimeError::Disconnected)
    }
}

/// State owned by the worker between commands
struct Session {
    workbench: Workbench,
    engine: Engine,
    thumbnails: Option<ThumbnailCache>,
}

/// Async worker task that processes PDF commands and sends updates
pub async fn worker_task(
    mut command_rx: mpsc::UnboundedReceiver<PdfCommand>,
    update_tx: mpsc::UnboundedSender<PdfUpdate>,
    engine: Engine,
) {
    let thumbnails = engine.rasterizer().cloned().map(ThumbnailCache::new);
    let mut session = Session {
        workbench: Workbench::new(),
        engine,
        thumbnails,
    };

    while let Some(cmd) = command_rx.recv().await {
        process_command(cmd, &mut session, &mut command_rx, &update_tx).await;
    }
}

async fn process_command(
    cmd: PdfCommand,
    session: &mut Session,
    command_rx: &mut mpsc::UnboundedReceiver<PdfCommand>,
    update_tx: &mpsc::UnboundedSender<PdfUpdate>,
) {
    match cmd {
        PdfCommand::AddFiles { paths } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in paths {
                match SourceFile::read(&path).await {
                    Ok(file) => files.push(Arc::new(file)),
                    Err(e) => {
                        let _ = update_tx.send(PdfUpdate::Error {
                            message: format!("Failed to read {}: {}", path.display(), e),
                        });
                    }
                }
            }
            if files.is_empty() {
                return;
            }
            let ids = session.workbench.add_files(files);
            send_state(&session.workbench, update_tx);
            generate_thumbnails(session, ids, update_tx).await;
        }
        PdfCommand::Workbench(action) => {
            let resize = matches!(action, Action::SetThumbnailSize(_));
            session.workbench.dispatch(action);
            send_state(&session.workbench, update_tx);
            if resize {
                let ids = session.workbench.state().files.iter().map(|f| f.id).collect();
                generate_thumbnails(session, ids, update_tx).await;
            }
        }
        PdfCommand::GenerateThumbnails { mut ids } => {
            // Fold queued thumbnail requests into this one
            while let Ok(next_cmd) = command_rx.try_recv() {
                if let PdfCommand::GenerateThumbnails { ids: more } = next_cmd {
                    log::debug!("Merging queued thumbnail request");
                    for id in more {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                } else {
                    // Can't put it back, so handle it before the thumbnails
                    Box::pin(process_command(next_cmd, session, command_rx, update_tx)).await;
                }
            }

            generate_thumbnails(session, ids, update_tx).await;
        }
        PdfCommand::MergeCollection { output_dir } => {
            let state = session.workbench.state();
            let chosen = if state.selection.is_empty() {
                state.files.iter().collect::<Vec<_>>()
            } else {
                state.selected_files()
            };
            let inputs = chosen.into_iter().map(|f| f.file.as_ref().clone()).collect();
            let result = run_operation(&session.engine, Operation::Merge, inputs, &output_dir).await;
            report(Operation::Merge.name(), result, update_tx);
        }
        PdfCommand::Execute {
            operation,
            inputs,
            output_dir,
        } => {
            let name = operation.name();
            let result = match read_inputs(&inputs).await {
                Ok(sources) => run_operation(&session.engine, operation, sources, &output_dir).await,
                Err(e) => Err(e),
            };
            report(name, result, update_tx);
        }
    }
}

fn send_state(workbench: &Workbench, update_tx: &mpsc::UnboundedSender<PdfUpdate>) {
    let _ = update_tx.send(PdfUpdate::StateChanged {
        state: workbench.state().clone(),
        can_undo: workbench.can_undo(),
        can_redo: workbench.can_redo(),
    });
}

/// Render previews for `ids` at the current thumbnail size and record the
/// outcome of each on its entry
async fn generate_thumbnails(
    session: &mut Session,
    ids: Vec<EntryId>,
    update_tx: &mpsc::UnboundedSender<PdfUpdate>,
) {
    let files: Vec<_> = ids
        .iter()
        .filter_map(|id| {
            session
                .workbench
                .state()
                .entry(*id)
                .map(|entry| (*id, Arc::clone(&entry.file)))
        })
        .collect();
    if files.is_empty() {
        return;
    }

    let Some(cache) = session.thumbnails.clone() else {
        for (id, _) in files {
            fail_thumbnail(&mut session.workbench, id, "No page renderer is configured".to_string(), update_tx);
        }
        send_state(&session.workbench, update_tx);
        return;
    };

    for (id, _) in &files {
        session
            .workbench
            .dispatch(Action::SetThumbnailLoading { id: *id, loading: true });
    }

    let total = files.len();
    let max_size = session.workbench.state().thumbnail_size.pixels();
    let results = cache.generate_batch(files, max_size).await;

    for (current, (id, result)) in results.into_iter().enumerate() {
        match result {
            Ok(thumbnail) => {
                let _ = update_tx.send(PdfUpdate::ThumbnailReady {
                    id,
                    width: thumbnail.width,
                    height: thumbnail.height,
                    page_count: thumbnail.page_count,
                });
                session.workbench.dispatch(Action::UpdateThumbnail {
                    id,
                    page_count: thumbnail.page_count,
                    thumbnail,
                });
            }
            Err(e) => fail_thumbnail(&mut session.workbench, id, e.to_string(), update_tx),
        }
        let _ = update_tx.send(PdfUpdate::Progress {
            operation: "thumbnails".to_string(),
            current: current + 1,
            total,
        });
    }
    send_state(&session.workbench, update_tx);
}

fn fail_thumbnail(
    workbench: &mut Workbench,
    id: EntryId,
    message: String,
    update_tx: &mpsc::UnboundedSender<PdfUpdate>,
) {
    log::warn!("Thumbnail for {} failed: {}", id, message);
    workbench.dispatch(Action::SetError {
        id,
        error: Some(message.clone()),
    });
    let _ = update_tx.send(PdfUpdate::ThumbnailFailed { id, message });
}

async fn read_inputs(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        sources.push(SourceFile::read(path).await?);
    }
    Ok(sources)
}

async fn run_operation(
    engine: &Engine,
    operation: Operation,
    inputs: Vec<SourceFile>,
    output_dir: &Path,
) -> Result<(Vec<PathBuf>, OutcomeDetail)> {
    let outcome = engine.execute_async(operation, inputs).await?;
    let paths = save_outputs(&outcome.files, output_dir).await?;
    Ok((paths, outcome.detail))
}

async fn save_outputs(files: &[OutputFile], output_dir: &Path) -> Result<Vec<PathBuf>> {
    if !files.is_empty() {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(pdf_pages::PagesError::from)?;
    }
    let mut paths = Vec::with_capacity(files.len());
    for file in files {
        paths.push(file.save_into(output_dir).await?);
    }
    Ok(paths)
}

fn report(
    operation: &str,
    result: Result<(Vec<PathBuf>, OutcomeDetail)>,
    update_tx: &mpsc::UnboundedSender<PdfUpdate>,
) {
    let update = match result {
        Ok((paths, detail)) => {
            log::info!("{} wrote {} file(s)", operation, paths.len());
            PdfUpdate::OperationComplete {
                operation: operation.to_string(),
                paths,
                detail,
            }
        }
        Err(e) => PdfUpdate::Error {
            message: format!("{} failed: {}", operation, e),
        },
    };
    let _ = update_tx.send(update);
}
