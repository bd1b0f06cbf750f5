//! Directory traversal producing the pipeline's path stream.
//!
//! A background thread walks the tree and sends every regular file's path
//! into a bounded channel, so a slow worker pool throttles traversal.
//! Non-regular entries (directories, symlinks, special files) are skipped
//! silently. The first traversal failure stops the walk and becomes the
//! terminal error; if cancellation is observed while blocked emitting a
//! path, the terminal error is [`PipelineError::WalkCanceled`] instead.
//!
//! The terminal error is buffered on a one-shot channel and sent only after
//! the path stream closes, so consumers can always drain paths to
//! completion before checking it.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use ignore::WalkBuilder;

use crate::cancel::CancelToken;
use crate::errors::PipelineError;

/// Handle to an in-flight walk.
pub struct WalkHandle {
    /// Stream of regular-file paths; closes when traversal ends.
    pub paths: Receiver<PathBuf>,
    /// Entry count of the root directory itself, taken before traversal.
    /// Sizes the digest pool without waiting for the full walk.
    pub estimated_files: usize,
    terminal: Receiver<Result<(), PipelineError>>,
    handle: JoinHandle<()>,
}

impl WalkHandle {
    /// Waits for the walker to finish and returns its terminal error.
    ///
    /// Blocks until the walk ends; callers should drain (or cancel) the
    /// path stream first.
    pub fn finish(self) -> Option<PipelineError> {
        let outcome = self.terminal.recv().unwrap_or(Ok(()));
        let _ = self.handle.join();
        outcome.err()
    }
}

/// Starts walking `root` on a background thread.
///
/// `queue_cap` bounds the path channel and therefore how far discovery can
/// run ahead of digestion.
pub fn walk_files(root: &Path, cancel: &CancelToken, queue_cap: usize) -> WalkHandle {
    // Matches the pool-sizing heuristic: one worker per root entry, capped.
    // An unreadable root yields 0 here and surfaces as a walk error below.
    let estimated_files = fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0);

    let (path_tx, path_rx) = bounded(queue_cap);
    let (term_tx, term_rx) = bounded(1);
    let root = root.to_path_buf();
    let cancel = cancel.clone();

    let handle = thread::Builder::new()
        .name("tagscan-walker".to_string())
        .spawn(move || {
            let outcome = emit_paths(&root, &cancel, &path_tx);
            // Close the path stream before the terminal error is readable.
            drop(path_tx);
            let _ = term_tx.send(outcome);
        })
        .expect("failed to spawn walker thread");

    WalkHandle {
        paths: path_rx,
        estimated_files,
        terminal: term_rx,
        handle,
    }
}

fn emit_paths(
    root: &Path,
    cancel: &CancelToken,
    path_tx: &Sender<PathBuf>,
) -> Result<(), PipelineError> {
    // Standard filters off: this pipeline scans every regular file, hidden
    // or not, with no gitignore semantics. Symlinks are not followed, so
    // they fail the regular-file check and are skipped.
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(PipelineError::Walk)?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        select! {
            send(path_tx, entry.into_path()) -> sent => {
                // All worker receivers gone: the run is unwinding.
                if sent.is_err() {
                    return Err(PipelineError::WalkCanceled);
                }
            }
            recv(cancel.done()) -> _ => return Err(PipelineError::WalkCanceled),
        }
    }
    Ok(())
}
