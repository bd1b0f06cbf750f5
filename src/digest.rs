//! Fixed-size digest worker pool.
//!
//! Each worker loops: take a path, read the bytes, fingerprint them,
//! consult the shared cache, validate and count tags, emit a
//! [`FileRecord`]. A read failure is emitted as a fatal record and that
//! worker stops pulling paths; the other workers keep running until the
//! shared cancellation token unwinds them.
//!
//! Completion tracking is structural: every worker owns a clone of the
//! result sender, so the result channel closes exactly when the last
//! worker exits.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::debug;

use crate::cache::{CacheEntry, ContentCache};
use crate::cancel::CancelToken;
use crate::errors::PipelineError;
use crate::matcher::{TagCounts, TagMatcher};

/// Digestion result for one regular file.
///
/// Produced once per file by the worker that read it; immutable afterwards.
/// A record carrying an error is fatal to the whole run.
#[derive(Debug)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Hex blake3 digest of the file contents; empty on a read failure.
    pub fingerprint: String,
    /// Per-tag occurrence counts; empty for malformed documents.
    pub tag_counts: TagCounts,
    pub error: Option<PipelineError>,
}

/// Running pool of digest workers.
pub struct DigestPool {
    results: Receiver<FileRecord>,
    handles: Vec<JoinHandle<()>>,
}

impl DigestPool {
    /// Spawns `workers` named threads consuming `paths`.
    ///
    /// `result_cap` bounds the result channel; the aggregator is expected
    /// to drain it promptly.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        paths: Receiver<PathBuf>,
        matcher: Arc<TagMatcher>,
        cache: Arc<ContentCache>,
        use_cache: bool,
        cancel: &CancelToken,
        workers: usize,
        result_cap: usize,
    ) -> Self {
        let (result_tx, result_rx) = bounded(result_cap);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let paths = paths.clone();
            let result_tx = result_tx.clone();
            let matcher = Arc::clone(&matcher);
            let cache = Arc::clone(&cache);
            let cancel = cancel.clone();

            let th = thread::Builder::new()
                .name(format!("tagscan-digest-{worker_id}"))
                .spawn(move || {
                    digest_loop(&paths, &result_tx, &matcher, &cache, use_cache, &cancel)
                })
                .expect("failed to spawn digest worker thread");
            handles.push(th);
        }

        // Workers now hold the only senders; the channel closes when the
        // last of them exits.
        drop(result_tx);

        Self {
            results: result_rx,
            handles,
        }
    }

    /// Result stream; closes once every worker has exited.
    pub fn results(&self) -> &Receiver<FileRecord> {
        &self.results
    }

    /// Joins all worker threads. Call after the run has been canceled or
    /// the result stream has closed.
    pub fn join(self) {
        for th in self.handles {
            let _ = th.join();
        }
    }
}

fn digest_loop(
    paths: &Receiver<PathBuf>,
    results: &Sender<FileRecord>,
    matcher: &TagMatcher,
    cache: &ContentCache,
    use_cache: bool,
    cancel: &CancelToken,
) {
    loop {
        if cancel.is_canceled() {
            return;
        }
        let path = select! {
            recv(paths) -> path => match path {
                Ok(path) => path,
                Err(_) => return, // path stream closed and drained
            },
            recv(cancel.done()) -> _ => return,
        };

        let record = digest_one(path, matcher, cache, use_cache);
        let fatal = record.error.is_some();

        // Re-check before emitting: a canceled run's consumer has stopped
        // listening, so the record is silently dropped.
        if cancel.is_canceled() {
            return;
        }
        select! {
            send(results, record) -> sent => {
                if sent.is_err() {
                    return;
                }
            }
            recv(cancel.done()) -> _ => return,
        }

        // A fatal record was delivered; stop pulling paths immediately.
        if fatal {
            return;
        }
    }
}

fn digest_one(
    path: PathBuf,
    matcher: &TagMatcher,
    cache: &ContentCache,
    use_cache: bool,
) -> FileRecord {
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(source) => {
            return FileRecord {
                fingerprint: String::new(),
                tag_counts: TagCounts::new(),
                error: Some(PipelineError::Read {
                    path: path.clone(),
                    source,
                }),
                path,
            };
        }
    };

    let fingerprint = blake3::hash(&data).to_hex().to_string();

    if use_cache {
        if let Some(hit) = cache.get(&fingerprint) {
            debug!(
                path = %path.display(),
                first_seen = %hit.path.display(),
                "identical content served from cache"
            );
            return FileRecord {
                path,
                fingerprint,
                tag_counts: hit.tag_counts,
                error: None,
            };
        }
    }

    let tag_counts = if TagMatcher::is_well_formed(&data) {
        let counts = matcher.count_all(&data);
        if use_cache {
            cache.put(CacheEntry {
                path: path.clone(),
                fingerprint: fingerprint.clone(),
                tag_counts: counts.clone(),
            });
        }
        counts
    } else {
        debug!(path = %path.display(), "skipping file with malformed JSON");
        TagCounts::new()
    };

    FileRecord {
        path,
        fingerprint,
        tag_counts,
        error: None,
    }
}
