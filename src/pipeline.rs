//! Pipeline orchestration: walk → digest → aggregate.
//!
//! [`digest_all`] wires the walker thread, the digest pool, and the
//! single-consumer aggregator together, owns the run's [`CancelToken`], and
//! returns either the final sorted counts or the first fatal error.
//! Cancellation is signaled on every return path before the threads are
//! joined, so in-flight work always unwinds.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, TagCount};
use crate::cache::{CacheStore, ContentCache};
use crate::cancel::CancelToken;
use crate::digest::DigestPool;
use crate::errors::PipelineError;
use crate::matcher::TagMatcher;
use crate::walker::walk_files;

/// Upper bound on the digest pool size. Sizing by the root's entry count
/// avoids oversubscription on small trees; this caps resource use on huge
/// ones.
pub const DEFAULT_MAX_WORKERS: usize = 20;
/// Default path channel capacity (walker → workers backpressure).
pub const PATH_QUEUE_CAP: usize = 64;
/// Default result channel capacity (workers → aggregator).
pub const RESULT_QUEUE_CAP: usize = 64;

/// Tuning and policy knobs for one run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Serve and populate the content cache.
    pub use_cache: bool,
    /// Worker count ceiling; the actual count is the root-entry estimate
    /// clamped to `[1, max_workers]`.
    pub max_workers: usize,
    /// Bounded capacity of the path queue.
    pub path_queue_cap: usize,
    /// Bounded capacity of the result queue.
    pub result_queue_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            max_workers: DEFAULT_MAX_WORKERS,
            path_queue_cap: PATH_QUEUE_CAP,
            result_queue_cap: RESULT_QUEUE_CAP,
        }
    }
}

/// Digests every regular file under `root` and returns the aggregated
/// report, sorted descending by count with ties broken by tag ascending.
///
/// All-or-nothing: the first fatal error (walk failure, read failure, or
/// cancellation) fails the run with no partial report. Cache load/save go
/// through `store` and are best-effort; their failures are logged, never
/// fatal. When `config.use_cache` is false the store is never touched.
pub fn digest_all(
    root: impl AsRef<Path>,
    tags: &[String],
    config: &PipelineConfig,
    store: Arc<dyn CacheStore>,
) -> Result<Vec<TagCount>, PipelineError> {
    let root = root.as_ref();
    let started = Instant::now();
    let cancel = CancelToken::new();

    let cache = Arc::new(if config.use_cache {
        match store.load() {
            Ok(snapshot) => {
                debug!(entries = snapshot.len(), "cache snapshot loaded");
                ContentCache::from_snapshot(snapshot)
            }
            Err(err) => {
                warn!(%err, "cache snapshot unavailable; starting with an empty cache");
                ContentCache::new()
            }
        }
    } else {
        ContentCache::new()
    });

    let matcher = Arc::new(TagMatcher::new(tags));

    let walk = walk_files(root, &cancel, config.path_queue_cap);
    let workers = walk.estimated_files.clamp(1, config.max_workers.max(1));
    debug!(
        workers,
        estimated_files = walk.estimated_files,
        root = %root.display(),
        "starting digest pool"
    );
    let pool = DigestPool::spawn(
        walk.paths.clone(),
        matcher,
        Arc::clone(&cache),
        config.use_cache,
        &cancel,
        workers,
        config.result_queue_cap,
    );

    let outcome = aggregate(pool.results(), &cancel);

    // Guaranteed unwind: release anything still blocked on a channel, then
    // join so no thread outlives the run.
    cancel.cancel();
    pool.join();
    let walk_error = walk.finish();

    let report = outcome?;

    if config.use_cache {
        let snapshot = cache.snapshot();
        match store.save(&snapshot) {
            Ok(()) => debug!(entries = snapshot.len(), "cache snapshot saved"),
            Err(err) => warn!(%err, "failed to save cache snapshot"),
        }
    }

    // A partial tree scan must not be reported as a complete one, even
    // though aggregation already produced a result.
    if let Some(err) = walk_error {
        return Err(err);
    }

    info!(
        tags = report.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "digest complete"
    );
    Ok(report)
}
