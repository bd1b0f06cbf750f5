//! Concurrent tag-count digestion over directory trees of JSON documents.
//!
//! ## Scope
//! This crate walks a directory tree, validates each regular file as
//! well-formed JSON, counts occurrences of a supplied set of tag patterns
//! in the raw bytes, and aggregates per-tag totals into one sorted report.
//! A content-fingerprint cache lets repeated runs skip re-scanning
//! unchanged bytes.
//!
//! ## Pipeline flow
//! `Path -> Walker -> DigestPool -> FileRecord -> Aggregator -> Report`
//!
//! A single walker thread streams regular-file paths into a bounded channel
//! (backpressure); a fixed pool of digest workers reads, fingerprints, and
//! tag-counts each file; a single consumer sums the per-file results. One
//! [`CancelToken`] per run unwinds all in-flight work on the first fatal
//! error.
//!
//! ## Key invariants
//! - Each regular file yields exactly one [`FileRecord`] or contributes to
//!   exactly one fatal error, never both (canceled work contributes
//!   nothing).
//! - All-or-nothing: a fatal error yields no partial report.
//! - Cache entries exist only for documents that validated as well-formed
//!   JSON; byte-identical files share one entry.
//! - The report order is deterministic: descending by count, ties broken by
//!   tag ascending.
//!
//! ## Notable entry points
//! - [`digest_all`] / [`PipelineConfig`]: the whole pipeline over a root.
//! - [`TagMatcher`]: validation and occurrence counting.
//! - [`ContentCache`] / [`CacheStore`] / [`JsonSnapshotStore`]: the cache
//!   and its persistence seam.

pub mod aggregate;
pub mod cache;
pub mod cancel;
pub mod digest;
pub mod errors;
pub mod matcher;
pub mod pipeline;
pub mod walker;

pub use aggregate::{aggregate, sort_by_tag_count, TagCount};
pub use cache::{CacheEntry, CacheStore, ContentCache, JsonSnapshotStore, Snapshot};
pub use cancel::CancelToken;
pub use digest::{DigestPool, FileRecord};
pub use errors::PipelineError;
pub use matcher::{TagCounts, TagMatcher};
pub use pipeline::{digest_all, PipelineConfig, DEFAULT_MAX_WORKERS};
pub use walker::{walk_files, WalkHandle};
