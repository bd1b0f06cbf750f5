//! Tag occurrence counting and document validation.
//!
//! Tags are compiled once per run into byte-level regexes and matched
//! against raw file contents. Well-formedness is a separate gate: the
//! pipeline only counts tags in documents that parse as JSON, though
//! counting itself is defined for any byte slice.
//!
//! # Matching policy
//!
//! Each tag is compiled as a bare regex pattern over the raw bytes, not
//! wrapped in quote delimiters. `foo` therefore counts every occurrence of
//! the token, inside or outside JSON string literals. A tag that fails to
//! compile is warned about once and contributes zero occurrences for every
//! file; it never aborts a file or the run.

use std::collections::HashMap;

use regex::bytes::Regex;
use tracing::warn;

/// Per-tag occurrence totals for one document. Absent tag means zero.
pub type TagCounts = HashMap<String, u64>;

struct TagPattern {
    tag: String,
    /// None when the tag failed to compile; counts zero everywhere.
    re: Option<Regex>,
}

/// Compiled set of tag patterns, built once and shared across workers.
pub struct TagMatcher {
    patterns: Vec<TagPattern>,
}

impl TagMatcher {
    /// Compiles every tag. Invalid patterns are kept (so lookups by tag
    /// still resolve) but disabled.
    pub fn new(tags: &[String]) -> Self {
        let patterns = tags
            .iter()
            .map(|tag| {
                let re = match Regex::new(tag) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        warn!(tag = %tag, %err, "invalid tag pattern; tag will count zero");
                        None
                    }
                };
                TagPattern {
                    tag: tag.clone(),
                    re,
                }
            })
            .collect();
        Self { patterns }
    }

    /// Number of configured tags, including ones that failed to compile.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when the bytes parse as a complete JSON document.
    pub fn is_well_formed(data: &[u8]) -> bool {
        serde_json::from_slice::<serde::de::IgnoredAny>(data).is_ok()
    }

    /// Occurrences of a single tag in `data`.
    ///
    /// Defined for any bytes, well-formed or not; unknown and invalid tags
    /// count zero.
    pub fn count_occurrences(&self, data: &[u8], tag: &str) -> u64 {
        self.patterns
            .iter()
            .find(|p| p.tag == tag)
            .and_then(|p| p.re.as_ref())
            .map_or(0, |re| re.find_iter(data).count() as u64)
    }

    /// Occurrences of every configured tag in `data`.
    ///
    /// Tags with zero occurrences are omitted from the map.
    pub fn count_all(&self, data: &[u8]) -> TagCounts {
        let mut counts = TagCounts::new();
        for pattern in &self.patterns {
            let Some(re) = pattern.re.as_ref() else {
                continue;
            };
            let n = re.find_iter(data).count() as u64;
            if n > 0 {
                counts.insert(pattern.tag.clone(), n);
            }
        }
        counts
    }
}
