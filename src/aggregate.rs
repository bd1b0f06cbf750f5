//! Single-consumer aggregation of per-file digest results.
//!
//! Drains the result stream until it closes, sums per-tag counts, and
//! produces the final report sorted descending by count with ties broken
//! by tag ascending, so identical totals always print identically
//! regardless of worker scheduling.
//!
//! The first record carrying a fatal error stops aggregation, triggers
//! cancellation, and fails the run as a whole; sums accumulated so far are
//! discarded (all-or-nothing).

use std::collections::HashMap;

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::digest::FileRecord;
use crate::errors::PipelineError;

/// One line of the final report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Drains `results` and produces the sorted report.
pub fn aggregate(
    results: &Receiver<FileRecord>,
    cancel: &CancelToken,
) -> Result<Vec<TagCount>, PipelineError> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    let mut files: u64 = 0;
    let mut without_tags: u64 = 0;

    for record in results.iter() {
        if let Some(error) = record.error {
            cancel.cancel();
            return Err(error);
        }
        files += 1;
        if record.tag_counts.is_empty() {
            debug!(path = %record.path.display(), "no tags found");
            without_tags += 1;
            continue;
        }
        for (tag, count) in record.tag_counts {
            *totals.entry(tag).or_insert(0) += count;
        }
    }

    debug!(files, without_tags, "aggregation complete");
    Ok(sort_by_tag_count(totals))
}

/// Orders totals descending by count; equal counts order by tag ascending.
pub fn sort_by_tag_count(totals: HashMap<String, u64>) -> Vec<TagCount> {
    let mut report: Vec<TagCount> = totals
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    report.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TagCounts;
    use crossbeam_channel::bounded;
    use proptest::prelude::*;
    use std::io;
    use std::path::PathBuf;

    fn record(path: &str, counts: &[(&str, u64)]) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            fingerprint: "0".repeat(64),
            tag_counts: counts
                .iter()
                .map(|(t, c)| (t.to_string(), *c))
                .collect::<TagCounts>(),
            error: None,
        }
    }

    #[test]
    fn sums_across_records_and_sorts() {
        let (tx, rx) = bounded(8);
        tx.send(record("a.json", &[("foo", 1)])).expect("send");
        tx.send(record("b.json", &[("foo", 2), ("bar", 1)]))
            .expect("send");
        drop(tx);

        let cancel = CancelToken::new();
        let report = aggregate(&rx, &cancel).expect("aggregate");
        assert_eq!(
            report,
            vec![
                TagCount {
                    tag: "foo".to_string(),
                    count: 3
                },
                TagCount {
                    tag: "bar".to_string(),
                    count: 1
                },
            ]
        );
        assert!(!cancel.is_canceled());
    }

    #[test]
    fn empty_stream_yields_empty_report() {
        let (tx, rx) = bounded::<FileRecord>(1);
        drop(tx);
        let cancel = CancelToken::new();
        assert!(aggregate(&rx, &cancel).expect("aggregate").is_empty());
    }

    #[test]
    fn records_without_tags_contribute_nothing() {
        let (tx, rx) = bounded(4);
        tx.send(record("a.json", &[("foo", 1)])).expect("send");
        tx.send(record("c.txt", &[])).expect("send");
        drop(tx);

        let cancel = CancelToken::new();
        let report = aggregate(&rx, &cancel).expect("aggregate");
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].count, 1);
    }

    #[test]
    fn fatal_record_cancels_and_discards_partial_sums() {
        let (tx, rx) = bounded(4);
        tx.send(record("a.json", &[("foo", 7)])).expect("send");
        tx.send(FileRecord {
            path: PathBuf::from("b.json"),
            fingerprint: String::new(),
            tag_counts: TagCounts::new(),
            error: Some(PipelineError::Read {
                path: PathBuf::from("b.json"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }),
        })
        .expect("send");
        drop(tx);

        let cancel = CancelToken::new();
        match aggregate(&rx, &cancel) {
            Err(PipelineError::Read { path, .. }) => {
                assert_eq!(path, PathBuf::from("b.json"));
            }
            other => panic!("expected read error, got {other:?}"),
        }
        assert!(cancel.is_canceled());
    }

    #[test]
    fn ties_break_by_tag_ascending() {
        let totals = HashMap::from([
            ("zebra".to_string(), 2),
            ("apple".to_string(), 2),
            ("mango".to_string(), 5),
        ]);
        let report = sort_by_tag_count(totals);
        let order: Vec<&str> = report.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(order, vec!["mango", "apple", "zebra"]);
    }

    proptest! {
        // The report order is a pure function of the totals, independent of
        // map iteration order: descending count, ties by tag ascending.
        #[test]
        fn report_order_is_deterministic_and_sorted(
            totals in proptest::collection::hash_map("[a-z]{1,6}", 0u64..100, 0..24)
        ) {
            let a = sort_by_tag_count(totals.clone());
            let b = sort_by_tag_count(totals);
            prop_assert_eq!(&a, &b);
            for pair in a.windows(2) {
                prop_assert!(
                    pair[0].count > pair[1].count
                        || (pair[0].count == pair[1].count && pair[0].tag < pair[1].tag)
                );
            }
        }
    }
}
