//! Tag digestion CLI
//!
//! Walks a directory tree of JSON documents, counts occurrences of the
//! supplied tags in parallel, and prints one `<tag> <count>` line per tag,
//! sorted descending by count (ties by tag ascending).
//!
//! Tags come from `--tags=a,b,c`, a whitespace-separated `--tags-file`, or
//! both. Diagnostics go to stderr via `tracing` (`RUST_LOG` controls the
//! level).
//!
//! # Exit Codes
//!
//! - `0`: Success (including an empty report)
//! - `1`: Pipeline failure (walk error, read error, cancellation)
//! - `2`: Invalid arguments

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tagscan::{digest_all, JsonSnapshotStore, PipelineConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_CACHE_FILE: &str = "tagscan-cache.json";

fn print_usage(exe: &std::ffi::OsStr) {
    eprintln!(
        "usage: {} [OPTIONS] <root>

OPTIONS:
    --tags=<a,b,...>        Comma-separated tag patterns
    --tags-file=<path>      Whitespace-separated tag patterns file
    --no-cache              Disable the content cache
    --cache-file=<path>     Cache snapshot location (default: {DEFAULT_CACHE_FILE})
    --max-workers=<N>       Digest worker ceiling (default: 20)
    --help, -h              Show this help message",
        exe.to_string_lossy()
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "tagscan".into());

    let mut root: Option<PathBuf> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut use_cache = true;
    let mut cache_file = PathBuf::from(DEFAULT_CACHE_FILE);
    let mut max_workers: Option<usize> = None;

    for arg in args {
        if let Some(flag) = arg.to_str() {
            if let Some(value) = flag.strip_prefix("--tags=") {
                tags.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from),
                );
                continue;
            }
            if let Some(value) = flag.strip_prefix("--tags-file=") {
                let data = fs::read_to_string(value).unwrap_or_else(|err| {
                    eprintln!("cannot read tags file '{value}': {err}");
                    process::exit(2);
                });
                tags.extend(data.split_whitespace().map(String::from));
                continue;
            }
            if let Some(value) = flag.strip_prefix("--cache-file=") {
                cache_file = PathBuf::from(value);
                continue;
            }
            if let Some(value) = flag.strip_prefix("--max-workers=") {
                let n: usize = value.parse().unwrap_or_else(|_| {
                    eprintln!("invalid --max-workers value: {value}");
                    process::exit(2);
                });
                if n == 0 {
                    eprintln!("--max-workers must be >= 1");
                    process::exit(2);
                }
                max_workers = Some(n);
                continue;
            }
            match flag {
                "--no-cache" => {
                    use_cache = false;
                    continue;
                }
                "--help" | "-h" => {
                    print_usage(&exe);
                    return;
                }
                other if other.starts_with("--") => {
                    eprintln!("unknown option: {other}");
                    print_usage(&exe);
                    process::exit(2);
                }
                _ => {}
            }
        }
        if root.is_some() {
            eprintln!("multiple root paths given");
            print_usage(&exe);
            process::exit(2);
        }
        root = Some(PathBuf::from(arg));
    }

    let Some(root) = root else {
        eprintln!("missing <root> path");
        print_usage(&exe);
        process::exit(2);
    };
    if tags.is_empty() {
        eprintln!("no tags given; use --tags= or --tags-file=");
        print_usage(&exe);
        process::exit(2);
    }

    let mut config = PipelineConfig {
        use_cache,
        ..PipelineConfig::default()
    };
    if let Some(n) = max_workers {
        config.max_workers = n;
    }
    let store = Arc::new(JsonSnapshotStore::new(cache_file));

    match digest_all(&root, &tags, &config, store) {
        Ok(report) => {
            println!("Final output:");
            for line in report {
                println!("{} {}", line.tag, line.count);
            }
        }
        Err(err) => {
            eprintln!("tagscan: {err}");
            process::exit(1);
        }
    }
}
