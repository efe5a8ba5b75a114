//! Scan the source tree and reconcile it against the registry.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use docsmith_shared::{BuildConfig, ContentHash, DocsmithError, Result};
use docsmith_storage::{Registry, UpsertOutcome};

use crate::lister::FileLister;

/// Summary of one scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Eligible documents read successfully.
    pub discovered: usize,
    /// New entries created.
    pub added: usize,
    /// Entries whose path changed.
    pub moved: usize,
    /// Entries found where they were.
    pub unchanged: usize,
    /// Documents that could not be read.
    pub failed: usize,
    /// Hashes removed from the registry.
    pub evicted: Vec<ContentHash>,
    pub elapsed: std::time::Duration,
}

/// One eligible document after reading.
#[derive(Debug)]
struct Discovered {
    hash: ContentHash,
    path: String,
    links: Vec<String>,
}

/// Scan the source root and reconcile the registry.
///
/// 1. List candidates through `lister`, keep the configured extension, drop the output dir
/// 2. Read, hash and link-scan each candidate
/// 3. Add unseen hashes, move known hashes, refresh links
/// 4. Evict every entry whose hash was not observed
///
/// Only an unusable source root is an error; unreadable files are counted and skipped.
#[instrument(skip_all, fields(root = %config.source_root.display()))]
pub async fn scan(
    config: &BuildConfig,
    lister: &dyn FileLister,
    registry: &mut Registry,
) -> Result<ScanReport> {
    let start = Instant::now();
    let root = &config.source_root;

    if !root.is_dir() {
        return Err(DocsmithError::scan(root, "source root is not a readable directory"));
    }
    std::fs::read_dir(root).map_err(|e| DocsmithError::scan(root, e.to_string()))?;

    let listed = lister.list_tracked_and_untracked(root).await?;
    let candidates = filter_candidates(listed, config);
    debug!(candidates = candidates.len(), "candidate documents listed");

    let mut report = ScanReport::default();

    // Ordered buffering keeps reconciliation deterministic.
    let reads: Vec<(String, Result<Vec<u8>>)> = futures::stream::iter(candidates)
        .map(|path| {
            let full = root.join(&path);
            async move {
                let bytes = tokio::fs::read(&full)
                    .await
                    .map_err(|e| DocsmithError::record_io(&full, e));
                (path, bytes)
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let mut discovered: Vec<Discovered> = Vec::with_capacity(reads.len());
    let mut by_hash: HashMap<ContentHash, usize> = HashMap::new();
    let mut unreadable: Vec<String> = Vec::new();

    for (path, bytes) in reads {
        let bytes = match bytes {
            Ok(b) => b,
            Err(e) => {
                warn!(%path, stage = "scan", error = %e, "cannot read document, skipping");
                report.failed += 1;
                unreadable.push(path);
                continue;
            }
        };

        let hash = ContentHash::of(&bytes);
        let links = docsmith_markdown::extract_links(&String::from_utf8_lossy(&bytes));
        report.discovered += 1;

        // Identical content at several paths collapses to one entry; the last path wins.
        match by_hash.get(&hash) {
            Some(&i) => {
                debug!(hash = %hash.short(), first = %discovered[i].path, last = %path, "duplicate content");
                discovered[i].path = path;
                discovered[i].links = links;
            }
            None => {
                by_hash.insert(hash.clone(), discovered.len());
                discovered.push(Discovered { hash, path, links });
            }
        }
    }

    let mut live: HashSet<ContentHash> = HashSet::with_capacity(discovered.len());
    for doc in discovered {
        match registry.upsert_scanned(&doc.hash, &doc.path, doc.links) {
            UpsertOutcome::Added => {
                debug!(hash = %doc.hash.short(), path = %doc.path, "new document");
                report.added += 1;
            }
            UpsertOutcome::Moved => {
                debug!(hash = %doc.hash.short(), path = %doc.path, "document moved");
                report.moved += 1;
            }
            UpsertOutcome::Unchanged => report.unchanged += 1,
        }
        live.insert(doc.hash);
    }

    // A document we failed to read is not a deleted document: keep its entry.
    for path in &unreadable {
        if let Some(entry) = registry.find_by_path(path) {
            live.insert(entry.hash.clone());
        }
    }

    report.evicted = registry
        .retain_hashes(&live)
        .into_iter()
        .map(|e| {
            debug!(hash = %e.hash.short(), path = %e.path, "evicted orphan entry");
            e.hash
        })
        .collect();

    report.elapsed = start.elapsed();
    info!(
        discovered = report.discovered,
        added = report.added,
        moved = report.moved,
        unchanged = report.unchanged,
        failed = report.failed,
        evicted = report.evicted.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "scan complete"
    );

    Ok(report)
}

/// Keep paths with the configured extension that are not under the output dir.
fn filter_candidates(listed: Vec<String>, config: &BuildConfig) -> Vec<String> {
    let suffix = format!(".{}", config.extension);
    let excluded = output_prefix(&config.source_root, &config.output_dir);

    let mut paths: Vec<String> = listed
        .into_iter()
        .map(|p| p.trim_start_matches("./").to_string())
        .filter(|p| p.ends_with(&suffix))
        .filter(|p| match &excluded {
            Some(prefix) => !(p == prefix || p.starts_with(&format!("{prefix}/"))),
            None => true,
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// The output directory as a `/`-separated path relative to the source root,
/// if it lies inside it.
fn output_prefix(root: &Path, output: &Path) -> Option<String> {
    let root = std::path::absolute(root).ok()?;
    let output: PathBuf = std::path::absolute(output).ok()?;
    let rel = output.strip_prefix(&root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
