//! Content file I/O shared by the materializer and the translator.

use std::path::Path;

use tracing::{debug, instrument, warn};

use docsmith_shared::{BuildConfig, ContentHash, DocsmithError, Result};

/// Write `content` to `path` via a sibling temp file and a rename.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DocsmithError::record_io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| DocsmithError::record_io(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| DocsmithError::record_io(path, e))?;

    debug!(path = %path.display(), bytes = content.len(), "wrote content file");
    Ok(())
}

/// Outcome of a prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Content files removed.
    pub removed: usize,
    /// Content files that exist but could not be removed.
    pub failed: usize,
}

/// Remove every content file belonging to `hashes`, in every language directory.
///
/// Missing files are not an error. A file that cannot be removed is logged
/// and counted, and the pass moves on.
#[instrument(skip_all, fields(evicted = hashes.len()))]
pub async fn prune_content(config: &BuildConfig, hashes: &[ContentHash]) -> PruneReport {
    let mut report = PruneReport::default();
    if hashes.is_empty() {
        return report;
    }

    let content_root = config.output_dir.join("content");
    let mut dirs = match tokio::fs::read_dir(&content_root).await {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(e) => {
            warn!(path = %content_root.display(), error = %e, "cannot list content directory, nothing pruned");
            report.failed += hashes.len();
            return report;
        }
    };

    loop {
        let dir = match dirs.next_entry().await {
            Ok(Some(dir)) => dir,
            Ok(None) => break,
            Err(e) => {
                warn!(path = %content_root.display(), error = %e, "stopped listing content directory");
                report.failed += 1;
                break;
            }
        };
        if !dir.path().is_dir() {
            continue;
        }
        for hash in hashes {
            let file = dir.path().join(format!("{hash}.{}", config.extension));
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {
                    debug!(path = %file.display(), "pruned content file");
                    report.removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(hash = %hash.short(), path = %file.display(), error = %e, "failed to prune content file");
                    report.failed += 1;
                }
            }
        }
    }

    report
}
