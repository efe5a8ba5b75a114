//! Candidate file enumeration.
//!
//! Documents are found through the version-control index rather than a
//! directory walk, so ignored files never enter the registry.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use docsmith_shared::Result;
use tokio::process::Command;
use tracing::{debug, warn};

/// Lists the files of a source tree, relative to its root with `/` separators.
#[async_trait]
pub trait FileLister: Send + Sync {
    /// Tracked plus untracked-but-not-ignored files.
    ///
    /// Returns an empty list, not an error, when no version-control metadata exists.
    async fn list_tracked_and_untracked(&self, root: &Path) -> Result<Vec<String>>;
}

/// Lists files with `git ls-files`.
#[derive(Debug, Clone, Default)]
pub struct GitLister;

#[async_trait]
impl FileLister for GitLister {
    async fn list_tracked_and_untracked(&self, root: &Path) -> Result<Vec<String>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(["ls-files", "--cached", "--others", "--exclude-standard", "-z"])
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "git not available, no files listed");
                return Ok(Vec::new());
            }
        };

        if !output.status.success() {
            debug!(
                root = %root.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "not a git work tree, no files listed"
            );
            return Ok(Vec::new());
        }

        Ok(parse_nul_separated(&output.stdout))
    }
}

/// A fixed file list, for trees without version control and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLister {
    paths: Vec<String>,
}

impl StaticLister {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FileLister for StaticLister {
    async fn list_tracked_and_untracked(&self, _root: &Path) -> Result<Vec<String>> {
        Ok(self.paths.clone())
    }
}

fn parse_nul_separated(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
