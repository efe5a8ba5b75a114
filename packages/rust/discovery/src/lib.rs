//! Source tree discovery and registry reconciliation.
//!
//! The scanner enumerates eligible documents through a [`FileLister`]
//! (normally `git ls-files`), hashes each one, and reconciles the result
//! against the [`Registry`](docsmith_storage::Registry): unseen hashes are
//! added, known hashes at a new path are moved, and hashes no longer found
//! are evicted.

mod lister;
mod scanner;

pub use lister::{FileLister, GitLister, StaticLister};
pub use scanner::{ScanReport, scan};
