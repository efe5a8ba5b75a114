//! End-to-end `build` pipeline: scan → enrich → categorize → materialize → translate.
//!
//! Stages run strictly in order. The registry is persisted after every stage
//! that changed it, so an interrupted run keeps the work already done.

use std::time::Instant;

use tracing::{info, instrument};

use docsmith_discovery::{FileLister, ScanReport, scan};
use docsmith_shared::{BuildConfig, Result};
use docsmith_storage::Registry;

use crate::categorize::run_categorization;
use crate::collaborators::{Classifier, Extractor, TranslationBackend};
use crate::enrichment::run_enrichment;
use crate::materialize::run_materialization;
use crate::output::{PruneReport, prune_content};
use crate::translate::run_translation;

/// Per-stage outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    /// Records the stage produced or updated.
    pub processed: usize,
    /// Records that were already up to date.
    pub skipped: usize,
    /// Records that failed and were left for the next run.
    pub failed: usize,
    /// Tokens reported by the collaborator, where it reports any.
    pub tokens_used: u64,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }
}

/// Result of one `build` run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub scan: ScanReport,
    pub stages: Vec<StageReport>,
    /// Content files removed for evicted entries.
    pub pruned: usize,
    /// Content files of evicted entries that could not be removed.
    pub prune_failed: usize,
    /// Live entries after the run.
    pub entries: usize,
    pub elapsed: std::time::Duration,
}

impl BuildReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failed(&self) -> usize {
        self.scan.failed + self.prune_failed + self.stages.iter().map(|s| s.failed).sum::<usize>()
    }

    pub fn tokens_used(&self) -> u64 {
        self.stages.iter().map(|s| s.tokens_used).sum()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each record of a stage finishes, successfully or not.
    fn record_done(&self, stage: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_done(&self, _stage: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &BuildReport) {}
}

/// The external services a build talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub lister: &'a dyn FileLister,
    pub extractor: &'a dyn Extractor,
    pub classifier: &'a dyn Classifier,
    pub translator: &'a dyn TranslationBackend,
}

/// Run the full pipeline against the registry stored under `config.output_dir`.
///
/// Only an unusable source root or an unwritable store aborts the run;
/// per-record failures are counted in the stage reports.
#[instrument(skip_all, fields(source = %config.source_root.display(), out = %config.output_dir.display()))]
pub async fn build(
    config: &BuildConfig,
    services: Collaborators<'_>,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let start = Instant::now();
    let mut registry = Registry::load(config.store_path());

    // ---- Phase 1: Scan ----
    progress.phase("Scanning sources");
    let scan_report = scan(config, services.lister, &mut registry).await?;
    registry.flush()?;

    let prune = if config.prune {
        prune_content(config, &scan_report.evicted).await
    } else {
        PruneReport::default()
    };

    let mut stages = Vec::with_capacity(4);

    // ---- Phase 2: Enrich ----
    progress.phase("Enriching documents");
    stages.push(run_enrichment(config, &mut registry, services.extractor, progress).await);
    registry.flush()?;

    // ---- Phase 3: Categorize ----
    progress.phase("Categorizing");
    stages.push(run_categorization(&mut registry, services.classifier).await);
    registry.flush()?;

    // ---- Phase 4: Materialize ----
    progress.phase("Materializing");
    stages.push(run_materialization(config, &mut registry, progress).await);
    registry.flush()?;

    // ---- Phase 5: Translate ----
    progress.phase("Translating");
    stages.push(run_translation(config, &mut registry, services.translator, progress).await);
    registry.flush()?;

    let report = BuildReport {
        scan: scan_report,
        stages,
        pruned: prune.removed,
        prune_failed: prune.failed,
        entries: registry.len(),
        elapsed: start.elapsed(),
    };

    info!(
        entries = report.entries,
        failed = report.failed(),
        tokens = report.tokens_used(),
        pruned = report.pruned,
        elapsed_ms = report.elapsed.as_millis(),
        "build complete"
    );
    progress.done(&report);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClassifier, FakeExtractor, FakeTranslator, test_config, write_source};
    use docsmith_discovery::StaticLister;
    use docsmith_shared::{ContentHash, DocsmithError};

    struct Harness {
        _tmp: tempfile::TempDir,
        config: BuildConfig,
        extractor: FakeExtractor,
        classifier: FakeClassifier,
        translator: FakeTranslator,
    }

    impl Harness {
        fn new(languages: &[&str]) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let config = test_config(tmp.path(), languages);
            std::fs::create_dir_all(&config.source_root).unwrap();
            Self {
                _tmp: tmp,
                config,
                extractor: FakeExtractor::default(),
                classifier: FakeClassifier::labelling("Guides"),
                translator: FakeTranslator::default(),
            }
        }

        async fn build(&self, files: &[&str]) -> Result<BuildReport> {
            let lister = StaticLister::new(files.iter().copied());
            let services = Collaborators {
                lister: &lister,
                extractor: &self.extractor,
                classifier: &self.classifier,
                translator: &self.translator,
            };
            build(&self.config, services, &SilentProgress).await
        }

        fn calls(&self) -> (usize, usize, usize) {
            (
                self.extractor.calls(),
                self.classifier.calls(),
                self.translator.calls(),
            )
        }
    }

    const A: &str = "# Alpha\nShared text.\n";
    const B: &str = "# Beta\nSee [alpha](./a.md).\n";

    #[tokio::test]
    async fn end_to_end_then_incremental_noop() {
        let h = Harness::new(&["fr"]);
        write_source(&h.config, "a.md", A);
        write_source(&h.config, "b.md", B);
        write_source(&h.config, "c.md", A);
        let files = ["a.md", "b.md", "c.md"];

        let first = h.build(&files).await.unwrap();

        // a.md and c.md collapse into one entry.
        assert_eq!(first.entries, 2);
        assert_eq!(h.calls(), (2, 1, 2));
        assert_eq!(first.failed(), 0);

        let shared = ContentHash::of(A);
        let b = ContentHash::of(B);
        let native_b = std::fs::read_to_string(h.config.content_path("en", b.as_str()).unwrap()).unwrap();
        assert!(native_b.contains(&format!("[alpha](doc://{shared})")));
        assert!(h.config.content_path("fr", shared.as_str()).unwrap().exists());
        assert!(h.config.content_path("fr", b.as_str()).unwrap().exists());

        let store_before = std::fs::read(h.config.store_path()).unwrap();
        let second = h.build(&files).await.unwrap();

        assert_eq!(h.calls(), (2, 1, 2));
        assert_eq!(second.stage("enrich").unwrap().skipped, 2);
        assert_eq!(second.stage("translate").unwrap().skipped, 2);
        assert_eq!(std::fs::read(h.config.store_path()).unwrap(), store_before);
    }

    #[tokio::test]
    async fn edited_document_is_reprocessed_alone() {
        let h = Harness::new(&["fr"]);
        write_source(&h.config, "a.md", A);
        write_source(&h.config, "b.md", B);
        h.build(&["a.md", "b.md"]).await.unwrap();

        write_source(&h.config, "b.md", "# Beta\nRewritten.\n");
        let report = h.build(&["a.md", "b.md"]).await.unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.scan.evicted, vec![ContentHash::of(B)]);
        // One new extraction, one classification, one translation.
        assert_eq!(h.calls(), (3, 2, 3));
    }

    #[tokio::test]
    async fn moved_document_keeps_its_enrichment() {
        let h = Harness::new(&[]);
        write_source(&h.config, "a.md", A);
        h.build(&["a.md"]).await.unwrap();

        std::fs::create_dir_all(h.config.source_root.join("guide")).unwrap();
        std::fs::rename(h.config.source_root.join("a.md"), h.config.source_root.join("guide/a.md")).unwrap();
        let report = h.build(&["guide/a.md"]).await.unwrap();

        assert_eq!(report.scan.moved, 1);
        assert_eq!(h.extractor.calls(), 1);
    }

    #[tokio::test]
    async fn prune_removes_content_of_deleted_documents() {
        let mut h = Harness::new(&["fr"]);
        h.config.prune = true;
        write_source(&h.config, "a.md", A);
        write_source(&h.config, "b.md", B);
        h.build(&["a.md", "b.md"]).await.unwrap();

        std::fs::remove_file(h.config.source_root.join("b.md")).unwrap();
        let report = h.build(&["a.md"]).await.unwrap();

        let b = ContentHash::of(B);
        assert_eq!(report.pruned, 2);
        assert!(!h.config.content_path("en", b.as_str()).unwrap().exists());
        assert!(!h.config.content_path("fr", b.as_str()).unwrap().exists());
    }

    #[tokio::test]
    async fn unremovable_content_file_does_not_stop_the_build() {
        let mut h = Harness::new(&["fr"]);
        h.config.prune = true;
        write_source(&h.config, "a.md", A);
        write_source(&h.config, "b.md", B);
        h.build(&["a.md", "b.md"]).await.unwrap();

        let b = ContentHash::of(B);
        let fr_b = h.config.content_path("fr", b.as_str()).unwrap();
        std::fs::remove_file(&fr_b).unwrap();
        std::fs::create_dir_all(&fr_b).unwrap();
        std::fs::remove_file(h.config.source_root.join("b.md")).unwrap();
        write_source(&h.config, "d.md", "# Delta\n");

        let report = h.build(&["a.md", "d.md"]).await.unwrap();

        assert_eq!(report.pruned, 1);
        assert_eq!(report.prune_failed, 1);
        assert_eq!(report.failed(), 1);
        assert!(!h.config.content_path("en", b.as_str()).unwrap().exists());
        // Later stages still ran for the new document.
        assert_eq!(h.extractor.calls(), 3);
        let d = ContentHash::of("# Delta\n");
        assert!(h.config.content_path("fr", d.as_str()).unwrap().exists());
    }

    #[tokio::test]
    async fn enrichment_failure_is_retried_next_run() {
        let h = Harness::new(&[]);
        write_source(&h.config, "bad.md", "# Bad FAIL\n");
        write_source(&h.config, "ok.md", A);

        let first = h.build(&["bad.md", "ok.md"]).await.unwrap();
        assert_eq!(first.stage("enrich").unwrap().failed, 1);
        assert_eq!(first.stage("materialize").unwrap().processed, 1);

        h.build(&["bad.md", "ok.md"]).await.unwrap();
        assert_eq!(h.extractor.calls(), 3);
    }

    #[tokio::test]
    async fn missing_source_root_aborts_before_writing() {
        let h = Harness::new(&[]);
        std::fs::remove_dir_all(&h.config.source_root).unwrap();

        let err = h.build(&["a.md"]).await.unwrap_err();

        assert!(matches!(err, DocsmithError::Scan { .. }));
        assert!(!h.config.store_path().exists());
        assert_eq!(h.calls(), (0, 0, 0));
    }
}
