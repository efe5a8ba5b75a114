//! Enrichment stage: extract structured metadata for entries that lack it.
//!
//! Metadata is keyed by content hash, so an entry that already carries
//! metadata is a cache hit and costs no collaborator call.

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use docsmith_shared::{
    BuildConfig, ContentHash, DocMetadata, DocsmithError, EnrichmentUsage, Result, is_valid_lang,
    normalize_lang,
};
use docsmith_storage::Registry;

use crate::collaborators::{Extraction, Extractor};
use crate::pipeline::{ProgressReporter, StageReport};

pub const STAGE: &str = "enrich";

/// Enrich every live entry without metadata.
///
/// Calls run with bounded fan-out; results are applied to the registry one
/// at a time once the fan-out completes. A failed record stays un-enriched
/// and is retried on the next run.
#[instrument(skip_all, fields(stage = STAGE))]
pub async fn run_enrichment(
    config: &BuildConfig,
    registry: &mut Registry,
    extractor: &dyn Extractor,
    progress: &dyn ProgressReporter,
) -> StageReport {
    let mut report = StageReport::new(STAGE);

    let pending: Vec<(ContentHash, String)> = registry
        .entries()
        .iter()
        .filter(|e| e.metadata.is_none())
        .map(|e| (e.hash.clone(), e.path.clone()))
        .collect();
    report.skipped = registry.len() - pending.len();

    if pending.is_empty() {
        debug!(cached = report.skipped, "all entries already enriched");
        return report;
    }

    let total = pending.len();
    let root = &config.source_root;
    let mut results = futures::stream::iter(pending)
        .map(|(hash, path)| async move {
            let full = root.join(&path);
            let outcome = match tokio::fs::read_to_string(&full).await {
                Ok(content) => extractor.extract(&content).await.and_then(into_metadata),
                Err(e) => Err(DocsmithError::record_io(&full, e)),
            };
            (hash, path, outcome)
        })
        .buffer_unordered(config.concurrency.max(1));

    let mut done = 0;
    let mut enriched: Vec<(ContentHash, DocMetadata)> = Vec::with_capacity(total);
    while let Some((hash, path, outcome)) = results.next().await {
        done += 1;
        progress.record_done(STAGE, done, total);
        match outcome {
            Ok(meta) => {
                debug!(hash = %hash.short(), %path, title = %meta.title, "enriched");
                enriched.push((hash, meta));
            }
            Err(e) => {
                warn!(hash = %hash.short(), %path, stage = STAGE, error = %e, "enrichment failed");
                report.failed += 1;
            }
        }
    }

    for (hash, meta) in enriched {
        report.tokens_used += meta.usage.total_tokens();
        if registry.set_metadata(&hash, meta) {
            report.processed += 1;
        }
    }

    info!(
        enriched = report.processed,
        cached = report.skipped,
        failed = report.failed,
        tokens = report.tokens_used,
        "enrichment complete"
    );
    report
}

/// Validate an extraction and stamp it into persisted metadata.
fn into_metadata(x: Extraction) -> Result<DocMetadata> {
    let title = x.title.trim().to_string();
    if title.is_empty() {
        return Err(DocsmithError::Extraction("extraction has an empty title".into()));
    }
    let language = normalize_lang(&x.language);
    if language.is_empty() {
        return Err(DocsmithError::Extraction("extraction has no language".into()));
    }
    if !is_valid_lang(&language) {
        return Err(DocsmithError::Extraction(format!(
            "extraction has an invalid language code {language:?}"
        )));
    }

    Ok(DocMetadata {
        title,
        short_summary: x.short_summary,
        description: x.description,
        summary: x.summary,
        slug: x.slug,
        tags: x.tags,
        inferred_date: x.inferred_date,
        language,
        key_points: x.key_points,
        audience: x.audience,
        usage: EnrichmentUsage {
            model: x.model,
            tokens_in: x.tokens_in,
            tokens_out: x.tokens_out,
            enriched_at: Utc::now(),
        },
    })
}
