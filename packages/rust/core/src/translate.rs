//! Translation stage: produce each materialized document in every target language.
//!
//! Cache key per `(entry, language)` is the hash of the native materialized
//! file the translation was made from, kept in the entry's translation ledger.

use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use docsmith_markdown::split_frontmatter;
use docsmith_shared::{BuildConfig, ContentHash, DocsmithError, Result};
use docsmith_storage::Registry;

use crate::collaborators::TranslationBackend;
use crate::output::write_atomic;
use crate::pipeline::{ProgressReporter, StageReport};

pub const STAGE: &str = "translate";

#[derive(Debug)]
struct Job {
    hash: ContentHash,
    path: String,
    native_lang: String,
    target: String,
    recorded: Option<ContentHash>,
}

enum Translated {
    Written(ContentHash),
    Cached,
}

/// Translate every materialized entry into every configured language.
///
/// A target equal to the document's own language is skipped. An existing
/// translation made from the current native bytes is a cache hit.
#[instrument(skip_all, fields(stage = STAGE, languages = config.languages.len()))]
pub async fn run_translation(
    config: &BuildConfig,
    registry: &mut Registry,
    backend: &dyn TranslationBackend,
    progress: &dyn ProgressReporter,
) -> StageReport {
    let mut report = StageReport::new(STAGE);
    if config.languages.is_empty() {
        return report;
    }

    let mut jobs = Vec::new();
    for target in &config.languages {
        for entry in registry.entries() {
            let Some(native_lang) = entry.language() else {
                continue;
            };
            if native_lang == target {
                report.skipped += 1;
                continue;
            }
            jobs.push(Job {
                hash: entry.hash.clone(),
                path: entry.path.clone(),
                native_lang: native_lang.to_string(),
                target: target.clone(),
                recorded: entry.translations.get(target).cloned(),
            });
        }
    }

    let total = jobs.len();
    let mut translated: Vec<(ContentHash, String, ContentHash)> = Vec::new();
    let mut results = futures::stream::iter(jobs)
        .map(|job| async move {
            let outcome = translate_one(config, backend, &job).await;
            (job, outcome)
        })
        .buffer_unordered(config.concurrency.max(1));

    let mut done = 0;
    while let Some((job, outcome)) = results.next().await {
        done += 1;
        progress.record_done(STAGE, done, total);
        match outcome {
            Ok(Translated::Written(source)) => {
                debug!(hash = %job.hash.short(), lang = %job.target, "translated");
                translated.push((job.hash, job.target, source));
            }
            Ok(Translated::Cached) => report.skipped += 1,
            Err(e) => {
                warn!(
                    hash = %job.hash.short(),
                    path = %job.path,
                    lang = %job.target,
                    stage = STAGE,
                    error = %e,
                    "translation failed"
                );
                report.failed += 1;
            }
        }
    }

    for (hash, lang, source) in translated {
        if registry.record_translation(&hash, &lang, source) {
            report.processed += 1;
        }
    }

    info!(
        translated = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        "translation complete"
    );
    report
}

async fn translate_one(
    config: &BuildConfig,
    backend: &dyn TranslationBackend,
    job: &Job,
) -> Result<Translated> {
    let native_path = config.content_path(&job.native_lang, job.hash.as_str())?;
    let native = tokio::fs::read_to_string(&native_path)
        .await
        .map_err(|e| DocsmithError::record_io(&native_path, e))?;
    let source = ContentHash::of(&native);

    let dest = config.content_path(&job.target, job.hash.as_str())?;
    if job.recorded.as_ref() == Some(&source) && dest.exists() {
        return Ok(Translated::Cached);
    }

    let output = backend.translate(&native, &job.target).await?;
    if output.trim().is_empty() {
        return Err(DocsmithError::Translation(format!(
            "empty translation into {}",
            job.target
        )));
    }

    write_atomic(&dest, &retag_language(&output, &job.target)).await?;
    Ok(Translated::Written(source))
}

/// Point the front-matter `lang` field at the translation's language.
fn retag_language(doc: &str, lang: &str) -> String {
    let (Some(inner), rest) = split_frontmatter(doc) else {
        return doc.to_string();
    };
    let mut fm = String::with_capacity(inner.len());
    for line in inner.lines() {
        if line.starts_with("lang:") {
            fm.push_str(&format!("lang: \"{lang}\"\n"));
        } else {
            fm.push_str(line);
            fm.push('\n');
        }
    }
    format!("---\n{fm}---\n{rest}")
}
