//! Materialization stage: emit each enriched document into the output tree.
//!
//! The emitted file is the source with its front-matter replaced by the
//! enriched metadata and every resolvable relative link rewritten to a
//! hash-addressed `<scheme>://<hash>` link.

use std::collections::HashMap;

use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use docsmith_markdown::{FrontMatter, extract_links, merge_frontmatter, resolve_relative, rewrite_links, split_target};
use docsmith_shared::{BuildConfig, ContentHash, DocMetadata, DocsmithError, Result};
use docsmith_storage::Registry;

use crate::output::write_atomic;
use crate::pipeline::{ProgressReporter, StageReport};

pub const STAGE: &str = "materialize";

struct Job {
    hash: ContentHash,
    path: String,
    metadata: DocMetadata,
}

enum Materialized {
    Written(ContentHash),
    Unchanged(ContentHash),
}

/// Materialize every enriched entry into `content/<language>/<hash>.<ext>`.
///
/// A file whose bytes would not change is left alone. Entries without
/// metadata are not materialized.
#[instrument(skip_all, fields(stage = STAGE))]
pub async fn run_materialization(
    config: &BuildConfig,
    registry: &mut Registry,
    progress: &dyn ProgressReporter,
) -> StageReport {
    let mut report = StageReport::new(STAGE);

    let jobs: Vec<Job> = registry
        .entries()
        .iter()
        .filter_map(|e| {
            e.metadata.as_ref().map(|m| Job {
                hash: e.hash.clone(),
                path: e.path.clone(),
                metadata: m.clone(),
            })
        })
        .collect();
    if jobs.is_empty() {
        debug!("no enriched entries to materialize");
        return report;
    }

    let total = jobs.len();
    let mut outcomes: Vec<(ContentHash, Materialized)> = Vec::with_capacity(total);
    {
        let snapshot: &Registry = registry;
        let mut results = futures::stream::iter(jobs)
            .map(|job| async move {
                let outcome = materialize_one(config, snapshot, &job).await;
                (job, outcome)
            })
            .buffer_unordered(config.concurrency.max(1));

        let mut done = 0;
        while let Some((job, outcome)) = results.next().await {
            done += 1;
            progress.record_done(STAGE, done, total);
            match outcome {
                Ok(m) => outcomes.push((job.hash, m)),
                Err(e) => {
                    warn!(hash = %job.hash.short(), path = %job.path, stage = STAGE, error = %e, "materialization failed");
                    report.failed += 1;
                }
            }
        }
    }

    for (hash, outcome) in outcomes {
        let emitted = match outcome {
            Materialized::Written(h) => {
                report.processed += 1;
                h
            }
            Materialized::Unchanged(h) => {
                report.skipped += 1;
                h
            }
        };
        registry.set_materialized_hash(&hash, emitted);
    }

    info!(
        written = report.processed,
        unchanged = report.skipped,
        failed = report.failed,
        "materialization complete"
    );
    report
}

async fn materialize_one(config: &BuildConfig, registry: &Registry, job: &Job) -> Result<Materialized> {
    let full = config.source_root.join(&job.path);
    let source = tokio::fs::read_to_string(&full)
        .await
        .map_err(|e| DocsmithError::record_io(&full, e))?;

    let mut resolved: HashMap<String, Option<String>> = HashMap::new();
    for target in extract_links(&source) {
        if !resolved.contains_key(&target) {
            let replacement = resolve_link(config, registry, &job.path, &target).await;
            resolved.insert(target, replacement);
        }
    }
    let body = rewrite_links(&source, |target| resolved.get(target).cloned().flatten());
    let document = merge_frontmatter(&body, &frontmatter_for(&job.metadata));
    let emitted = ContentHash::of(&document);

    let dest = config.content_path(&job.metadata.language, job.hash.as_str())?;
    if let Ok(existing) = tokio::fs::read_to_string(&dest).await {
        if existing == document {
            debug!(hash = %job.hash.short(), "materialized document unchanged");
            return Ok(Materialized::Unchanged(emitted));
        }
    }

    write_atomic(&dest, &document).await?;
    debug!(hash = %job.hash.short(), path = %job.path, dest = %dest.display(), "materialized");
    Ok(Materialized::Written(emitted))
}

fn frontmatter_for(meta: &DocMetadata) -> FrontMatter {
    FrontMatter {
        title: meta.title.clone(),
        description: meta.description.clone(),
        tags: meta.tags.clone(),
        date: meta.inferred_date.map(|d| d.format("%Y-%m-%d").to_string()),
        slug: meta.slug.clone(),
        lang: meta.language.clone(),
    }
}

/// Map a relative link target to its hash-addressed form, keeping any fragment.
///
/// A path not known to the registry is hashed from disk, which resolves links
/// to a path whose content was collapsed into another entry.
async fn resolve_link(
    config: &BuildConfig,
    registry: &Registry,
    from_path: &str,
    target: &str,
) -> Option<String> {
    let (link_path, suffix) = split_target(target);
    if link_path.is_empty() {
        return None;
    }
    let Some(resolved) = resolve_relative(from_path, link_path) else {
        debug!(from = %from_path, %target, "link escapes the source root, left as is");
        return None;
    };

    let hash = match registry.find_by_path(&resolved) {
        Some(entry) => Some(entry.hash.clone()),
        None => match tokio::fs::read(config.source_root.join(&resolved)).await {
            Ok(bytes) => registry
                .find_by_hash(&ContentHash::of(&bytes))
                .map(|e| e.hash.clone()),
            Err(_) => None,
        },
    };

    match hash {
        Some(hash) => Some(format!("{}://{hash}{suffix}", config.link_scheme)),
        None => {
            if is_document_like(&resolved, &config.extension) {
                warn!(from = %from_path, %target, "unresolved document link, left as is");
            } else {
                debug!(from = %from_path, %target, "asset link left as is");
            }
            None
        }
    }
}

/// A target with the document extension, or no extension at all.
fn is_document_like(path: &str, extension: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.ends_with(&format!(".{extension}")) || !name.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::testing::{metadata, test_config, write_source};

    fn add(config: &BuildConfig, registry: &mut Registry, path: &str, content: &str, lang: &str) -> ContentHash {
        write_source(config, path, content);
        let hash = ContentHash::of(content);
        registry.upsert_scanned(&hash, path, extract_links(content));
        registry.set_metadata(&hash, metadata(path, lang));
        hash
    }

    fn read_output(config: &BuildConfig, lang: &str, hash: &ContentHash) -> String {
        std::fs::read_to_string(config.content_path(lang, hash.as_str()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn writes_frontmatter_and_rewrites_links() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        let a = add(&config, &mut registry, "a.md", "# A\n", "en");
        let b = add(
            &config,
            &mut registry,
            "b.md",
            "---\nold: yes\n---\n# B\nSee [a](./a.md#intro), [site](https://example.com), [logo](img/logo.png).\n",
            "en",
        );

        let report = run_materialization(&config, &mut registry, &SilentProgress).await;

        assert_eq!(report.processed, 2);
        let out = read_output(&config, "en", &b);
        assert!(out.starts_with("---\ntitle: \"b.md\"\n"));
        assert!(!out.contains("old: yes"));
        assert!(out.contains(&format!("[a](doc://{a}#intro)")));
        assert!(out.contains("[site](https://example.com)"));
        assert!(out.contains("[logo](img/logo.png)"));

        let entry = registry.find_by_hash(&b).unwrap();
        assert_eq!(entry.materialized_content_hash, Some(ContentHash::of(&out)));
    }

    #[tokio::test]
    async fn unresolved_link_is_left_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        let a = add(&config, &mut registry, "a.md", "[gone](missing.md) [up](../../x.md)\n", "en");

        let report = run_materialization(&config, &mut registry, &SilentProgress).await;

        assert_eq!(report.failed, 0);
        let out = read_output(&config, "en", &a);
        assert!(out.contains("[gone](missing.md)"));
        assert!(out.contains("[up](../../x.md)"));
    }

    #[tokio::test]
    async fn link_to_collapsed_duplicate_resolves_by_content() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        // a.md and c.md share content; the registry only knows c.md.
        write_source(&config, "a.md", "# Same\n");
        let shared = add(&config, &mut registry, "c.md", "# Same\n", "en");
        let b = add(&config, &mut registry, "b.md", "[a](a.md)\n", "en");

        run_materialization(&config, &mut registry, &SilentProgress).await;

        assert!(read_output(&config, "en", &b).contains(&format!("[a](doc://{shared})")));
    }

    #[tokio::test]
    async fn root_relative_and_nested_links() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        let guide = add(&config, &mut registry, "guide/intro.md", "# Intro\n", "en");
        let doc = add(
            &config,
            &mut registry,
            "docs/deep/page.md",
            "[i](/guide/intro.md) [j](../../guide/intro.md)\n",
            "en",
        );

        run_materialization(&config, &mut registry, &SilentProgress).await;

        let out = read_output(&config, "en", &doc);
        assert_eq!(out.matches(&format!("doc://{guide}")).count(), 2);
    }

    #[tokio::test]
    async fn second_run_leaves_files_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        add(&config, &mut registry, "a.md", "# A\n", "en");

        run_materialization(&config, &mut registry, &SilentProgress).await;
        registry.save().unwrap();
        let report = run_materialization(&config, &mut registry, &SilentProgress).await;

        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
        assert!(!registry.is_dirty());
    }

    #[tokio::test]
    async fn written_under_the_document_language() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        let h = add(&config, &mut registry, "fr.md", "# Bonjour\n", "fr");

        run_materialization(&config, &mut registry, &SilentProgress).await;

        assert!(config.content_path("fr", h.as_str()).unwrap().exists());
        assert!(!config.content_path("en", h.as_str()).unwrap().exists());
    }

    #[tokio::test]
    async fn language_that_escapes_the_output_is_a_record_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        let bad = add(&config, &mut registry, "bad.md", "# Bad\n", "../../../escaped");
        let good = add(&config, &mut registry, "good.md", "# Good\n", "en");

        let report = run_materialization(&config, &mut registry, &SilentProgress).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);
        assert!(registry.find_by_hash(&bad).unwrap().materialized_content_hash.is_none());
        assert!(registry.find_by_hash(&good).unwrap().materialized_content_hash.is_some());
        let escaped = tmp.path().parent().unwrap().join("escaped");
        assert!(!escaped.join(format!("{bad}.md")).exists());
        let languages: Vec<_> = std::fs::read_dir(config.output_dir.join("content"))
            .unwrap()
            .map(|d| d.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(languages, vec!["en"]);
    }

    #[tokio::test]
    async fn unenriched_entries_are_skipped_entirely() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path(), &[]);
        let mut registry = Registry::empty(config.store_path());
        write_source(&config, "raw.md", "raw");
        registry.upsert_scanned(&ContentHash::of("raw"), "raw.md", Vec::new());

        let report = run_materialization(&config, &mut registry, &SilentProgress).await;

        assert_eq!(report.processed + report.skipped + report.failed, 0);
        assert!(!config.output_dir.join("content").exists());
    }

    #[test]
    fn document_like_targets() {
        assert!(is_document_like("guide/intro.md", "md"));
        assert!(is_document_like("guide/intro", "md"));
        assert!(!is_document_like("img/logo.png", "md"));
    }
}
