//! Categorization stage: one classifier call over the enriched corpus.

use tracing::{debug, info, instrument, warn};

use docsmith_storage::Registry;

use crate::collaborators::{Classifier, ClassifyDocument};
use crate::pipeline::StageReport;

pub const STAGE: &str = "categorize";

/// Categorize enriched entries that have no label yet.
///
/// Already-categorized entries go to the classifier as context so the
/// taxonomy stays stable. When nothing is uncategorized the classifier is
/// not called. A classifier failure leaves every entry as it was.
#[instrument(skip_all, fields(stage = STAGE))]
pub async fn run_categorization(registry: &mut Registry, classifier: &dyn Classifier) -> StageReport {
    let mut report = StageReport::new(STAGE);

    let mut uncategorized = Vec::new();
    let mut categorized = Vec::new();
    for entry in registry.entries() {
        let Some(meta) = &entry.metadata else {
            continue;
        };
        let doc = ClassifyDocument {
            hash: entry.hash.clone(),
            category: entry.category.clone(),
            metadata: meta.clone(),
        };
        if entry.category.is_some() {
            categorized.push(doc);
        } else {
            uncategorized.push(doc);
        }
    }
    report.skipped = categorized.len();

    if uncategorized.is_empty() {
        debug!(categorized = categorized.len(), "nothing to categorize");
        return report;
    }

    let existing = registry.categories().to_vec();
    let classification = match classifier
        .classify(&existing, &uncategorized, &categorized)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!(stage = STAGE, documents = uncategorized.len(), error = %e, "classification failed");
            report.failed = uncategorized.len();
            return report;
        }
    };

    let mut labels: Vec<String> = Vec::new();
    for label in classification.labels.iter().chain(classification.mapping.values()) {
        let label = label.trim();
        if !label.is_empty() && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }

    for doc in &uncategorized {
        match classification.mapping.get(&doc.hash).map(|l| l.trim()) {
            Some(label) if !label.is_empty() => {
                registry.set_category(&doc.hash, label);
                report.processed += 1;
            }
            _ => {
                warn!(hash = %doc.hash.short(), stage = STAGE, "classifier returned no label for document");
                report.failed += 1;
            }
        }
    }

    // Context documents may be relabelled; unknown hashes are ignored.
    for doc in &categorized {
        if let Some(label) = classification.mapping.get(&doc.hash).map(|l| l.trim()) {
            if !label.is_empty() && doc.category.as_deref() != Some(label) {
                debug!(hash = %doc.hash.short(), from = ?doc.category, to = %label, "relabelled");
                registry.set_category(&doc.hash, label);
            }
        }
    }
    let ignored = classification
        .mapping
        .keys()
        .filter(|h| registry.find_by_hash(h).is_none())
        .count();
    if ignored > 0 {
        debug!(ignored, "mapping entries for unknown hashes ignored");
    }

    registry.set_categories(labels);

    info!(
        categorized = report.processed,
        context = report.skipped,
        failed = report.failed,
        labels = registry.categories().len(),
        "categorization complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClassifier, metadata};
    use docsmith_shared::ContentHash;

    fn enriched(registry: &mut Registry, content: &str, path: &str) -> ContentHash {
        let hash = ContentHash::of(content);
        registry.upsert_scanned(&hash, path, Vec::new());
        registry.set_metadata(&hash, metadata(path, "en"));
        hash
    }

    #[tokio::test]
    async fn labels_uncategorized_entries_with_one_call() {
        let mut registry = Registry::empty("/tmp/unused.json");
        let a = enriched(&mut registry, "a", "a.md");
        let b = enriched(&mut registry, "b", "b.md");
        let classifier = FakeClassifier::labelling("Guides");

        let report = run_categorization(&mut registry, &classifier).await;

        assert_eq!(classifier.calls(), 1);
        assert_eq!(report.processed, 2);
        assert_eq!(registry.categories(), ["Guides"]);
        for h in [&a, &b] {
            assert_eq!(registry.find_by_hash(h).unwrap().category.as_deref(), Some("Guides"));
        }
    }

    #[tokio::test]
    async fn skipped_when_everything_is_categorized() {
        let mut registry = Registry::empty("/tmp/unused.json");
        let a = enriched(&mut registry, "a", "a.md");
        registry.set_category(&a, "Guides");
        let classifier = FakeClassifier::labelling("Other");

        let report = run_categorization(&mut registry, &classifier).await;

        assert_eq!(classifier.calls(), 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn unenriched_entries_are_not_sent() {
        let mut registry = Registry::empty("/tmp/unused.json");
        registry.upsert_scanned(&ContentHash::of("raw"), "raw.md", Vec::new());
        let classifier = FakeClassifier::labelling("Guides");

        run_categorization(&mut registry, &classifier).await;

        assert_eq!(classifier.calls(), 0);
        assert!(registry.find_by_path("raw.md").unwrap().category.is_none());
    }

    #[tokio::test]
    async fn existing_labels_are_passed_as_context() {
        let mut registry = Registry::empty("/tmp/unused.json");
        let a = enriched(&mut registry, "a", "a.md");
        registry.set_category(&a, "Reference");
        registry.set_categories(vec!["Reference".into()]);
        enriched(&mut registry, "b", "b.md");
        let classifier = FakeClassifier::labelling("Guides");

        run_categorization(&mut registry, &classifier).await;

        assert_eq!(*classifier.seen_existing.lock().unwrap(), vec!["Reference".to_string()]);
        assert_eq!(registry.categories(), ["Reference", "Guides"]);
        assert_eq!(registry.find_by_hash(&a).unwrap().category.as_deref(), Some("Reference"));
    }

    #[tokio::test]
    async fn failure_leaves_registry_untouched() {
        let mut registry = Registry::empty("/tmp/unused.json");
        let a = enriched(&mut registry, "a", "a.md");
        let classifier = FakeClassifier::failing();

        let report = run_categorization(&mut registry, &classifier).await;

        assert_eq!(report.failed, 1);
        assert!(registry.find_by_hash(&a).unwrap().category.is_none());
        assert!(registry.categories().is_empty());
    }
}
