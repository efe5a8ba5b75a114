//! Fake collaborators and fixtures for stage tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use docsmith_shared::{BuildConfig, ContentHash, DocMetadata, DocsmithError, EnrichmentUsage, Result};

use crate::collaborators::{
    Classification, Classifier, ClassifyDocument, Extraction, Extractor, TranslationBackend,
};

/// Source tree under `<root>/src`, output under `<root>/out`.
pub(crate) fn test_config(root: &Path, languages: &[&str]) -> BuildConfig {
    let config = BuildConfig {
        source_root: root.join("src"),
        output_dir: root.join("out"),
        extension: "md".into(),
        languages: Vec::new(),
        concurrency: 2,
        link_scheme: "doc".into(),
        prune: false,
    };
    config
        .with_languages(languages.iter().copied())
        .expect("valid test languages")
}

pub(crate) fn write_source(config: &BuildConfig, path: &str, content: &str) {
    let full = config.source_root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
}

pub(crate) fn metadata(title: &str, language: &str) -> DocMetadata {
    DocMetadata {
        title: title.into(),
        short_summary: format!("{title} in short"),
        description: format!("About {title}"),
        summary: format!("{title} summary"),
        slug: title.to_lowercase().replace(' ', "-"),
        tags: vec!["docs".into()],
        inferred_date: None,
        language: language.into(),
        key_points: Vec::new(),
        audience: "developers".into(),
        usage: EnrichmentUsage::default(),
    }
}

/// Title from the first `# ` heading; language `fr` when the text says `lang:fr`.
/// Content containing `FAIL` is rejected.
#[derive(Default)]
pub(crate) struct FakeExtractor {
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, content: &str) -> Result<Extraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if content.contains("FAIL") {
            return Err(DocsmithError::Extraction("unparseable response".into()));
        }
        let title = content
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .unwrap_or("Untitled")
            .trim()
            .to_string();
        let language = if content.contains("lang:fr") { "fr" } else { "en" };
        Ok(Extraction {
            slug: title.to_lowercase().replace(' ', "-"),
            description: format!("About {title}"),
            summary: format!("{title} summary"),
            short_summary: format!("{title} in short"),
            tags: vec!["docs".into()],
            inferred_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            language: language.into(),
            key_points: vec!["one".into()],
            audience: "developers".into(),
            model: "fake/model".into(),
            tokens_in: 10,
            tokens_out: 5,
            title,
        })
    }
}

/// Labels every uncategorized document with `label`, or fails when `fail` is set.
pub(crate) struct FakeClassifier {
    pub calls: AtomicUsize,
    pub label: String,
    pub fail: bool,
    pub seen_existing: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn labelling(label: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            label: label.into(),
            fail: false,
            seen_existing: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::labelling("unused")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(
        &self,
        existing_labels: &[String],
        uncategorized: &[ClassifyDocument],
        _categorized: &[ClassifyDocument],
    ) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_existing.lock().unwrap() = existing_labels.to_vec();
        if self.fail {
            return Err(DocsmithError::Classification("malformed mapping".into()));
        }
        let mut labels = existing_labels.to_vec();
        if !labels.contains(&self.label) {
            labels.push(self.label.clone());
        }
        let mapping: HashMap<ContentHash, String> = uncategorized
            .iter()
            .map(|d| (d.hash.clone(), self.label.clone()))
            .collect();
        Ok(Classification { labels, mapping })
    }
}

/// Appends a `[lang]` marker line; returns empty output when content contains `EMPTY`.
#[derive(Default)]
pub(crate) struct FakeTranslator {
    pub calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for FakeTranslator {
    async fn translate(&self, content: &str, target_lang: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if content.contains("EMPTY") {
            return Ok(String::new());
        }
        Ok(format!("{content}\n[{target_lang}]\n"))
    }
}
