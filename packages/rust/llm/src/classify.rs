//! Corpus-wide classification over chat completions.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docsmith_core::{Classification, Classifier, ClassifyDocument};
use docsmith_shared::{ContentHash, DocsmithError, Result};

use crate::client::OpenRouterClient;
use crate::json::parse_object;

const SYSTEM_PROMPT: &str = "You organise a documentation site into a small set of categories. \
You receive the existing category labels, documents that need a category, and documents that \
already have one. Reuse existing labels wherever they fit; add a new label only when no existing \
label fits. Keep the full set small (at most about ten labels), short, and in Title Case. \
Respond with a single JSON object and nothing else: \
{\"labels\": [every label in use], \"mapping\": {\"<hash>\": \"<label>\"}}. \
The mapping must contain every document from \"uncategorized\".";

#[derive(Serialize)]
struct Request<'a> {
    existing_labels: &'a [String],
    uncategorized: Vec<DocSummary<'a>>,
    categorized: Vec<DocSummary<'a>>,
}

#[derive(Serialize)]
struct DocSummary<'a> {
    hash: &'a str,
    title: &'a str,
    short_summary: &'a str,
    description: &'a str,
    tags: &'a [String],
    key_points: &'a [String],
    audience: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
}

impl<'a> From<&'a ClassifyDocument> for DocSummary<'a> {
    fn from(doc: &'a ClassifyDocument) -> Self {
        Self {
            hash: doc.hash.as_str(),
            title: &doc.metadata.title,
            short_summary: &doc.metadata.short_summary,
            description: &doc.metadata.description,
            tags: &doc.metadata.tags,
            key_points: &doc.metadata.key_points,
            audience: &doc.metadata.audience,
            category: doc.category.as_deref(),
        }
    }
}

#[derive(Deserialize)]
struct RawClassification {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    mapping: HashMap<String, String>,
}

#[async_trait]
impl Classifier for OpenRouterClient {
    async fn classify(
        &self,
        existing_labels: &[String],
        uncategorized: &[ClassifyDocument],
        categorized: &[ClassifyDocument],
    ) -> Result<Classification> {
        let request = Request {
            existing_labels,
            uncategorized: uncategorized.iter().map(DocSummary::from).collect(),
            categorized: categorized.iter().map(DocSummary::from).collect(),
        };
        let user = serde_json::to_string_pretty(&request)
            .map_err(|e| DocsmithError::Classification(format!("failed to encode request: {e}")))?;

        let completion = self
            .complete(SYSTEM_PROMPT, &user)
            .await
            .map_err(|e| DocsmithError::Classification(e.to_string()))?;

        let raw: RawClassification =
            parse_object(&completion.text).map_err(DocsmithError::Classification)?;
        if raw.mapping.is_empty() {
            return Err(DocsmithError::Classification("response has an empty mapping".into()));
        }

        Ok(Classification {
            labels: raw.labels,
            mapping: raw
                .mapping
                .into_iter()
                .map(|(hash, label)| (ContentHash::from(hash), label))
                .collect(),
        })
    }
}
