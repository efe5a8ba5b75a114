//! Contracts for the external services the pipeline calls.
//!
//! Prompt construction and transport live behind these traits; the stages
//! only see typed requests and typed results. Every method is a suspension
//! point and may run concurrently with other calls on the same instance.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use docsmith_shared::{ContentHash, DocMetadata, Result};

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Structured metadata extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub title: String,
    pub description: String,
    pub summary: String,
    pub short_summary: String,
    pub slug: String,
    pub tags: Vec<String>,
    pub inferred_date: Option<NaiveDate>,
    pub language: String,
    pub key_points: Vec<String>,
    pub audience: String,
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Produces [`Extraction`]s from raw document content.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fails with `DocsmithError::Extraction` when the call errors or the
    /// response cannot be parsed into an [`Extraction`].
    async fn extract(&self, content: &str) -> Result<Extraction>;
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A document as presented to the classifier.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyDocument {
    pub hash: ContentHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub metadata: DocMetadata,
}

/// Finalized taxonomy plus a hash → label assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub labels: Vec<String>,
    pub mapping: HashMap<ContentHash, String>,
}

/// Assigns every document to one label of a small shared taxonomy.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// `categorized` is context only, so labels stay stable across runs.
    /// Fails with `DocsmithError::Classification` on malformed output.
    async fn classify(
        &self,
        existing_labels: &[String],
        uncategorized: &[ClassifyDocument],
        categorized: &[ClassifyDocument],
    ) -> Result<Classification>;
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translates a whole materialized document.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Fails with `DocsmithError::Translation` on empty or malformed output.
    async fn translate(&self, content: &str, target_lang: &str) -> Result<String>;
}
