//! Core domain types for the docsmith registry.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current schema version for the registry store format.
pub const CURRENT_STORE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// Hex-encoded SHA-256 digest of a document's exact bytes.
///
/// This is the primary key of a [`RegistryEntry`]: stable across renames,
/// different for any content change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash the given bytes.
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContentHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Primary subtag plus optional subtags, e.g. `en`, `pt-br`, `zh-hant`.
static LANG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{2,8})*$").expect("valid regex"));

/// Normalise a language code for comparison and path use (`" EN "` → `"en"`).
pub fn normalize_lang(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

/// Whether a normalised code is a plain language tag, safe as a path segment.
pub fn is_valid_lang(code: &str) -> bool {
    LANG_RE.is_match(code)
}

// ---------------------------------------------------------------------------
// Enrichment metadata
// ---------------------------------------------------------------------------

/// Token accounting appended to every enrichment result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentUsage {
    /// Model that produced the metadata.
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    /// When the enrichment call completed.
    pub enriched_at: DateTime<Utc>,
}

impl EnrichmentUsage {
    pub fn total_tokens(&self) -> u64 {
        self.tokens_in + self.tokens_out
    }
}

/// Structured enrichment result stored on a registry entry.
///
/// Written all-or-nothing: an entry either has a complete `DocMetadata` or none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub title: String,
    /// One-line summary.
    pub short_summary: String,
    /// Paragraph-length summary; used as the front-matter description.
    pub description: String,
    /// Long-form summary.
    pub summary: String,
    /// URL-safe slug.
    pub slug: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation date inferred from the content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_date: Option<NaiveDate>,
    /// Inferred source language code (normalised, e.g. `en`).
    pub language: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Intended audience description.
    #[serde(default)]
    pub audience: String,
    pub usage: EnrichmentUsage,
}

// ---------------------------------------------------------------------------
// RegistryEntry
// ---------------------------------------------------------------------------

/// One record per distinct document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Content hash of the source document.
    pub hash: ContentHash,
    /// Current path relative to the source root, `/`-separated.
    pub path: String,
    /// Raw relative link targets found in the source, in document order.
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Hash of the last emitted native (materialized) document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialized_content_hash: Option<ContentHash>,
    /// Per target language: the materialized hash the current translation was made from.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, ContentHash>,
}

impl RegistryEntry {
    /// Fresh entry as created by the scanner.
    pub fn new(hash: ContentHash, path: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            hash,
            path: path.into(),
            links,
            metadata: None,
            category: None,
            materialized_content_hash: None,
            translations: BTreeMap::new(),
        }
    }

    /// Inferred source language, once enriched.
    pub fn language(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.language.as_str())
    }
}

// ---------------------------------------------------------------------------
// RegistryStore
// ---------------------------------------------------------------------------

/// The persisted form of the registry (`registry.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStore {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// When the store was last written.
    pub updated_at: DateTime<Utc>,
    /// Finalized category taxonomy from the last classification call.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub entries: Vec<RegistryEntry>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self {
            version: CURRENT_STORE_VERSION,
            updated_at: Utc::now(),
            categories: Vec::new(),
            entries: Vec::new(),
        }
    }
}
