//! Metadata extraction over chat completions.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use docsmith_core::{Extraction, Extractor};
use docsmith_shared::{DocsmithError, Result};

use crate::client::OpenRouterClient;
use crate::json::parse_object;

/// Documents longer than this are truncated before sending.
const MAX_INPUT_CHARS: usize = 48_000;

const SYSTEM_PROMPT: &str = "You extract metadata from a Markdown document. \
Respond with a single JSON object and nothing else, using these keys:\n\
- \"title\": string, the document title\n\
- \"description\": string, one or two sentences\n\
- \"summary\": string, one paragraph\n\
- \"short_summary\": string, at most 20 words\n\
- \"slug\": string, lowercase words joined by dashes\n\
- \"tags\": array of 3 to 8 short lowercase strings\n\
- \"date\": string YYYY-MM-DD if the document states or clearly implies a date, else null\n\
- \"language\": ISO 639-1 code of the language the document is written in\n\
- \"key_points\": array of short strings\n\
- \"audience\": string, who the document is for";

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    summary: String,
    #[serde(default, alias = "shortSummary")]
    short_summary: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, alias = "inferred_date")]
    date: Option<String>,
    #[serde(default, alias = "inferredLanguageCode")]
    language: String,
    #[serde(default, alias = "keyPoints")]
    key_points: Vec<String>,
    #[serde(default)]
    audience: String,
}

#[async_trait]
impl Extractor for OpenRouterClient {
    async fn extract(&self, content: &str) -> Result<Extraction> {
        let completion = self
            .complete(SYSTEM_PROMPT, truncate(content, MAX_INPUT_CHARS))
            .await
            .map_err(|e| DocsmithError::Extraction(e.to_string()))?;

        let raw: RawExtraction =
            parse_object(&completion.text).map_err(DocsmithError::Extraction)?;

        let title = raw.title.trim().to_string();
        if title.is_empty() {
            return Err(DocsmithError::Extraction("response has no title".into()));
        }
        let language = raw.language.trim().to_lowercase();
        if language.is_empty() {
            return Err(DocsmithError::Extraction("response has no language".into()));
        }

        let slug = if raw.slug.trim().is_empty() {
            slugify(&title)
        } else {
            slugify(&raw.slug)
        };

        Ok(Extraction {
            slug,
            description: raw.description.trim().to_string(),
            summary: raw.summary.trim().to_string(),
            short_summary: raw.short_summary.trim().to_string(),
            tags: raw
                .tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            inferred_date: raw.date.as_deref().and_then(parse_date),
            language,
            key_points: raw.key_points,
            audience: raw.audience.trim().to_string(),
            model: completion.model,
            tokens_in: completion.tokens_in,
            tokens_out: completion.tokens_out,
            title,
        })
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        return None;
    }
    // Accept a full timestamp by keeping its date part.
    let date_part = s.get(..10).unwrap_or(s);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            debug!(value = %s, error = %e, "ignoring unparseable date");
            None
        }
    }
}

/// Lowercase `[a-z0-9-]` slug. Common Latin accents are folded to their
/// base letter; any other character acts as a separator.
fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if let Some(folded) = fold_latin(c) {
            slug.push_str(folded);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        _ => return None,
    };
    Some(folded)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
