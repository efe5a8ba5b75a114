//! Whole-document translation over chat completions.

use async_trait::async_trait;

use docsmith_core::TranslationBackend;
use docsmith_shared::{DocsmithError, Result};

use crate::client::OpenRouterClient;

fn system_prompt(target_lang: &str) -> String {
    format!(
        "Translate the Markdown document you receive into the language with ISO 639-1 code \
         \"{target_lang}\". Keep the Markdown structure exactly. In the YAML front-matter, \
         translate the values of title and description, keep every key and every other value. \
         Do not translate code blocks, inline code, URLs or link targets. \
         Reply with the translated document only, without commentary or code fences."
    )
}

#[async_trait]
impl TranslationBackend for OpenRouterClient {
    async fn translate(&self, content: &str, target_lang: &str) -> Result<String> {
        let completion = self
            .complete(&system_prompt(target_lang), content)
            .await
            .map_err(|e| DocsmithError::Translation(e.to_string()))?;

        let text = unwrap_document_fence(&completion.text);
        if text.trim().is_empty() {
            return Err(DocsmithError::Translation(format!(
                "empty response for language {target_lang}"
            )));
        }

        let mut out = text.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

/// Remove a fence the model wrapped the whole reply in (```markdown / ```md).
fn unwrap_document_fence(text: &str) -> &str {
    let trimmed = text.trim();
    for opener in ["```markdown\n", "```md\n"] {
        if let Some(inner) = trimmed.strip_prefix(opener) {
            return inner.strip_suffix("```").unwrap_or(inner);
        }
    }
    text
}
