//! YAML front-matter handling.
//!
//! Front-matter is emitted by hand (flat scalars and one flow list), so there is
//! no YAML serializer dependency; values are quoted and escaped.

/// Fields written into a materialized document's front-matter block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// ISO 8601 date (`YYYY-MM-DD`).
    pub date: Option<String>,
    pub slug: String,
    pub lang: String,
}

impl FrontMatter {
    /// Render as a `---` delimited block ending with a newline.
    pub fn render(&self) -> String {
        let mut fm = String::from("---\n");
        fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(&self.title)));
        fm.push_str(&format!(
            "description: \"{}\"\n",
            escape_yaml_string(&self.description)
        ));
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| format!("\"{}\"", escape_yaml_string(t)))
            .collect();
        fm.push_str(&format!("tags: [{}]\n", tags.join(", ")));
        if let Some(date) = &self.date {
            fm.push_str(&format!("date: \"{date}\"\n"));
        }
        fm.push_str(&format!("slug: \"{}\"\n", escape_yaml_string(&self.slug)));
        fm.push_str(&format!("lang: \"{}\"\n", escape_yaml_string(&self.lang)));
        fm.push_str("---\n");
        fm
    }
}

/// Split a document into its front-matter body (between the fences) and the rest.
///
/// Only a block starting on the very first line counts. An unterminated block
/// is treated as ordinary content.
pub fn split_frontmatter(md: &str) -> (Option<&str>, &str) {
    let Some(after_open) = md
        .strip_prefix("---\n")
        .or_else(|| md.strip_prefix("---\r\n"))
    else {
        return (None, md);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let inner = &after_open[..offset];
            let rest = &after_open[offset + line.len()..];
            return (Some(inner), rest);
        }
        offset += line.len();
    }

    (None, md)
}

/// Replace any existing front-matter with `fm`.
pub fn merge_frontmatter(md: &str, fm: &FrontMatter) -> String {
    let (_, body) = split_frontmatter(md);
    let body = body.trim_start_matches(['\r', '\n']);
    format!("{}\n{body}", fm.render())
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
