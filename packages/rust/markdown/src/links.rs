//! Permissive link scanning and rewriting.
//!
//! Recognises inline links and images (`[text](target)`, `![alt](<target>)`)
//! and reference definitions (`[id]: target`). Fenced code blocks are skipped
//! in both directions, so code samples are never rewritten.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// `](target`: group 1 is the prefix kept verbatim, group 2 the target.
static INLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\]\(\s*<?)([^)\s>]+)").expect("valid regex"));

/// `[id]: target` at the start of a line.
static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s{0,3}\[[^\]]+\]:\s*<?)([^\s>]+)").expect("valid regex"));

/// Whether `target` points at another file in the same tree.
///
/// Absolute URLs (anything with a scheme, including `mailto:`), protocol-relative
/// links and pure in-page anchors are not relative references.
pub fn is_relative_target(target: &str) -> bool {
    if target.is_empty() || target.starts_with('#') || target.starts_with("//") {
        return false;
    }
    Url::parse(target).is_err()
}

/// Split `target` into its path and the `#fragment` / `?query` suffix.
pub fn split_target(target: &str) -> (&str, &str) {
    match target.find(['#', '?']) {
        Some(i) => target.split_at(i),
        None => (target, ""),
    }
}

/// Resolve a link path against the source-relative path of the linking document.
///
/// Leading `/` resolves from the source root. Returns `None` when the link
/// climbs above the root or is empty after normalisation.
pub fn resolve_relative(from_path: &str, link_path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();

    let rest = if let Some(stripped) = link_path.strip_prefix('/') {
        stripped
    } else {
        if let Some((dir, _file)) = from_path.rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
        link_path
    };

    for seg in rest.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Extract relative link targets in document order (duplicates kept).
pub fn extract_links(md: &str) -> Vec<String> {
    let mut links = Vec::new();
    for_each_prose_line(md, |line| {
        let mut found: Vec<(usize, &str)> = INLINE_RE
            .captures_iter(line)
            .filter_map(|c| c.get(2).map(|m| (m.start(), m.as_str())))
            .collect();
        if let Some(m) = REFERENCE_RE.captures(line).and_then(|c| c.get(2)) {
            found.push((m.start(), m.as_str()));
        }
        found.sort_by_key(|(pos, _)| *pos);
        links.extend(
            found
                .into_iter()
                .filter(|(_, t)| is_relative_target(t))
                .map(|(_, t)| t.to_string()),
        );
        line.to_string()
    });
    links
}

/// Rewrite relative link targets.
///
/// `resolve` is called once per relative target; returning `None` leaves the
/// link byte-identical. Everything outside the target text is preserved.
pub fn rewrite_links<F>(md: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    for_each_prose_line(md, |line| {
        let mut replace = |caps: &Captures| {
            let target = &caps[2];
            let new_target = if is_relative_target(target) {
                resolve(target)
            } else {
                None
            };
            format!("{}{}", &caps[1], new_target.as_deref().unwrap_or(target))
        };
        let line = INLINE_RE.replace_all(line, &mut replace).into_owned();
        REFERENCE_RE.replace(&line, &mut replace).into_owned()
    })
}

/// Apply `f` to every line outside fenced code blocks; code lines pass through.
fn for_each_prose_line<F>(md: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(md.len());
    let mut fence: Option<&str> = None;

    for line in md.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let marker = if trimmed.starts_with("```") {
            Some("```")
        } else if trimmed.starts_with("~~~") {
            Some("~~~")
        } else {
            None
        };

        match (fence, marker) {
            (None, Some(m)) => {
                fence = Some(m);
                out.push_str(line);
            }
            (Some(open), Some(m)) if open == m => {
                fence = None;
                out.push_str(line);
            }
            (Some(_), _) => out.push_str(line),
            (None, None) => out.push_str(&f(line)),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_target_classification() {
        assert!(is_relative_target("./b.md"));
        assert!(is_relative_target("../guide/intro.md#setup"));
        assert!(is_relative_target("/docs/a.md"));
        assert!(is_relative_target("img/logo.png"));
        assert!(!is_relative_target("https://example.com/a.md"));
        assert!(!is_relative_target("mailto:someone@example.com"));
        assert!(!is_relative_target("//cdn.example.com/x.js"));
        assert!(!is_relative_target("#heading"));
        assert!(!is_relative_target(""));
    }

    #[test]
    fn split_target_keeps_suffix() {
        assert_eq!(split_target("b.md#intro"), ("b.md", "#intro"));
        assert_eq!(split_target("b.md?x=1"), ("b.md", "?x=1"));
        assert_eq!(split_target("b.md"), ("b.md", ""));
    }

    #[test]
    fn resolve_relative_paths() {
        assert_eq!(resolve_relative("a.md", "./b.md").as_deref(), Some("b.md"));
        assert_eq!(resolve_relative("guide/a.md", "b.md").as_deref(), Some("guide/b.md"));
        assert_eq!(resolve_relative("guide/deep/a.md", "../b.md").as_deref(), Some("guide/b.md"));
        assert_eq!(resolve_relative("guide/a.md", "/top.md").as_deref(), Some("top.md"));
        assert_eq!(resolve_relative("a.md", "../outside.md"), None);
    }

    #[test]
    fn extract_finds_inline_and_reference_links() {
        let md = "# Title\n\nSee [B](./b.md) and [site](https://x.io).\n\
                  ![logo](<img/logo.png>)\n\n[ref]: ../c.md \"C\"\n";
        assert_eq!(extract_links(md), vec!["./b.md", "img/logo.png", "../c.md"]);
    }

    #[test]
    fn extract_skips_code_fences() {
        let md = "[a](a.md)\n```md\n[b](b.md)\n```\n~~~\n[c](c.md)\n~~~\n[d](d.md)\n";
        assert_eq!(extract_links(md), vec!["a.md", "d.md"]);
    }

    #[test]
    fn rewrite_replaces_only_resolved_targets() {
        let md = "Go to [B](./b.md#part), [X](./x.md) or [web](https://e.com).\n";
        let out = rewrite_links(md, |t| (t == "./b.md#part").then(|| "doc://H2#part".to_string()));
        assert_eq!(
            out,
            "Go to [B](doc://H2#part), [X](./x.md) or [web](https://e.com).\n"
        );
    }

    #[test]
    fn rewrite_without_matches_is_byte_identical() {
        let md = "---\ntitle: x\n---\n\n[a](  <a.md>  )\r\n```\n[b](b.md)\n```\nno newline";
        assert_eq!(rewrite_links(md, |_| None), md);
    }

    #[test]
    fn rewrite_reference_definitions() {
        let md = "[ref]: b.md \"Title\"\n";
        let out = rewrite_links(md, |_| Some("doc://H".into()));
        assert_eq!(out, "[ref]: doc://H \"Title\"\n");
    }

    #[test]
    fn rewrite_never_touches_code_blocks() {
        let md = "```\n[b](b.md)\n```\n";
        let mut calls = 0;
        let out = rewrite_links(md, |_| {
            calls += 1;
            Some("doc://H".into())
        });
        assert_eq!(out, md);
        assert_eq!(calls, 0);
    }
}
