//! Markdown source handling: link scanning, link rewriting, and front-matter.
//!
//! Nothing here renders Markdown. These are text-level passes that preserve
//! every byte they do not explicitly change.

mod frontmatter;
mod links;

pub use frontmatter::{FrontMatter, merge_frontmatter, split_frontmatter};
pub use links::{extract_links, is_relative_target, resolve_relative, rewrite_links, split_target};
