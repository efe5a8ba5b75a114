//! Shared types, error model, and configuration for docsmith.
//!
//! This crate is the foundation depended on by all other docsmith crates.
//! It provides:
//! - [`DocsmithError`], the unified error type
//! - Domain types ([`RegistryEntry`], [`RegistryStore`], [`DocMetadata`], [`ContentHash`])
//! - Configuration ([`AppConfig`], [`BuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, DefaultsConfig, OpenRouterConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{DocsmithError, Result};
pub use types::{
    CURRENT_STORE_VERSION, ContentHash, DocMetadata, EnrichmentUsage, RegistryEntry,
    RegistryStore, is_valid_lang, normalize_lang,
};
