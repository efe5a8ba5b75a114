//! Application configuration for docsmith.
//!
//! User config lives at `~/.docsmith/docsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsmithError, Result};
use crate::types::{is_valid_lang, normalize_lang};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsmith";

// ---------------------------------------------------------------------------
// Config structs (matching docsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Source tree to scan.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Where the registry store and content files are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Source document extension (without the dot).
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Target languages for translation.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Per-stage fan-out for collaborator calls and file I/O.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Scheme used for hash-addressed links (`<scheme>://<hash>`).
    #[serde(default = "default_link_scheme")]
    pub link_scheme: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            extension: default_extension(),
            languages: Vec::new(),
            concurrency: default_concurrency(),
            link_scheme: default_link_scheme(),
        }
    }
}

fn default_source_dir() -> String {
    ".".into()
}
fn default_output_dir() -> String {
    "_site".into()
}
fn default_extension() -> String {
    "md".into()
}
fn default_concurrency() -> usize {
    4
}
fn default_link_scheme() -> String {
    "doc".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for enrichment, classification and translation.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Chat-completions API base.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_timeout_secs() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Build config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime build configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the source tree.
    pub source_root: PathBuf,
    /// Output directory (store + content files).
    pub output_dir: PathBuf,
    /// Source document extension, without the dot.
    pub extension: String,
    /// Normalised target languages, deduplicated, in configured order.
    pub languages: Vec<String>,
    /// Per-stage fan-out.
    pub concurrency: usize,
    /// Scheme for hash-addressed links.
    pub link_scheme: String,
    /// Remove content files belonging to evicted entries.
    pub prune: bool,
}

impl BuildConfig {
    /// Path of the registry store file.
    pub fn store_path(&self) -> PathBuf {
        self.output_dir.join("registry.json")
    }

    /// Directory holding content files for one language.
    ///
    /// The code becomes a path segment, so anything but a plain language tag
    /// is refused.
    pub fn content_dir(&self, lang: &str) -> Result<PathBuf> {
        let lang = normalize_lang(lang);
        if !is_valid_lang(&lang) {
            return Err(DocsmithError::validation(format!("invalid language code {lang:?}")));
        }
        Ok(self.output_dir.join("content").join(lang))
    }

    /// Destination of the document `hash` in language `lang`.
    pub fn content_path(&self, lang: &str, hash: &str) -> Result<PathBuf> {
        Ok(self.content_dir(lang)?.join(format!("{hash}.{}", self.extension)))
    }

    /// Replace the target language list, normalising and deduplicating.
    pub fn with_languages<I, S>(mut self, languages: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.languages.clear();
        for lang in languages {
            let lang = normalize_lang(lang.as_ref());
            if lang.is_empty() || self.languages.contains(&lang) {
                continue;
            }
            if !is_valid_lang(&lang) {
                return Err(DocsmithError::config(format!(
                    "invalid target language {lang:?} (expected a code like \"fr\" or \"pt-br\")"
                )));
            }
            self.languages.push(lang);
        }
        Ok(self)
    }
}

impl TryFrom<&AppConfig> for BuildConfig {
    type Error = DocsmithError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base = Self {
            source_root: PathBuf::from(&config.defaults.source_dir),
            output_dir: PathBuf::from(&config.defaults.output_dir),
            extension: config.defaults.extension.trim_start_matches('.').to_string(),
            languages: Vec::new(),
            concurrency: config.defaults.concurrency.max(1),
            link_scheme: config.defaults.link_scheme.clone(),
            prune: false,
        };
        base.with_languages(&config.defaults.languages)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsmith/docsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DocsmithError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
