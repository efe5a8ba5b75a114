//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docsmith_core::{BuildReport, Collaborators, ProgressReporter};
use docsmith_discovery::GitLister;
use docsmith_llm::OpenRouterClient;
use docsmith_shared::{AppConfig, BuildConfig, init_config, load_config, validate_api_key};
use docsmith_storage::Registry;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsmith: enrich, link and translate a Markdown documentation tree.
#[derive(Parser)]
#[command(
    name = "docsmith",
    version,
    about = "Incrementally enrich, cross-link and translate a Markdown documentation tree.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scan the source tree and run every pipeline stage.
    Build {
        /// Source tree to scan (defaults to config `source_dir`).
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Output directory for the registry and content (defaults to config `output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Target language codes; repeat or comma-separate. Replaces the configured list.
        #[arg(short, long = "lang", value_delimiter = ',')]
        languages: Vec<String>,

        /// Concurrent collaborator calls per stage.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Model ID override.
        #[arg(long)]
        model: Option<String>,

        /// Delete content files of documents no longer in the source tree.
        #[arg(long)]
        prune: bool,
    },

    /// Show what the registry currently holds.
    Status {
        /// Output directory holding the registry (defaults to config `output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsmith=info",
        1 => "docsmith=debug",
        _ => "docsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            source,
            out,
            languages,
            concurrency,
            model,
            prune,
        } => {
            let config = load_config()?;
            let build = BuildOverrides {
                source,
                out,
                languages,
                concurrency,
                prune,
            }
            .apply(&config)?;
            cmd_build(&config, build, model).await
        }
        Command::Status { out } => cmd_status(out).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Flag values that override the config file.
struct BuildOverrides {
    source: Option<PathBuf>,
    out: Option<PathBuf>,
    languages: Vec<String>,
    concurrency: Option<usize>,
    prune: bool,
}

impl BuildOverrides {
    fn apply(self, config: &AppConfig) -> docsmith_shared::Result<BuildConfig> {
        let mut build = BuildConfig::try_from(config)?;
        if let Some(source) = self.source {
            build.source_root = source;
        }
        if let Some(out) = self.out {
            build.output_dir = out;
        }
        if let Some(n) = self.concurrency {
            build.concurrency = n.max(1);
        }
        build.prune = self.prune;
        if self.languages.is_empty() {
            Ok(build)
        } else {
            build.with_languages(self.languages)
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(config: &AppConfig, build: BuildConfig, model: Option<String>) -> Result<()> {
    // Validate API key before doing anything
    let api_key = validate_api_key(config)?;

    let mut client = OpenRouterClient::new(api_key, &config.openrouter)?;
    if let Some(model) = model {
        client = client.with_model(model);
    }

    info!(
        source = %build.source_root.display(),
        out = %build.output_dir.display(),
        languages = ?build.languages,
        model = %client.model(),
        "building documentation"
    );

    let lister = GitLister;
    let services = Collaborators {
        lister: &lister,
        extractor: &client,
        classifier: &client,
        translator: &client,
    };

    let reporter = CliProgress::new();
    let report = docsmith_core::build(&build, services, &reporter).await?;

    print_build_summary(&build, &report);
    Ok(())
}

fn print_build_summary(build: &BuildConfig, report: &BuildReport) {
    let scan = &report.scan;
    println!();
    println!("  Build finished in {:.1}s", report.elapsed.as_secs_f64());
    println!(
        "  Scan:        {} found, {} new, {} moved, {} unchanged, {} removed, {} unreadable",
        scan.discovered,
        scan.added,
        scan.moved,
        scan.unchanged,
        scan.evicted.len(),
        scan.failed
    );
    for stage in &report.stages {
        println!(
            "  {:<12} {} processed, {} skipped, {} failed",
            format!("{}:", stage.stage),
            stage.processed,
            stage.skipped,
            stage.failed
        );
    }
    if report.pruned > 0 || report.prune_failed > 0 {
        println!(
            "  Pruned:      {} content files, {} could not be removed",
            report.pruned, report.prune_failed
        );
    }
    println!("  Tokens:      {}", report.tokens_used());
    println!("  Entries:     {}", report.entries);
    println!("  Output:      {}", build.output_dir.display());
    if report.failed() > 0 {
        println!();
        println!(
            "  {} record(s) failed and will be retried on the next run (see log for details).",
            report.failed()
        );
    }
    println!();
}

async fn cmd_status(out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let mut build = BuildConfig::try_from(&config)?;
    if let Some(out) = out {
        build.output_dir = out;
    }

    let store_path = build.store_path();
    if !store_path.exists() {
        return Err(eyre!(
            "no registry found at '{}'; run `docsmith build` first",
            store_path.display()
        ));
    }

    let registry = Registry::load(&store_path);
    let entries = registry.entries();
    let enriched = entries.iter().filter(|e| e.metadata.is_some()).count();
    let categorized = entries.iter().filter(|e| e.category.is_some()).count();

    let mut native: BTreeMap<&str, usize> = BTreeMap::new();
    let mut translated: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        if let Some(lang) = entry.language() {
            *native.entry(lang).or_default() += 1;
        }
        for lang in entry.translations.keys() {
            *translated.entry(lang.as_str()).or_default() += 1;
        }
    }

    println!();
    println!("  Registry:    {}", registry.path().display());
    println!("  Entries:     {}", entries.len());
    println!("  Enriched:    {enriched}");
    println!("  Categorized: {categorized}");
    if !registry.categories().is_empty() {
        println!("  Categories:  {}", registry.categories().join(", "));
    }
    for (lang, count) in &native {
        println!("  Native {lang}:   {count}");
    }
    for (lang, count) in &translated {
        println!("  Translated {lang}: {count}");
    }
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_done(&self, stage: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("{stage} [{current}/{total}]"));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
