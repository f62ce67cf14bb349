//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use insightforge_backend::{Backend, HttpBackend};
use insightforge_core::generate::Generator;
use insightforge_core::pipeline::{self, ProgressReporter, RunConfig};
use insightforge_core::{gate, schema};
use insightforge_shared::{
    AppConfig, RunReport, init_config, load_config, validate_startup,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// insightforge: turn a document catalog into daily insight assets.
#[derive(Parser)]
#[command(
    name = "insightforge",
    version,
    about = "Produce schema-validated insight assets from a document catalog via tiered LLM backends.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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
    /// Execute one production run: select, generate, validate, persist.
    Run {
        /// Per-run item cap.
        #[arg(long)]
        cap: Option<usize>,

        /// Fraction of the queue assigned the premium tier.
        #[arg(long)]
        premium_fraction: Option<f64>,

        /// Estimated-spend ceiling in USD (0 disables the meter).
        #[arg(long)]
        cost_ceiling: Option<f64>,

        /// Catalog index URL.
        #[arg(long)]
        catalog_url: Option<String>,

        /// Directory for produced asset files.
        #[arg(long)]
        products_dir: Option<String>,

        /// Completion-ledger file path.
        #[arg(long)]
        ledger: Option<String>,

        /// Asset schema document path.
        #[arg(long)]
        schema: Option<String>,
    },

    /// Audit the product tree against the completion ledger.
    Verify {
        /// Directory holding produced asset files.
        #[arg(long)]
        products_dir: Option<String>,

        /// Completion-ledger file path.
        #[arg(long)]
        ledger: Option<String>,

        /// Asset schema document path.
        #[arg(long)]
        schema: Option<String>,
    },

    /// Probe each configured backend with a single diagnostic call.
    Backends,

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
        0 => "insightforge=info",
        1 => "insightforge=debug",
        _ => "insightforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            cap,
            premium_fraction,
            cost_ceiling,
            catalog_url,
            products_dir,
            ledger,
            schema,
        } => {
            cmd_run(RunOverrides {
                cap,
                premium_fraction,
                cost_ceiling,
                catalog_url,
                products_dir,
                ledger,
                schema,
            })
            .await
        }
        Command::Verify {
            products_dir,
            ledger,
            schema,
        } => cmd_verify(products_dir, ledger, schema).await,
        Command::Backends => cmd_backends().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// CLI overrides for the `run` command (flags > config file > defaults).
struct RunOverrides {
    cap: Option<usize>,
    premium_fraction: Option<f64>,
    cost_ceiling: Option<f64>,
    catalog_url: Option<String>,
    products_dir: Option<String>,
    ledger: Option<String>,
    schema: Option<String>,
}

impl RunOverrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(cap) = self.cap {
            config.run.max_items_per_run = cap;
        }
        if let Some(fraction) = self.premium_fraction {
            config.run.premium_fraction = fraction;
        }
        if let Some(ceiling) = self.cost_ceiling {
            config.run.cost_ceiling_usd = ceiling;
        }
        if let Some(url) = self.catalog_url {
            config.catalog.url = url;
        }
        if let Some(dir) = self.products_dir {
            config.output.products_dir = dir;
        }
        if let Some(path) = self.ledger {
            config.output.ledger_path = path;
        }
        if let Some(path) = self.schema {
            config.output.schema_path = path;
        }
    }
}

async fn cmd_run(overrides: RunOverrides) -> Result<()> {
    let mut config = load_config()?;
    overrides.apply(&mut config);

    // Fatal startup conditions: missing primary key, exceeded ceiling.
    validate_startup(&config)?;

    let generator = build_generator(&config)?;

    let run_config = RunConfig {
        cap: config.run.max_items_per_run,
        premium_fraction: config.run.premium_fraction,
        cost_ceiling_usd: config.run.cost_ceiling_usd,
        ledger_path: PathBuf::from(&config.output.ledger_path),
        products_dir: PathBuf::from(&config.output.products_dir),
        schema_path: PathBuf::from(&config.output.schema_path),
    };

    let catalog = insightforge_catalog::fetch(&config.catalog).await;

    let progress = CliProgress::new();
    let report = pipeline::run(&run_config, &catalog, &generator, &progress).await?;

    print_report(&report);
    Ok(())
}

/// Build the tiered generator from configuration.
///
/// The primary backend is shared between the standard tier and the
/// chain's first stage so its pacing budget covers both roles.
/// Secondary/tertiary providers without keys silently drop out.
fn build_generator(config: &AppConfig) -> Result<Generator> {
    let retry = &config.retry;

    let primary: Arc<dyn Backend> = Arc::new(
        HttpBackend::from_provider(&config.backends.primary, retry).ok_or_else(|| {
            eyre!(
                "primary backend key missing ({} unset)",
                config.backends.primary.api_key_env
            )
        })?,
    );

    let mut chain: Vec<Arc<dyn Backend>> = vec![primary.clone()];
    for provider in [&config.backends.secondary, &config.backends.tertiary] {
        match HttpBackend::from_provider(provider, retry) {
            Some(backend) => chain.push(Arc::new(backend)),
            None => info!(
                backend = %provider.name,
                env = %provider.api_key_env,
                "API key env unset, premium stage disabled"
            ),
        }
    }

    Ok(Generator::new(
        primary,
        chain,
        config.run.refine_max_chars,
    ))
}

fn print_report(report: &RunReport) {
    println!();
    println!("Run {} complete", report.run_id);
    println!(
        "  produced: {} ({} premium, {} standard)",
        report.produced(),
        report.produced_premium,
        report.produced_standard
    );
    println!("  failed:   {}", report.failed);
    if report.skipped_cost > 0 {
        println!(
            "  skipped:  {} (cost ceiling, ~${:.4} spent)",
            report.skipped_cost, report.estimated_cost_usd
        );
    }
    println!("  queued:   {}", report.queued);
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

async fn cmd_verify(
    products_dir: Option<String>,
    ledger: Option<String>,
    schema_path: Option<String>,
) -> Result<()> {
    let config = load_config()?;

    let products_dir = PathBuf::from(products_dir.unwrap_or(config.output.products_dir));
    let ledger_path = PathBuf::from(ledger.unwrap_or(config.output.ledger_path));
    let schema_path = PathBuf::from(schema_path.unwrap_or(config.output.schema_path));

    let completed = insightforge_ledger::load(&ledger_path);
    let schema_doc = schema::load_schema(&schema_path);

    let mut ids: Vec<&String> = completed.iter().collect();
    ids.sort();

    let mut violations: Vec<String> = Vec::new();
    for id in &ids {
        let path = products_dir.join(format!("{id}.json.gz"));
        match gate::read_asset(&path) {
            Ok(value) => {
                if let Err(e) = schema::validate(&schema_doc, &value) {
                    violations.push(format!("{id}: {e}"));
                } else if value.get("item_id").and_then(|v| v.as_str()) != Some(id.as_str()) {
                    violations.push(format!("{id}: asset item_id does not match file name"));
                }
            }
            Err(e) => violations.push(format!("{id}: {e}")),
        }
    }

    println!(
        "audited {} ledgered items against {}",
        ids.len(),
        products_dir.display()
    );

    if violations.is_empty() {
        println!("audit pass: every ledgered item has a valid asset");
        Ok(())
    } else {
        for violation in &violations {
            println!("  ✗ {violation}");
        }
        Err(eyre!("audit failed: {} violation(s)", violations.len()))
    }
}

// ---------------------------------------------------------------------------
// backends
// ---------------------------------------------------------------------------

/// Prompt used for diagnostic probes.
const PROBE_PROMPT: &str = "Reply with the single word: ready.";

async fn cmd_backends() -> Result<()> {
    let config = load_config()?;

    let providers = [
        ("primary", &config.backends.primary),
        ("secondary", &config.backends.secondary),
        ("tertiary", &config.backends.tertiary),
    ];

    for (label, provider) in providers {
        match HttpBackend::from_provider(provider, &config.retry) {
            None => {
                println!(
                    "{label:9} {:12} disabled ({} unset)",
                    provider.name, provider.api_key_env
                );
            }
            Some(backend) => match backend.probe(PROBE_PROMPT).await {
                Ok(_) => println!("{label:9} {:12} reachable", provider.name),
                Err(kind) => println!("{label:9} {:12} failed: {kind}", provider.name),
            },
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress bar adapter
// ---------------------------------------------------------------------------

/// Binds the pipeline's progress callbacks to an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("progress template")
                .progress_chars("##-"),
        );
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.println(format!("→ {name}"));
    }

    fn item_done(&self, item_id: &str, committed: bool, _current: usize, total: usize) {
        if self.bar.length() == Some(0) {
            self.bar.set_length(total as u64);
        }
        let mark = if committed { "✓" } else { "✗" };
        self.bar.set_message(format!("{mark} {item_id}"));
        self.bar.inc(1);
    }

    fn done(&self, _report: &RunReport) {
        self.bar.finish_and_clear();
    }
}
