//! Application configuration for insightforge.
//!
//! User config lives at `~/.insightforge/insightforge.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored, only the name of the env var holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InsightForgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "insightforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".insightforge";

// ---------------------------------------------------------------------------
// Config structs (matching insightforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-run knobs.
    #[serde(default)]
    pub run: RunKnobs,

    /// Catalog source settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Backend retry/backoff policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Backend providers.
    #[serde(default)]
    pub backends: BackendsConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunKnobs {
    /// Hard cap on items selected per run.
    #[serde(default = "default_max_items")]
    pub max_items_per_run: usize,

    /// Fraction of the queue assigned the premium tier.
    #[serde(default = "default_premium_fraction")]
    pub premium_fraction: f64,

    /// Estimated-spend ceiling per run in USD. With all-free providers
    /// the meter never accrues and the ceiling is inert.
    #[serde(default)]
    pub cost_ceiling_usd: f64,

    /// Character budget handed to refine stages of the premium chain.
    #[serde(default = "default_refine_max_chars")]
    pub refine_max_chars: usize,
}

impl Default for RunKnobs {
    fn default() -> Self {
        Self {
            max_items_per_run: default_max_items(),
            premium_fraction: default_premium_fraction(),
            cost_ceiling_usd: 0.0,
            refine_max_chars: default_refine_max_chars(),
        }
    }
}

fn default_max_items() -> usize {
    200
}
fn default_premium_fraction() -> f64 {
    0.2
}
fn default_refine_max_chars() -> usize {
    280
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// URL of the delimited catalog index.
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Fetch timeout in seconds.
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://www.gutenberg.org/cache/epub/feeds/pg_catalog.csv".into()
}
fn default_catalog_timeout() -> u64 {
    30
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per backend call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_factor() -> f64 {
    2.0
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for produced asset files (`<id>.json.gz`).
    #[serde(default = "default_products_dir")]
    pub products_dir: String,

    /// Path of the completion-ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Path of the asset schema document.
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            products_dir: default_products_dir(),
            ledger_path: default_ledger_path(),
            schema_path: default_schema_path(),
        }
    }
}

fn default_products_dir() -> String {
    "products".into()
}
fn default_ledger_path() -> String {
    "state/ledger.json".into()
}
fn default_schema_path() -> String {
    "schema.json".into()
}

// ---------------------------------------------------------------------------
// Backend providers
// ---------------------------------------------------------------------------

/// Wire format spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderFlavor {
    /// `POST .../models/{model}:generateContent?key=...` style.
    Generative,
    /// `POST .../chat/completions` with a bearer token.
    ChatCompletions,
}

/// One LLM provider entry (`[backends.primary]` etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Short provider label used in logs and reports.
    pub name: String,

    /// Wire format.
    pub flavor: ProviderFlavor,

    /// API base URL (no trailing slash).
    pub endpoint: String,

    /// Model identifier sent to the provider.
    pub model: String,

    /// Name of the env var holding the API key (never the key itself).
    pub api_key_env: String,

    /// Sustained request budget; pacing enforces `60_000 / rpm` ms
    /// between calls.
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,

    /// Estimated cost per call, 0.0 for free tiers.
    #[serde(default)]
    pub cost_per_call_usd: f64,
}

fn default_rpm() -> u32 {
    15
}

impl ProviderConfig {
    /// Read this provider's API key from the environment.
    /// Returns `None` when the env var is unset or empty.
    pub fn api_key(&self) -> Option<String> {
        match std::env::var(&self.api_key_env) {
            Ok(val) if !val.is_empty() => Some(val),
            _ => None,
        }
    }
}

/// `[backends]` section. The primary provider is mandatory at startup;
/// secondary/tertiary silently drop out of the premium chain when their
/// key env vars are unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "default_primary")]
    pub primary: ProviderConfig,

    #[serde(default = "default_secondary")]
    pub secondary: ProviderConfig,

    #[serde(default = "default_tertiary")]
    pub tertiary: ProviderConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            tertiary: default_tertiary(),
        }
    }
}

fn default_primary() -> ProviderConfig {
    ProviderConfig {
        name: "gemini".into(),
        flavor: ProviderFlavor::Generative,
        endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
        model: "gemini-1.5-flash".into(),
        api_key_env: "GEMINI_API_KEY".into(),
        requests_per_minute: 15,
        cost_per_call_usd: 0.0,
    }
}

fn default_secondary() -> ProviderConfig {
    ProviderConfig {
        name: "groq".into(),
        flavor: ProviderFlavor::ChatCompletions,
        endpoint: "https://api.groq.com/openai/v1".into(),
        model: "llama-3.1-70b-versatile".into(),
        api_key_env: "GROQ_API_KEY".into(),
        requests_per_minute: 30,
        cost_per_call_usd: 0.0,
    }
}

fn default_tertiary() -> ProviderConfig {
    ProviderConfig {
        name: "cerebras".into(),
        flavor: ProviderFlavor::ChatCompletions,
        endpoint: "https://api.cerebras.ai/v1".into(),
        model: "llama3.1-8b".into(),
        api_key_env: "CEREBRAS_API_KEY".into(),
        requests_per_minute: 30,
        cost_per_call_usd: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.insightforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InsightForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.insightforge/insightforge.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| InsightForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        InsightForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InsightForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InsightForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InsightForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check the fatal startup conditions before any work happens:
/// the primary provider's API key must be present, and a paid backend
/// configuration must come with a positive cost ceiling.
pub fn validate_startup(config: &AppConfig) -> Result<()> {
    let primary = &config.backends.primary;
    if primary.api_key().is_none() {
        return Err(InsightForgeError::config(format!(
            "primary backend API key not found. Set the {} environment variable.",
            primary.api_key_env
        )));
    }

    let any_paid = [
        &config.backends.primary,
        &config.backends.secondary,
        &config.backends.tertiary,
    ]
    .iter()
    .any(|p| p.cost_per_call_usd > 0.0);

    if any_paid && config.run.cost_ceiling_usd <= 0.0 {
        return Err(InsightForgeError::config(
            "paid backend configured with a zero cost ceiling; \
             the ceiling is already exceeded before any work. \
             Set run.cost_ceiling_usd or use free-tier providers.",
        ));
    }

    Ok(())
}
