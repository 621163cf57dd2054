//! TOML configuration.
//!
//! Every section is optional, so an empty file (or no file at all) yields a
//! working configuration that reads notebook ids from the environment the
//! same way a `.env` deployment does.
//!
//! ```toml
//! [engine]
//! command = "nlm"
//! query_timeout_secs = 60
//!
//! [research]
//! poll_interval_ms = 3000
//! fast_timeout_secs = 60
//! deep_timeout_secs = 120
//!
//! [classifier]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//! api_key_env = "GEMINI_API_KEY"
//!
//! [answer]
//! language_directive = "Trả lời bằng Tiếng Việt."
//!
//! [notebooks]
//! EXEOL_OPA = "3f1c0d9e-…"
//! COMPETITOR = "${COMPETITOR_NOTEBOOKS}"
//! ```

use anyhow::{bail, Context, Result};
use notebook_router_core::category::Category;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    /// Raw notebook values keyed by category label.
    #[serde(default)]
    pub notebooks: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_source_add_timeout")]
    pub source_add_timeout_secs: u64,
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,
    #[serde(default = "default_research_call_timeout")]
    pub research_call_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            query_timeout_secs: default_query_timeout(),
            source_add_timeout_secs: default_source_add_timeout(),
            list_timeout_secs: default_list_timeout(),
            research_call_timeout_secs: default_research_call_timeout(),
        }
    }
}

fn default_command() -> String {
    "nlm".to_string()
}
fn default_query_timeout() -> u64 {
    60
}
fn default_source_add_timeout() -> u64 {
    120
}
fn default_list_timeout() -> u64 {
    30
}
fn default_research_call_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_fast_timeout")]
    pub fast_timeout_secs: u64,
    #[serde(default = "default_deep_timeout")]
    pub deep_timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            fast_timeout_secs: default_fast_timeout(),
            deep_timeout_secs: default_deep_timeout(),
        }
    }
}

impl ResearchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    3000
}
fn default_fast_timeout() -> u64 {
    60
}
fn default_deep_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

impl ClassifierConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_classifier_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Instruction prepended to every question sent to a notebook.
    #[serde(default = "default_language_directive")]
    pub language_directive: String,
    /// Print diagnostic detail alongside user-facing errors.
    #[serde(default)]
    pub dev_mode: bool,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            language_directive: default_language_directive(),
            dev_mode: false,
        }
    }
}

fn default_language_directive() -> String {
    "Trả lời bằng Tiếng Việt.".to_string()
}

impl Config {
    /// Raw notebook value for `category`, before comma handling.
    ///
    /// The `[notebooks]` table wins; otherwise `NOTEBOOK_ID_<LABEL>` is read
    /// from the environment. `UNKNOWN` reads the `GENERAL` slot.
    pub fn notebook_value(&self, category: Category) -> Option<String> {
        let source = category.binding_source();
        match self.notebooks.get(source.label()) {
            Some(value) => Some(expand_env_vars(value)),
            None => std::env::var(source.env_key()).ok(),
        }
    }
}

/// Config path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/nbr.toml";

/// Load `path`, or the default path when `None`.
///
/// A missing default file yields the built-in defaults; an explicitly named
/// file must exist.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check the invariants `serde` cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.engine.command.trim().is_empty() {
        bail!("engine.command must not be empty");
    }

    let timeouts = [
        ("engine.query_timeout_secs", config.engine.query_timeout_secs),
        (
            "engine.source_add_timeout_secs",
            config.engine.source_add_timeout_secs,
        ),
        ("engine.list_timeout_secs", config.engine.list_timeout_secs),
        (
            "engine.research_call_timeout_secs",
            config.engine.research_call_timeout_secs,
        ),
        ("research.poll_interval_ms", config.research.poll_interval_ms),
        ("research.fast_timeout_secs", config.research.fast_timeout_secs),
        ("research.deep_timeout_secs", config.research.deep_timeout_secs),
        ("classifier.timeout_secs", config.classifier.timeout_secs),
    ];
    for (key, value) in timeouts {
        if value == 0 {
            bail!("{} must be > 0", key);
        }
    }

    match config.classifier.provider.as_str() {
        "gemini" | "disabled" => {}
        other => bail!(
            "Unknown classifier provider: '{}'. Must be gemini or disabled.",
            other
        ),
    }

    for key in config.notebooks.keys() {
        match key.parse::<Category>() {
            Ok(Category::Unknown) => {
                bail!("notebooks.UNKNOWN cannot be set; it always uses notebooks.GENERAL")
            }
            Ok(_) => {}
            Err(e) => bail!("notebooks: {}", e),
        }
    }

    Ok(())
}

/// Expand `${VAR_NAME}` patterns from the process environment.
///
/// Unset variables expand to the empty string. Substituted values are copied
/// through verbatim and never expanded again.
pub fn expand_env_vars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let end = match rest[start..].find('}') {
            Some(pos) => start + pos,
            None => break,
        };
        out.push_str(&rest[..start]);
        let var_name = &rest[start + 2..end];
        out.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    out
}
