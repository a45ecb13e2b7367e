//! Run configuration.
//!
//! A [`RunConfig`] is assembled once at startup from an optional JSON file,
//! then environment variables, then CLI overrides, and is passed by
//! reference from there on.

mod credentials;
mod env;

pub use credentials::{
    redact, resolve_credentials, resolve_service_keys, ServiceKeys, StoreCredentials, StoreKind,
    COMPLETION_API_KEY_VAR, HOST_TOKEN_VAR,
};
pub use env::EnvSource;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{PodflowError, PodflowResult};
use crate::pipeline::RetryPolicy;
use crate::sync::{parse_price, PlacementPolicy, SyncVariant};

/// Environment variable naming a JSON config file.
pub const CONFIG_PATH_VAR: &str = "PODFLOW_CONFIG";
/// Environment variable holding the file host base URL.
pub const HOST_URL_VAR: &str = "ASSET_HOST_URL";

/// Settings for the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_completion_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Prompt with a `{name}` placeholder.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    /// Request timeout in seconds.
    #[serde(default = "default_completion_timeout")]
    pub timeout_seconds: f64,
}

fn default_completion_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    600
}

fn default_prompt_template() -> String {
    concat!(
        "Write an Etsy listing for a minimalist sweatshirt printed with the word \"{name}\". ",
        "Respond with a JSON object with the keys \"title\" (under 140 characters), ",
        "\"description\" (two short paragraphs) and \"tags\" (an array of up to 13 ",
        "search tags, each under 20 characters)."
    )
    .to_string()
}

fn default_completion_timeout() -> f64 {
    60.0
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            prompt_template: default_prompt_template(),
            timeout_seconds: default_completion_timeout(),
        }
    }
}

impl CompletionConfig {
    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the prompt template.
    #[must_use]
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// Renders the prompt for one design name.
    #[must_use]
    pub fn render_prompt(&self, name: &str) -> String {
        self.prompt_template.replace("{name}", name)
    }

    /// Gets timeout as Duration.
    ///
    /// Zero, negative, non-finite and out of range values are
    /// [`PodflowError::InvalidInput`].
    pub fn timeout(&self) -> PodflowResult<Duration> {
        let invalid = || {
            PodflowError::invalid_input(format!(
                "completion.timeout_seconds must be a positive number of seconds (got {})",
                self.timeout_seconds
            ))
        };
        let timeout = Duration::try_from_secs_f64(self.timeout_seconds).map_err(|_| invalid())?;
        if timeout.is_zero() {
            return Err(invalid());
        }
        Ok(timeout)
    }
}

/// Settings for the file host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL objects are stored under. Required outside dry runs.
    #[serde(default)]
    pub base_url: String,
    /// Largest file accepted for upload.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_host_timeout")]
    pub timeout_seconds: u64,
}

fn default_max_upload() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_host_timeout() -> u64 {
    120
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            max_upload_bytes: default_max_upload(),
            timeout_seconds: default_host_timeout(),
        }
    }
}

impl HostConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the upload size limit.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Settings for the commerce API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommerceConfig {
    /// API base URL.
    #[serde(default = "default_commerce_url")]
    pub base_url: String,
    /// Retail price applied to every variant.
    #[serde(default = "default_price")]
    pub price: String,
    /// Catalog variant ids to create.
    #[serde(default = "default_variant_ids")]
    pub variant_ids: Vec<u64>,
    /// Design placement.
    #[serde(default)]
    pub placement: PlacementPolicy,
    /// Payload shape. Defaults from the selected store when absent.
    #[serde(default)]
    pub variant: Option<SyncVariant>,
    /// Request timeout in seconds.
    #[serde(default = "default_commerce_timeout")]
    pub timeout_seconds: u64,
}

fn default_commerce_url() -> String {
    "https://api.printful.com".to_string()
}

fn default_price() -> String {
    "34.99".to_string()
}

fn default_variant_ids() -> Vec<u64> {
    vec![4012, 4013, 4014, 4017]
}

fn default_commerce_timeout() -> u64 {
    30
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            base_url: default_commerce_url(),
            price: default_price(),
            variant_ids: default_variant_ids(),
            placement: PlacementPolicy::default(),
            variant: None,
            timeout_seconds: default_commerce_timeout(),
        }
    }
}

impl CommerceConfig {
    /// Sets the price.
    #[must_use]
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    /// Sets the catalog variant ids.
    #[must_use]
    pub fn with_variant_ids(mut self, ids: Vec<u64>) -> Self {
        self.variant_ids = ids;
        self
    }

    /// Payload shape for `store`, unless overridden.
    #[must_use]
    pub fn variant_for(&self, store: StoreKind) -> SyncVariant {
        self.variant.unwrap_or(match store {
            StoreKind::Manual => SyncVariant::Printful,
            StoreKind::Etsy => SyncVariant::EtsyLinked,
        })
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Everything a run needs besides secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Store to sync into.
    #[serde(default)]
    pub store: StoreKind,
    /// Retry policy shared by every remote call.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Directory holding `<NAME>.png` designs and `mockups/`.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Directory the result log is written to.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Replace every remote collaborator with placeholders.
    #[serde(default)]
    pub dry_run: bool,
    /// Completion endpoint settings.
    #[serde(default)]
    pub completion: CompletionConfig,
    /// File host settings.
    #[serde(default)]
    pub host: HostConfig,
    /// Commerce API settings.
    #[serde(default)]
    pub commerce: CommerceConfig,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            retry: RetryPolicy::default(),
            assets_dir: default_assets_dir(),
            results_dir: default_results_dir(),
            dry_run: false,
            completion: CompletionConfig::default(),
            host: HostConfig::default(),
            commerce: CommerceConfig::default(),
        }
    }
}

impl RunConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> PodflowResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PodflowError::invalid_input(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            PodflowError::invalid_input(format!("invalid config {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Loads the file named by `path`, or by `PODFLOW_CONFIG`, or defaults,
    /// then applies environment overrides.
    pub fn resolve(path: Option<&Path>, env: &EnvSource) -> PodflowResult<Self> {
        let from_env = env.get(CONFIG_PATH_VAR).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Overrides fields from environment variables.
    pub fn apply_env(&mut self, env: &EnvSource) -> PodflowResult<()> {
        if let Some(store) = env.get("PODFLOW_STORE") {
            self.store = store.parse()?;
        }
        if let Some(dir) = env.get("PODFLOW_ASSETS_DIR") {
            self.assets_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env.get("PODFLOW_RESULTS_DIR") {
            self.results_dir = PathBuf::from(dir);
        }
        if let Some(value) = env.get("PODFLOW_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_number("PODFLOW_MAX_ATTEMPTS", value)?;
        }
        if let Some(value) = env.get("PODFLOW_INITIAL_DELAY_MS") {
            self.retry.initial_delay_ms = parse_number("PODFLOW_INITIAL_DELAY_MS", value)?;
        }
        if let Some(url) = env.get("OPENAI_BASE_URL") {
            self.completion.base_url = url.to_string();
        }
        if let Some(model) = env.get("OPENAI_MODEL") {
            self.completion.model = model.to_string();
        }
        if let Some(url) = env.get(HOST_URL_VAR) {
            self.host.base_url = url.to_string();
        }
        if let Some(url) = env.get("PRINTFUL_BASE_URL") {
            self.commerce.base_url = url.to_string();
        }
        if let Some(price) = env.get("PODFLOW_PRICE") {
            self.commerce.price = price.to_string();
        }
        if let Some(ids) = env.get("PRINTFUL_VARIANT_IDS") {
            self.commerce.variant_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_number("PRINTFUL_VARIANT_IDS", s))
                .collect::<PodflowResult<_>>()?;
        }
        Ok(())
    }

    /// Checks the configuration before any unit starts.
    ///
    /// Every failure here is run-level.
    pub fn validate(&self) -> PodflowResult<()> {
        self.retry.validate()?;
        parse_price(&self.commerce.price)?;
        self.commerce.placement.validate()?;
        if self.commerce.variant_ids.is_empty() {
            return Err(PodflowError::invalid_input(
                "at least one catalog variant id must be configured",
            ));
        }
        if self.host.max_upload_bytes == 0 {
            return Err(PodflowError::invalid_input("max_upload_bytes must be positive"));
        }
        self.completion.timeout()?;
        if !self.completion.prompt_template.contains("{name}") {
            return Err(PodflowError::invalid_input(
                "prompt_template must contain a {name} placeholder",
            ));
        }
        if !self.dry_run && self.host.base_url.trim().is_empty() {
            return Err(PodflowError::missing_credentials(HOST_URL_VAR));
        }
        Ok(())
    }

    /// Payload shape for the selected store.
    #[must_use]
    pub fn sync_variant(&self) -> SyncVariant {
        self.commerce.variant_for(self.store)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> PodflowResult<T> {
    value
        .parse()
        .map_err(|_| PodflowError::invalid_input(format!("{key} must be a number (got '{value}')")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.store, StoreKind::Manual);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.host.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.commerce.base_url, "https://api.printful.com");
        assert_eq!(config.sync_variant(), SyncVariant::Printful);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"store": "etsy", "retry": {"max_attempts": 5}, "commerce": {"price": "40"}}"#,
        )
        .unwrap();
        assert_eq!(config.store, StoreKind::Etsy);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.commerce.price, "40");
        assert_eq!(config.commerce.variant_ids, default_variant_ids());
        assert_eq!(config.sync_variant(), SyncVariant::EtsyLinked);
    }

    #[test]
    fn test_load_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"results_dir": "out", "commerce": {{"price": "20"}}}}"#).unwrap();

        let env = EnvSource::from_pairs([
            ("PODFLOW_PRICE", "25.5"),
            ("PRINTFUL_VARIANT_IDS", "1, 2,3"),
            ("ASSET_HOST_URL", "https://files.test"),
        ]);
        let config = RunConfig::resolve(Some(file.path()), &env).unwrap();

        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.commerce.price, "25.5");
        assert_eq!(config.commerce.variant_ids, vec![1, 2, 3]);
        assert_eq!(config.host.base_url, "https://files.test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_number_is_invalid_input() {
        let mut config = RunConfig::default();
        let env = EnvSource::from_pairs([("PODFLOW_MAX_ATTEMPTS", "many")]);
        let err = config.apply_env(&env).unwrap_err();
        assert!(matches!(err, PodflowError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_config_file() {
        let err = RunConfig::load(Path::new("/nonexistent/podflow.json")).unwrap_err();
        assert!(err.is_run_level());
    }

    #[test]
    fn test_validate() {
        let mut config = RunConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PodflowError::MissingCredentials { ref key } if key == HOST_URL_VAR));

        config.dry_run = true;
        assert!(config.validate().is_ok());

        config.commerce.price = "free".into();
        assert!(config.validate().is_err());

        config.commerce.price = "10".into();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        config.retry.max_attempts = 1;
        config.completion.prompt_template = "no placeholder".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_completion_timeout_fails_validation() {
        let mut config: RunConfig =
            serde_json::from_str(r#"{"dry_run": true, "completion": {"timeout_seconds": -1}}"#)
                .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
        assert!(err.is_run_level());

        config.completion.timeout_seconds = 2.5;
        assert_eq!(config.completion.timeout().unwrap(), Duration::from_millis(2500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_render_prompt() {
        let completion = CompletionConfig::default().with_prompt_template("Copy for {name}!");
        assert_eq!(completion.render_prompt("TACO"), "Copy for TACO!");
    }
}
