use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables that override file settings
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_API_KEY_ALT: &str = "TRANSCRIPTOR_LLM_API_KEY";
pub const ENV_CACHE_TTL: &str = "CACHE_TTL";

/// Longest accepted cache lifetime
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;
pub const ENV_APP_ENV: &str = "APP_ENV";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Transcript provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Generative-text service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Result cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Language requested when a request names none
    pub default_language: String,

    /// Try the alternative provider first
    pub prefer_alternative: bool,

    /// Register the alternative (watch page) provider at all
    pub enable_alternative: bool,

    /// Per-request timeout for upstream transcript sources
    pub request_timeout_secs: u64,

    /// User agent sent to upstream transcript sources
    pub user_agent: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            prefer_alternative: false,
            enable_alternative: true,
            request_timeout_secs: 15,
            user_agent: concat!("transcript-composer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub base_url: String,

    /// Model name
    pub model: String,

    /// API key; usually supplied through the environment
    pub api_key: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Timeout for a single generation request
    pub timeout_secs: u64,

    /// Segments sent per refinement request
    pub refine_batch_size: usize,

    /// Minimum transcript characters needed to compose an article
    pub min_article_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            temperature: 0.3,
            timeout_secs: 30,
            refine_batch_size: 15,
            min_article_input_chars: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached response
    pub ttl_secs: u64,

    /// Interval between sweeps of expired entries
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => anyhow::bail!("Unknown environment: {}", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Production hides internal error details from responses
    pub environment: Environment,
}

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config_path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else if explicit_path.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            config
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file without touching the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-composer").join("config.yaml"))
    }

    /// Apply overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).or_else(|| lookup(ENV_API_KEY_ALT)) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key.trim().to_string());
            }
        }

        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            self.cache.ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_CACHE_TTL))?;
        }

        if let Some(env) = lookup(ENV_APP_ENV) {
            self.app.environment = env.parse()?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be greater than zero");
        }
        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            anyhow::bail!(
                "cache.ttl_secs must be at most {} (one year)",
                MAX_CACHE_TTL_SECS
            );
        }
        if self.cache.sweep_interval_secs == 0 {
            anyhow::bail!("cache.sweep_interval_secs must be greater than zero");
        }
        if self.cache.sweep_interval_secs > MAX_CACHE_TTL_SECS {
            anyhow::bail!(
                "cache.sweep_interval_secs must be at most {}",
                MAX_CACHE_TTL_SECS
            );
        }
        if self.llm.refine_batch_size == 0 {
            anyhow::bail!("llm.refine_batch_size must be greater than zero");
        }
        if self.llm.base_url.trim().is_empty() {
            anyhow::bail!("llm.base_url must be configured");
        }
        if self.providers.request_timeout_secs == 0 {
            anyhow::bail!("providers.request_timeout_secs must be greater than zero");
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Default Language: {}", self.providers.default_language);
        println!("  Prefer Alternative: {}", self.providers.prefer_alternative);
        println!("  Alternative Enabled: {}", self.providers.enable_alternative);
        println!("  Provider Timeout: {}s", self.providers.request_timeout_secs);
        println!("  LLM Endpoint: {}", self.llm.base_url);
        println!("  LLM Model: {}", self.llm.model);
        println!("  LLM API Key: {}", self.masked_api_key());
        println!("  Cache TTL: {}s", self.cache.ttl_secs);
        println!("  Cache Sweep: {}s", self.cache.sweep_interval_secs);
        println!("  Environment: {:?}", self.app.environment);
    }

    fn masked_api_key(&self) -> String {
        match self.llm.api_key.as_deref() {
            None | Some("") => "(not set)".to_string(),
            Some(key) => {
                let chars: Vec<char> = key.chars().collect();
                if chars.len() <= 4 {
                    "****".to_string()
                } else {
                    let tail: String = chars[chars.len() - 4..].iter().collect();
                    format!("****{}", tail)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.sweep_interval_secs, 120);
        assert_eq!(config.llm.refine_batch_size, 15);
        assert_eq!(config.llm.timeout_secs, 30);
        assert!(config.providers.enable_alternative);
        assert!(!config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("cache:\n  ttl_secs: 60\n").unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.sweep_interval_secs, 120);
        assert_eq!(config.providers.default_language, "en");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup_from(&[
                (ENV_API_KEY, "secret-key-1234"),
                (ENV_CACHE_TTL, "90"),
                (ENV_APP_ENV, "production"),
            ]))
            .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("secret-key-1234"));
        assert_eq!(config.cache.ttl_secs, 90);
        assert!(config.is_production());
        assert_eq!(config.masked_api_key(), "****1234");
    }

    #[test]
    fn test_alternate_key_variable() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup_from(&[(ENV_API_KEY_ALT, "abc")]))
            .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_ttl_override() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(lookup_from(&[(ENV_CACHE_TTL, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_ttl() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup_from(&[(ENV_CACHE_TTL, "18446744073709551615")]))
            .unwrap();
        assert_eq!(config.cache.ttl_secs, u64::MAX);
        assert!(config.validate().is_err());

        config.cache.ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());

        config.cache.sweep_interval_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.providers.default_language = "de".into();
        config.save(&path).await.unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.providers.default_language, "de");
    }

    #[tokio::test]
    async fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("absent.yaml"))).await;
        assert!(result.is_err());
    }
}
