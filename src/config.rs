//! Configuration loading and management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Directory holding local configuration and checkpoints
pub const APP_DIR: &str = ".meeting-reporter";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Text generator settings
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Checkpoint persistence settings
    #[serde(default)]
    pub checkpoints: CheckpointConfig,

    /// Article defaults
    #[serde(default)]
    pub article: ArticleConfig,

    /// Source fetching settings
    #[serde(default)]
    pub source: SourceConfig,
}

impl Config {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(|| {
            // Try .meeting-reporter/config.toml in current directory
            let local = PathBuf::from(APP_DIR).join("config.toml");
            if local.exists() {
                return Some(local);
            }

            // Try ~/.meeting-reporter/config.toml
            dirs::home_dir().map(|h| h.join(APP_DIR).join("config.toml"))
        });

        match config_path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(&p)?;
                let config: Config = toml::from_str(&content)?;
                config.validate()?;
                Ok(config)
            }
            Some(p) if path.is_some() => Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            ))),
            _ => Ok(Config::default()),
        }
    }

    /// Reject values that would only fail later, mid-run
    pub fn validate(&self) -> Result<()> {
        let words = self.article.words;
        if !(ArticleConfig::MIN_WORDS..=ArticleConfig::MAX_WORDS).contains(&words) {
            return Err(Error::Config(format!(
                "article.words must be between {} and {}, got {}",
                ArticleConfig::MIN_WORDS,
                ArticleConfig::MAX_WORDS,
                words
            )));
        }
        for (name, t) in [
            ("writer_temperature", self.generator.writer_temperature),
            ("critique_temperature", self.generator.critique_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::Config(format!(
                    "generator.{} must be between 0 and 2, got {}",
                    name, t
                )));
            }
        }
        Ok(())
    }

    /// Checkpoint directory with `~` and environment variables expanded
    pub fn checkpoint_dir(&self) -> PathBuf {
        let raw = self.checkpoints.directory.to_string_lossy().into_owned();
        match shellexpand::full(&raw) {
            Ok(expanded) => PathBuf::from(expanded.into_owned()),
            Err(_) => self.checkpoints.directory.clone(),
        }
    }
}

/// OpenAI-compatible chat completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key (falls back to OPENAI_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for outlining, writing and quote repair
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for the editorial critique
    #[serde(default = "default_critique_model")]
    pub critique_model: String,

    /// Sampling temperature for outlining and writing
    #[serde(default = "default_writer_temperature")]
    pub writer_temperature: f32,

    /// Sampling temperature for the critique
    #[serde(default = "default_critique_temperature")]
    pub critique_temperature: f32,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Extra attempts after a transport failure or 5xx response
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First wait before a retry, doubled on each further attempt
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "chatgpt-4o-latest".to_string()
}

fn default_critique_model() -> String {
    "gpt-4o".to_string()
}

fn default_writer_temperature() -> f32 {
    0.5
}

fn default_critique_temperature() -> f32 {
    1.0
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            critique_model: default_critique_model(),
            writer_temperature: default_writer_temperature(),
            critique_temperature: default_critique_temperature(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

/// Checkpoint persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding one checkpoint file per thread
    #[serde(default = "default_checkpoint_dir")]
    pub directory: PathBuf,
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(APP_DIR).join("checkpoints")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: default_checkpoint_dir(),
        }
    }
}

/// Article defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleConfig {
    /// Article length used when the intake form does not say
    #[serde(default = "default_words")]
    pub words: u32,
}

impl ArticleConfig {
    pub const MIN_WORDS: u32 = 500;
    pub const MAX_WORDS: u32 = 4000;
}

fn default_words() -> u32 {
    1000
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            words: default_words(),
        }
    }
}

/// Source fetching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Timeout for fetching a source URL
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

/// Initialize .meeting-reporter directory
pub fn init() -> Result<PathBuf> {
    let app_dir = PathBuf::from(APP_DIR);

    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }

    let checkpoints_dir = default_checkpoint_dir();
    if !checkpoints_dir.exists() {
        std::fs::create_dir_all(&checkpoints_dir)?;
    }

    // Create default config if it doesn't exist
    let config_path = app_dir.join("config.toml");
    if !config_path.exists() {
        let default_config = Config::default();
        let config_str = toml::to_string_pretty(&default_config)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&config_path, config_str)?;
    }

    Ok(config_path)
}

// Durations are written as humantime strings such as "90s" or "2m"
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.article.words, 1000);
        assert_eq!(config.generator.timeout, Duration::from_secs(120));
        assert_eq!(config.generator.retry_delay, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [generator]
            model = "gpt-4o-mini"
            timeout = "90s"
            retry_delay = "250ms"

            [article]
            words = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.generator.model, "gpt-4o-mini");
        assert_eq!(config.generator.timeout, Duration::from_secs(90));
        assert_eq!(config.generator.retry_delay, Duration::from_millis(250));
        assert_eq!(config.generator.critique_model, "gpt-4o");
        assert_eq!(config.article.words, 1500);
        assert_eq!(config.source.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_word_count() {
        let mut config = Config::default();
        config.article.words = 100;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.generator.timeout, config.generator.timeout);
        assert_eq!(back.checkpoints.directory, config.checkpoints.directory);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[checkpoints]\ndirectory = \"/tmp/reporter\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.checkpoint_dir(), PathBuf::from("/tmp/reporter"));
    }
}
