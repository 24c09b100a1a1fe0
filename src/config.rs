use anyhow::{bail, Result};
use config::{Config, Environment, File};
use governor::Quota;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the RepoFlow client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RepoFlowConfig {
    /// Backend connection settings
    pub backend: BackendConfig,
    /// Readiness polling cadence
    pub polling: PollingConfig,
    /// Outbound request rate limiting
    pub rate_limit: RateLimitConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base address of the RepoFlow API
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Delay between readiness probes
    pub interval_ms: u64,
    /// Issue the first probe as soon as a polling stage is entered
    pub probe_immediately: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON logs instead of human-readable ones
    pub json_logs: bool,
}

impl Default for RepoFlowConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                user_agent: format!("repoflow/{}", env!("CARGO_PKG_VERSION")),
            },
            polling: PollingConfig {
                interval_ms: 3000,
                probe_immediately: true,
            },
            rate_limit: RateLimitConfig {
                requests_per_second: 5,
                burst_capacity: 10,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl RateLimitConfig {
    pub fn quota(&self) -> Result<Quota> {
        let (Some(rate), Some(burst)) = (
            NonZeroU32::new(self.requests_per_second),
            NonZeroU32::new(self.burst_capacity),
        ) else {
            bail!("rate_limit.requests_per_second and rate_limit.burst_capacity must be non-zero");
        };
        Ok(Quota::per_second(rate).allow_burst(burst))
    }
}

impl RepoFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (repoflow.toml, .repoflow-rc)
    /// 3. Environment variables (e.g. REPOFLOW_POLLING__INTERVAL_MS)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("repoflow.toml").exists() {
            builder = builder.add_source(File::with_name("repoflow"));
        }

        if Path::new(".repoflow-rc").exists() {
            builder = builder
                .add_source(File::with_name(".repoflow-rc").format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("REPOFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: RepoFlowConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single TOML file layered over the defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: RepoFlowConfig = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path.as_ref()).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            bail!("backend.base_url must not be empty");
        }
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        self.rate_limit.quota()?;
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<RepoFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = RepoFlowConfig::load_env_file();
        RepoFlowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static RepoFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RepoFlowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.polling.interval(), Duration::from_millis(3000));
        assert!(config.polling.probe_immediately);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = RepoFlowConfig::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let mut config = RepoFlowConfig::default();
        config.rate_limit.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repoflow.toml");
        std::fs::write(
            &path,
            "[polling]\ninterval_ms = 5000\nprobe_immediately = false\n",
        )
        .unwrap();

        let config = RepoFlowConfig::load_from_file(&path).unwrap();
        assert_eq!(config.polling.interval_ms, 5000);
        assert!(!config.polling.probe_immediately);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = RepoFlowConfig::default();
        config.backend.base_url = "http://backend.internal:9000".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = RepoFlowConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
