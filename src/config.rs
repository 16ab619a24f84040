//! Configuration management for the DSK controller
//!
//! Loads the JSON configuration file (`SWITCHER_IP`, `FLASK_HOST`, ...) and
//! the controller timings. A missing file is a fatal startup error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    /// Switcher address
    #[serde(rename = "SWITCHER_IP", default = "default_switcher_ip")]
    pub switcher_ip: String,
    /// Bind address of the web front end
    #[serde(rename = "FLASK_HOST", default = "default_web_host")]
    pub web_host: String,
    #[serde(rename = "WEB_PORT", default = "default_web_port")]
    pub web_port: u16,
    #[serde(default)]
    pub timings: Timings,
}

/// Controller cadences, all in milliseconds
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// Connection monitor poll cadence
    pub poll_interval_ms: u64,
    /// Wait after each connect attempt
    pub reconnect_delay_ms: u64,
    /// Delay between re-reading tie and writing the flipped value
    pub tie_settle_ms: u64,
    /// Delay between executing the auto keyer and re-reading on-air
    pub auto_key_settle_ms: u64,
    pub smart_tie_poll_ms: u64,
    /// How long a program change must hold before smart tie releases
    pub smart_tie_confirm_ms: u64,
    /// Auto tie releases this long after arming
    pub auto_tie_duration_ms: u64,
    /// Desktop status refresh cadence
    pub status_refresh_ms: u64,
    /// Repeats of the smart tie key inside this window are ignored
    pub smart_tie_debounce_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            reconnect_delay_ms: 1000,
            tie_settle_ms: 50,
            auto_key_settle_ms: 200,
            smart_tie_poll_ms: 50,
            smart_tie_confirm_ms: 200,
            auto_tie_duration_ms: 10_000,
            status_refresh_ms: 500,
            smart_tie_debounce_ms: 500,
        }
    }
}

impl Timings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn tie_settle(&self) -> Duration {
        Duration::from_millis(self.tie_settle_ms)
    }

    pub fn auto_key_settle(&self) -> Duration {
        Duration::from_millis(self.auto_key_settle_ms)
    }

    pub fn smart_tie_poll(&self) -> Duration {
        Duration::from_millis(self.smart_tie_poll_ms)
    }

    pub fn smart_tie_confirm(&self) -> Duration {
        Duration::from_millis(self.smart_tie_confirm_ms)
    }

    pub fn auto_tie_duration(&self) -> Duration {
        Duration::from_millis(self.auto_tie_duration_ms)
    }

    pub fn status_refresh(&self) -> Duration {
        Duration::from_millis(self.status_refresh_ms)
    }

    pub fn smart_tie_debounce(&self) -> Duration {
        Duration::from_millis(self.smart_tie_debounce_ms)
    }

    fn validate(&self) -> Result<()> {
        let intervals = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
            ("smart_tie_poll_ms", self.smart_tie_poll_ms),
            ("auto_tie_duration_ms", self.auto_tie_duration_ms),
            ("status_refresh_ms", self.status_refresh_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                anyhow::bail!("timings.{} must be greater than zero", name);
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            switcher_ip: default_switcher_ip(),
            web_host: default_web_host(),
            web_port: default_web_port(),
            timings: Timings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            anyhow::bail!("{} not found!", path);
        }

        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.switcher_ip.trim().is_empty() {
            anyhow::bail!("SWITCHER_IP cannot be empty");
        }
        if self.web_host.trim().is_empty() {
            anyhow::bail!("FLASK_HOST cannot be empty");
        }
        self.timings.validate()
    }

    /// `host:port` the web server binds to
    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }
}

// Default value functions
fn default_switcher_ip() -> String { "172.20.17.17".to_string() }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn load_str(contents: &str) -> Result<AppConfig> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, contents)?;
        AppConfig::load(&path.to_string_lossy()).await
    }

    #[tokio::test]
    async fn test_load_full_config() -> Result<()> {
        let config = load_str(
            r#"{
                "SWITCHER_IP": "10.1.1.20",
                "FLASK_HOST": "0.0.0.0",
                "WEB_PORT": 8080,
                "timings": { "auto_tie_duration_ms": 5000 }
            }"#,
        )
        .await?;

        assert_eq!(config.switcher_ip, "10.1.1.20");
        assert_eq!(config.web_addr(), "0.0.0.0:8080");
        assert_eq!(config.timings.auto_tie_duration(), Duration::from_secs(5));
        // Unspecified timings keep their defaults
        assert_eq!(config.timings.tie_settle_ms, 50);
        Ok(())
    }

    #[tokio::test]
    async fn test_defaults_for_missing_keys() -> Result<()> {
        let config = load_str("{}").await?;
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.web_addr(), "127.0.0.1:5000");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let err = AppConfig::load(&path.to_string_lossy()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_json_rejected() {
        assert!(load_str("{ SWITCHER_IP: ").await.is_err());
    }

    #[tokio::test]
    async fn test_validation() {
        assert!(load_str(r#"{ "SWITCHER_IP": "  " }"#).await.is_err());
        assert!(load_str(r#"{ "timings": { "poll_interval_ms": 0 } }"#).await.is_err());
    }
}
