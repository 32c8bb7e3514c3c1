use crate::error::{Result, StoryboardError};
use clap::Args;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection settings for the hosted model service.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// API key for the model service (falls back to API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the generateContent API
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Model used for script analysis and chat
    #[arg(long, env = "STORYBOARD_TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL, global = true)]
    pub text_model: String,

    /// Model used for storyboard frames
    #[arg(long, env = "STORYBOARD_IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL, global = true)]
    pub image_model: String,

    /// HTTP timeout for a single model call, in seconds
    #[arg(long, env = "STORYBOARD_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// The explicit key, or `API_KEY` from the environment. Blank values count as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key_or(std::env::var("API_KEY").ok())
    }

    fn api_key_or(&self, fallback: Option<String>) -> Option<String> {
        fn non_blank(key: &str) -> Option<String> {
            let key = key.trim();
            (!key.is_empty()).then(|| key.to_string())
        }

        self.api_key
            .as_deref()
            .and_then(non_blank)
            .or_else(|| fallback.as_deref().and_then(non_blank))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(StoryboardError::ConfigError("base url must not be empty".into()));
        }
        if self.text_model.trim().is_empty() || self.image_model.trim().is_empty() {
            return Err(StoryboardError::ConfigError("model names must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(StoryboardError::ConfigError("timeout must be at least one second".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn blank_explicit_key_falls_back() {
        let config = Config {
            api_key: Some("   ".into()),
            ..Config::default()
        };
        assert_eq!(config.api_key_or(None), None);
        assert_eq!(config.api_key_or(Some(" ".into())), None);
        assert_eq!(
            config.api_key_or(Some(" from-env ".into())).as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn explicit_key_wins_over_fallback() {
        let config = Config {
            api_key: Some("explicit".into()),
            ..Config::default()
        };
        assert_eq!(
            config.api_key_or(Some("from-env".into())).as_deref(),
            Some("explicit")
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(StoryboardError::ConfigError(_))));
    }
}
