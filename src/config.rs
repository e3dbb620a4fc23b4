//! Wxgate configuration.

use crate::errors::WxGateError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default platform API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com/cgi-bin";

/// Default webhook bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Configuration for the gateway.
///
/// Contains the Official Account identity, the shared callback token, and
/// the local settings for credential persistence and the webhook server.
#[derive(Debug, Clone)]
pub struct WxGateConfig {
    /// Official Account app ID.
    pub app_id: String,

    /// Official Account app secret.
    /// SECURITY: never log this value.
    pub app_secret: String,

    /// Shared callback token configured on the platform side.
    /// Participates in the webhook signature.
    pub token: String,

    /// Platform API base URL (no trailing slash).
    /// Overridable for tests pointing at a local server.
    pub api_base: String,

    /// Directory holding the durable credential records.
    pub store_dir: PathBuf,

    /// Webhook server bind address.
    pub bind: String,

    /// Outbound HTTP request timeout.
    pub request_timeout: Duration,
}

impl WxGateConfig {
    /// Build a configuration from `WXGATE_*` environment variables.
    ///
    /// `WXGATE_APP_ID`, `WXGATE_APP_SECRET`, and `WXGATE_TOKEN` are
    /// required; the rest fall back to defaults.
    pub fn from_env() -> Result<Self, WxGateError> {
        let require = |name: &str| {
            env::var(name).map_err(|_| WxGateError::Config(format!("{} is not set", name)))
        };

        let store_dir = match env::var("WXGATE_STORE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_store_dir()?,
        };

        let config = Self {
            app_id: require("WXGATE_APP_ID")?,
            app_secret: require("WXGATE_APP_SECRET")?,
            token: require("WXGATE_TOKEN")?,
            api_base: env::var("WXGATE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            store_dir,
            bind: env::var("WXGATE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
            request_timeout: Duration::from_secs(30),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), WxGateError> {
        if self.app_id.is_empty() {
            return Err(WxGateError::Config("app_id cannot be empty".to_string()));
        }
        if self.app_secret.is_empty() {
            return Err(WxGateError::Config(
                "app_secret cannot be empty".to_string(),
            ));
        }
        if self.token.is_empty() {
            return Err(WxGateError::Config("token cannot be empty".to_string()));
        }
        if self.api_base.ends_with('/') {
            return Err(WxGateError::Config(
                "api_base must not end with a slash".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default credential store directory under the platform data dir.
fn default_store_dir() -> Result<PathBuf, WxGateError> {
    let base = dirs::data_dir()
        .ok_or_else(|| WxGateError::Config("Could not find data directory".to_string()))?;
    Ok(base.join("wxgate"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WxGateConfig {
        WxGateConfig {
            app_id: "wx1234567890".to_string(),
            app_secret: "secret".to_string(),
            token: "mytoken123".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            store_dir: PathBuf::from("/tmp/wxgate-test"),
            bind: DEFAULT_BIND.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_app_id() {
        let mut config = test_config();
        config.app_id.clear();
        assert!(matches!(config.validate(), Err(WxGateError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_token() {
        let mut config = test_config();
        config.token.clear();
        assert!(matches!(config.validate(), Err(WxGateError::Config(_))));
    }

    #[test]
    fn validate_rejects_trailing_slash_api_base() {
        let mut config = test_config();
        config.api_base.push('/');
        assert!(matches!(config.validate(), Err(WxGateError::Config(_))));
    }
}
