//! Embedding configuration for the host SDK.
//!
//! The configuration is what a merchant passes when embedding the widget.
//! It is forwarded to the iframe verbatim as the `config` member of the
//! handshake context, so its serialized form uses the camelCase keys the
//! app expects:
//!
//! ```toml
//! appUrl = "https://static.aiuta.com/sdk/v0/index.html"
//! customCssUrl = "/css/aiuta-theme.css"
//!
//! [auth]
//! apiKey = "pk_live_..."
//! ```
//!
//! Unknown keys are kept in [`AiutaConfiguration::extra`] and passed through
//! untouched, so newer app features can be configured without an SDK release.
//!
//! # Serde default values
//!
//! Only `auth` is required.  Absent fields take the value returned by the
//! matching `default_*` function.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Where the try-on app is served from unless configured otherwise.
pub const DEFAULT_APP_URL: &str = "https://static.aiuta.com/sdk/v0/index.html";

/// Element id of the iframe unless configured otherwise.
pub const DEFAULT_IFRAME_ID: &str = "aiuta-iframe";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// The JSON content could not be parsed.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The content parsed but a value is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Credentials the app uses to talk to the Aiuta backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthConfig {
    /// Public API key issued per merchant.
    ApiKey {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    /// JWT-based auth: the app requests tokens for this subscription.
    Jwt {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
    },
}

impl AuthConfig {
    fn credential(&self) -> &str {
        match self {
            Self::ApiKey { api_key } => api_key,
            Self::Jwt { subscription_id } => subscription_id,
        }
    }
}

/// Everything the host SDK needs to embed the widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiutaConfiguration {
    pub auth: AuthConfig,
    /// URL of the iframe document.  Relative URLs resolve against the page origin.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Stylesheet the app loads on top of its own theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css_url: Option<String>,
    #[serde(default = "default_iframe_id")]
    pub iframe_id: String,
    /// Keys this SDK does not interpret, forwarded to the app as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_app_url() -> String {
    DEFAULT_APP_URL.to_string()
}

fn default_iframe_id() -> String {
    DEFAULT_IFRAME_ID.to_string()
}

impl AiutaConfiguration {
    /// A configuration with the given auth and every other field defaulted.
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            auth,
            app_url: default_app_url(),
            custom_css_url: None,
            iframe_id: default_iframe_id(),
            extra: Map::new(),
        }
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::new(AuthConfig::ApiKey {
            api_key: api_key.into(),
        })
    }

    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = app_url.into();
        self
    }

    pub fn with_custom_css_url(mut self, url: impl Into<String>) -> Self {
        self.custom_css_url = Some(url.into());
        self
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] or [`ConfigError::Invalid`].
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Toml`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file; `.json` files are read as JSON, anything
    /// else as TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json) / [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }

    /// Checks values serde cannot: non-empty credential and iframe id.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.credential().trim().is_empty() {
            return Err(ConfigError::Invalid("auth credential is empty".to_string()));
        }
        if self.iframe_id.trim().is_empty() {
            return Err(ConfigError::Invalid("iframeId is empty".to_string()));
        }
        if self.app_url.trim().is_empty() {
            return Err(ConfigError::Invalid("appUrl is empty".to_string()));
        }
        Ok(())
    }

    /// The JSON object sent to the app as the handshake `config`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_json_takes_defaults() {
        // Arrange / Act
        let config = AiutaConfiguration::from_json(r#"{"auth": {"apiKey": "k"}}"#).unwrap();

        // Assert
        assert_eq!(
            config.auth,
            AuthConfig::ApiKey {
                api_key: "k".to_string()
            }
        );
        assert_eq!(config.app_url, DEFAULT_APP_URL);
        assert_eq!(config.iframe_id, DEFAULT_IFRAME_ID);
        assert!(config.custom_css_url.is_none());
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_jwt_auth_and_extra_keys_from_toml() {
        let text = r#"
            appUrl = "/try-on/index.html"
            customCssUrl = "theme.css"
            locale = "de"

            [auth]
            subscriptionId = "sub-1"
        "#;

        let config = AiutaConfiguration::from_toml_str(text).unwrap();

        assert_eq!(
            config.auth,
            AuthConfig::Jwt {
                subscription_id: "sub-1".to_string()
            }
        );
        assert_eq!(config.app_url, "/try-on/index.html");
        assert_eq!(config.custom_css_url.as_deref(), Some("theme.css"));
        assert_eq!(config.extra.get("locale"), Some(&json!("de")));
    }

    #[test]
    fn test_to_value_uses_camel_case_and_keeps_extra() {
        let mut config = AiutaConfiguration::with_api_key("k").with_custom_css_url("/a.css");
        config.extra.insert("locale".to_string(), json!("fr"));

        let value = config.to_value();

        assert_eq!(value["auth"], json!({"apiKey": "k"}));
        assert_eq!(value["customCssUrl"], "/a.css");
        assert_eq!(value["iframeId"], DEFAULT_IFRAME_ID);
        assert_eq!(value["locale"], "fr");
    }

    #[test]
    fn test_missing_auth_is_a_parse_error() {
        let err = AiutaConfiguration::from_json(r#"{"appUrl": "x"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let err = AiutaConfiguration::from_json(r#"{"auth": {"apiKey": "  "}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_reads_file_by_extension() {
        let dir = std::env::temp_dir().join(format!("aiuta-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let json_path = dir.join("aiuta.json");
        let toml_path = dir.join("aiuta.toml");
        std::fs::write(&json_path, r#"{"auth": {"apiKey": "from-json"}}"#).unwrap();
        std::fs::write(&toml_path, "[auth]\napiKey = \"from-toml\"\n").unwrap();

        let from_json = AiutaConfiguration::load(&json_path).unwrap();
        let from_toml = AiutaConfiguration::load(&toml_path).unwrap();

        assert_eq!(from_json.auth.credential(), "from-json");
        assert_eq!(from_toml.auth.credential(), "from-toml");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = AiutaConfiguration::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
