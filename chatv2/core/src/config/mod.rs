//! TOML Configuration File Support
//!
//! Client configuration is read from `~/.config/chatv2/client.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/chatv2/client.toml` (typically `~/.config/chatv2/client.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "https://chat.example.com"
//! api_prefix = "/chatv2/api"
//! connect_timeout_ms = 5000
//! request_timeout_ms = 30000
//!
//! [stream]
//! idle_timeout_secs = 60
//!
//! [auth]
//! header = "Authorization"
//! token = "Bearer eyJ..."
//!
//! [chat]
//! default_model = "deepseek-chat"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
/// Default path prefix of the chat API
pub const DEFAULT_API_PREFIX: &str = "/chatv2/api";
/// Default header carrying the auth token
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Backend address, e.g. `https://chat.example.com`
    pub base_url: Option<String>,

    /// Path prefix of the chat API
    pub api_prefix: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Timeout for non-streaming requests in milliseconds
    pub request_timeout_ms: Option<u64>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Seconds of silence before a streaming reply is abandoned
    pub idle_timeout_secs: Option<u64>,
}

/// Auth section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    /// Header name carrying the token
    pub header: Option<String>,

    /// Token value, sent verbatim
    pub token: Option<String>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Model to select when the backend does not name a default
    pub default_model: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Server configuration section
    pub server: ServerToml,

    /// Stream configuration section
    pub stream: StreamToml,

    /// Auth configuration section
    pub auth: AuthToml,

    /// Chat configuration section
    pub chat: ChatToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Auth header attached to every request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    /// Header name
    pub header: String,
    /// Token value (no header is sent when absent)
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_AUTH_HEADER.to_string(),
            token: None,
        }
    }
}

impl AuthConfig {
    /// Header name and value to send, if a token is configured
    #[must_use]
    pub fn header_pair(&self) -> Option<(&str, &str)> {
        self.token
            .as_deref()
            .map(|token| (self.header.as_str(), token))
    }
}

/// Centralized configuration for the chat client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend address
    pub base_url: String,

    /// Path prefix of the chat API
    pub api_prefix: String,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Timeout for non-streaming requests
    pub request_timeout: Duration,

    /// Silence allowed on a streaming reply
    pub idle_timeout: Duration,

    /// Auth header
    pub auth: AuthConfig,

    /// Fallback model selection
    pub default_model: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            auth: AuthConfig::default(),
            default_model: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration pointing at `base_url`, everything else default
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Absolute URL of an API endpoint
    ///
    /// `path` is relative to the API prefix, e.g. `"models/default"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the base URL does not parse.
    pub fn endpoint(&self, path: &str) -> Result<reqwest::Url, ConfigError> {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        let raw = if prefix.is_empty() {
            format!("{base}/{path}")
        } else {
            format!("{base}/{prefix}/{path}")
        };
        reqwest::Url::parse(&raw)
            .map_err(|e| ConfigError::ValidationError(format!("bad endpoint URL {raw}: {e}")))
    }

    /// Build the shared HTTP client
    ///
    /// Only the connect timeout is set on the client. Streaming replies can
    /// legitimately run for minutes, so whole-request timeouts are applied per
    /// call instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend fails to initialise.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
    }

    /// Check values that would otherwise fail late
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::ValidationError(format!("base_url {:?} is not a URL: {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "connect timeout must be non-zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "stream idle timeout must be non-zero".to_string(),
            ));
        }
        if self.auth.header.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth header name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/chatv2/client.toml` or
/// `~/.config/chatv2/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatv2").join("client.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the merged result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment variables through `lookup`
fn load_config_with_env(
    path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, lookup);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.server.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(ref prefix) = toml.server.api_prefix {
        config.api_prefix.clone_from(prefix);
    }
    if let Some(ms) = toml.server.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.server.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }

    if let Some(secs) = toml.stream.idle_timeout_secs {
        config.idle_timeout = Duration::from_secs(secs);
    }

    if let Some(ref header) = toml.auth.header {
        config.auth.header.clone_from(header);
    }
    if toml.auth.token.is_some() {
        config.auth.token.clone_from(&toml.auth.token);
    }

    if toml.chat.default_model.is_some() {
        config.default_model.clone_from(&toml.chat.default_model);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("CHATV2_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(prefix) = lookup("CHATV2_API_PREFIX") {
        config.api_prefix = prefix;
        config.source = ConfigSource::Env;
    }
    if let Some(token) = lookup("CHATV2_TOKEN") {
        config.auth.token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(header) = lookup("CHATV2_AUTH_HEADER") {
        config.auth.header = header;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = lookup("CHATV2_MODEL") {
        config.default_model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("CHATV2_IDLE_TIMEOUT_SECS") {
        if let Ok(secs) = secs.parse::<u64>() {
            config.idle_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(ms) = lookup("CHATV2_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = ms.parse::<u64>() {
            config.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Token override
    pub token: Option<String>,

    /// Default model override
    pub default_model: Option<String>,

    /// Idle timeout override (seconds)
    pub idle_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set token override
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    /// Set default model override
    #[must_use]
    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = Some(model);
        self
    }

    /// Set idle timeout override
    #[must_use]
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration and re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override is invalid.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some()
            || self.token.is_some()
            || self.default_model.is_some()
            || self.idle_timeout_secs.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(ref token) = self.token {
            config.auth.token = Some(token.clone());
        }
        if let Some(ref model) = self.default_model {
            config.default_model = Some(model.clone());
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.idle_timeout = Duration::from_secs(secs);
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_prefix, "/chatv2/api");
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.auth.header, "Authorization");
        assert!(config.auth.header_pair().is_none());
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            load_config_with_env(Some(PathBuf::from("/nonexistent/chatv2.toml")), no_env).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    // =========================================================================
    // File Loading Tests
    // =========================================================================

    #[test]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
[server]
base_url = "https://chat.example.com"
connect_timeout_ms = 1500

[stream]
idle_timeout_secs = 20

[auth]
header = "X-Token"
token = "abc"

[chat]
default_model = "deepseek-chat"
"#,
        );

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.base_url, "https://chat.example.com");
        assert_eq!(config.api_prefix, DEFAULT_API_PREFIX);
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.idle_timeout, Duration::from_secs(20));
        assert_eq!(config.auth.header_pair(), Some(("X-Token", "abc")));
        assert_eq!(config.default_model.as_deref(), Some("deepseek-chat"));
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let file = write_toml("[server\nbase_url = ");
        let err = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    // =========================================================================
    // Environment Override Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = write_toml("[server]\nbase_url = \"https://file.example.com\"\n");
        let env = env_from(&[
            ("CHATV2_BASE_URL", "https://env.example.com"),
            ("CHATV2_TOKEN", "secret"),
            ("CHATV2_IDLE_TIMEOUT_SECS", "5"),
            ("CHATV2_CONNECT_TIMEOUT_MS", "not-a-number"),
        ]);

        let config = load_config_with_env(Some(file.path().to_path_buf()), env).unwrap();

        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.auth.token.as_deref(), Some("secret"));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        // Unparseable values are ignored
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_rejects_non_http_base_url() {
        let env = env_from(&[("CHATV2_BASE_URL", "ftp://example.com")]);
        let err = load_config_with_env(None, env).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_zero_idle_timeout() {
        let env = env_from(&[("CHATV2_IDLE_TIMEOUT_SECS", "0")]);
        let err = load_config_with_env(None, env).unwrap_err();
        assert!(err.to_string().contains("idle timeout"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ClientConfig::default();
        ConfigOverrides::new()
            .with_base_url("https://cli.example.com".to_string())
            .with_default_model("m1".to_string())
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.base_url, "https://cli.example.com");
        assert_eq!(config.default_model.as_deref(), Some("m1"));
        assert_eq!(config.source(), ConfigSource::Cli);

        let mut config = ClientConfig::default();
        ConfigOverrides::new().apply(&mut config).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }

    // =========================================================================
    // Endpoint Tests
    // =========================================================================

    #[test]
    fn test_endpoint_joins_prefix() {
        let config = ClientConfig::with_base_url("https://chat.example.com/");
        assert_eq!(
            config.endpoint("models/default").unwrap().as_str(),
            "https://chat.example.com/chatv2/api/models/default"
        );

        let config = ClientConfig {
            api_prefix: "api/".to_string(),
            ..ClientConfig::with_base_url("http://localhost:9000")
        };
        assert_eq!(
            config.endpoint("/send").unwrap().as_str(),
            "http://localhost:9000/api/send"
        );
    }
}
