//! # Configuration Management
//!
//! Centralized configuration for the broker's wire-protocol layer.
//!
//! Covers frame size limits, the authentication strategy, the protobuf
//! envelope version policy, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - `MAESTRO_*` environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - The default frame limit (16 MB) bounds what a single client can make
//!   the stream decoder buffer
//! - Token mode refuses to start with an empty secret
//! - Secrets are never written to logs

use crate::error::{ProtocolError, Result};
use crate::protocol::auth::{Authenticator, NilAuthenticator, SigningAlgorithm, TokenAuthenticator};
use crate::protocol::envelope::ProtoVersion;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// Current sentinel frame version written by this crate
pub const PROTOCOL_VERSION: u32 = 1;

/// Max allowed frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Oldest envelope version accepted by default
pub const DEFAULT_MIN_PROTO_VERSION: &str = "3.0.0";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Frame limits
    #[serde(default)]
    pub frame: FrameConfig,

    /// Authentication strategy
    #[serde(default)]
    pub auth: AuthConfig,

    /// Protobuf envelope policy
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults; set but unparsable values are
    /// reported rather than ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("MAESTRO_MAX_FRAME_SIZE") {
            config.frame.max_frame_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid MAESTRO_MAX_FRAME_SIZE '{size}': {e}"))
            })?;
        }

        if let Ok(mode) = std::env::var("MAESTRO_AUTH_MODE") {
            config.auth.mode = match mode.to_ascii_lowercase().as_str() {
                "nil" => AuthMode::Nil,
                "token" => AuthMode::Token,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid MAESTRO_AUTH_MODE '{other}' (expected 'nil' or 'token')"
                    )))
                }
            };
        }

        if let Ok(algorithm) = std::env::var("MAESTRO_AUTH_ALGORITHM") {
            config.auth.algorithm = algorithm.parse()?;
        }

        if let Ok(secret) = std::env::var("MAESTRO_AUTH_SECRET") {
            config.auth.secret = secret;
        }

        if let Ok(version) = std::env::var("MAESTRO_MIN_PROTO_VERSION") {
            config.envelope.min_proto_version = version;
        }

        if let Ok(level) = std::env::var("MAESTRO_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid MAESTRO_LOG_LEVEL '{level}'"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.frame.validate());
        errors.extend(self.auth.validate());
        errors.extend(self.envelope.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Frame limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrameConfig {
    /// Largest frame accepted by the dispatcher and stream codec, in bytes
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl FrameConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size < crate::core::frame::FRAME_OVERHEAD {
            errors.push(format!(
                "Max frame size too small: {} (minimum: {} bytes, an empty frame)",
                self.max_frame_size,
                crate::core::frame::FRAME_OVERHEAD
            ));
        } else if self.max_frame_size > 256 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 256 MB)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Which authenticator guards the auth section of each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Accept every frame without a connection identity
    #[default]
    Nil,
    /// Require a signed token carrying a `conn_id` claim
    Token,
}

/// Authentication configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub mode: AuthMode,

    /// Signing algorithm tokens must declare
    pub algorithm: SigningAlgorithm,

    /// Shared HMAC secret (token mode only)
    #[serde(default)]
    pub secret: String,

    /// Clock skew tolerated on time claims
    #[serde(with = "duration_serde")]
    pub leeway: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Nil,
            algorithm: SigningAlgorithm::HS256,
            secret: String::new(),
            leeway: Duration::ZERO,
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.mode == AuthMode::Token {
            if self.secret.is_empty() {
                errors.push("Auth secret cannot be empty in token mode".to_string());
            } else if self.secret.len() < 32 {
                errors.push(format!(
                    "WARNING: Auth secret is only {} bytes (recommended: at least 32)",
                    self.secret.len()
                ));
            }
        }

        if self.leeway.as_secs() > 300 {
            errors.push("Auth leeway too long (maximum: 300s)".to_string());
        }

        errors
    }

    /// Build the authenticator this configuration describes
    pub fn build_authenticator(&self) -> Result<Arc<dyn Authenticator>> {
        match self.mode {
            AuthMode::Nil => Ok(Arc::new(NilAuthenticator)),
            AuthMode::Token => {
                if self.secret.is_empty() {
                    return Err(ProtocolError::ConfigError(
                        "Auth secret cannot be empty in token mode".to_string(),
                    ));
                }
                Ok(Arc::new(
                    TokenAuthenticator::new(self.algorithm, self.secret.as_bytes())
                        .with_leeway(self.leeway),
                ))
            }
        }
    }
}

/// Protobuf envelope policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvelopeConfig {
    /// Minimum `major.minor.patch` envelope version, checked per component
    pub min_proto_version: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            min_proto_version: DEFAULT_MIN_PROTO_VERSION.to_string(),
        }
    }
}

impl EnvelopeConfig {
    pub fn validate(&self) -> Vec<String> {
        match self.min_proto_version.parse::<ProtoVersion>() {
            Ok(_) => Vec::new(),
            Err(_) => vec![format!(
                "Invalid min_proto_version: '{}' (expected format: '3.0.0')",
                self.min_proto_version
            )],
        }
    }

    /// Parsed minimum version
    pub fn min_version(&self) -> Result<ProtoVersion> {
        Ok(self.min_proto_version.parse::<ProtoVersion>()?)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("maestro-protocol"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
