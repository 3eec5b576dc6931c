//! Logging configuration types
//!
//! A [`LoggingConfig`] value is handed to [`LoggingLayer`](crate::LoggingLayer)
//! at construction time. Loading and binding the value (files, env, DI) is the
//! host application's concern; the structs derive serde so they can be embedded
//! in an application's own configuration tree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Default ceiling for bodies eligible for logging: 1MB
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Default redaction marker substituted for masked values
pub const DEFAULT_MASK: &str = "***";

/// Severity at which finished log records are emitted.
///
/// `Off` disables the middleware entirely: no body wrapping, no timing, no
/// record assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Disable logging and skip all interception work
    Off,
    /// Emit records at error severity
    Error,
    /// Emit records at warn severity
    Warn,
    /// Emit records at info severity (default)
    #[default]
    Info,
    /// Emit records at debug severity
    Debug,
    /// Emit records at trace severity
    Trace,
}

impl LogLevel {
    /// Whether this level disables logging entirely.
    pub fn is_off(self) -> bool {
        matches!(self, LogLevel::Off)
    }
}

/// Key sets and marker for the built-in masking rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Redaction marker substituted for masked values
    pub mask: String,
    /// Query parameter names whose values are masked in logged URIs
    pub query_params: HashSet<String>,
    /// JSON member keys whose values are masked in logged bodies
    pub json_keys: HashSet<String>,
    /// Form-urlencoded keys whose values are masked in logged bodies
    pub form_keys: HashSet<String>,
    /// Whether key names match case-insensitively
    pub case_insensitive: bool,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            mask: DEFAULT_MASK.to_string(),
            query_params: HashSet::new(),
            json_keys: HashSet::new(),
            form_keys: HashSet::new(),
            case_insensitive: true,
        }
    }
}

/// Per-direction logging toggles and the body-size ceiling.
///
/// One instance configures the request side, another the response side; each
/// toggle can additionally be overridden per request via
/// [`LogOverrides`](crate::LogOverrides).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionConfig {
    /// Log the exchange id line
    pub include_id: bool,
    /// Log the method/URI line (masked per the query-parameter rules)
    pub include_uri: bool,
    /// Log the headers block
    pub include_headers: bool,
    /// Log the body (captured through the tap, masked, size-limited)
    pub include_body: bool,
    /// Log the elapsed-time line
    pub include_took_time: bool,
    /// Bodies with a declared length above this never get captured; the
    /// record carries a placeholder instead of content
    pub max_body_size: u64,
}

impl DirectionConfig {
    /// Defaults for the request direction (elapsed time off).
    pub fn request() -> Self {
        Self {
            include_id: true,
            include_uri: true,
            include_headers: true,
            include_body: true,
            include_took_time: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Defaults for the response direction (elapsed time on).
    pub fn response() -> Self {
        Self {
            include_took_time: true,
            ..Self::request()
        }
    }
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self::request()
    }
}

/// Configuration for the logging middleware.
///
/// # Example
///
/// ```rust
/// use logtap::LoggingConfig;
///
/// let config = LoggingConfig::builder()
///     .name("Backend")
///     .mask_json_key("password")
///     .mask_query_param("token")
///     .build();
/// assert!(config.enabled);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Master switch; `false` behaves exactly like `LogLevel::Off`
    pub enabled: bool,
    /// Severity of emitted records
    pub level: LogLevel,
    /// Display name rendered in the record header and footer lines
    pub name: String,
    /// Width of the field-label column in rendered records
    pub column_width: usize,
    /// Request-direction toggles
    pub request: DirectionConfig,
    /// Response-direction toggles
    pub response: DirectionConfig,
    /// Key sets for the built-in masking rules
    pub mask: MaskConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            name: "HTTP".to_string(),
            column_width: 14,
            request: DirectionConfig::request(),
            response: DirectionConfig::response(),
            mask: MaskConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Create a builder initialized with the defaults.
    pub fn builder() -> LoggingConfigBuilder {
        LoggingConfigBuilder::default()
    }
}

/// Builder for [`LoggingConfig`].
#[derive(Default)]
pub struct LoggingConfigBuilder {
    config: LoggingConfig,
}

impl LoggingConfigBuilder {
    /// Set the master switch.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the severity of emitted records.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Set the display name rendered in header and footer lines.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the width of the field-label column.
    pub fn column_width(mut self, width: usize) -> Self {
        self.config.column_width = width;
        self
    }

    /// Replace the request-direction toggles.
    pub fn request(mut self, request: DirectionConfig) -> Self {
        self.config.request = request;
        self
    }

    /// Replace the response-direction toggles.
    pub fn response(mut self, response: DirectionConfig) -> Self {
        self.config.response = response;
        self
    }

    /// Replace the mask configuration.
    pub fn mask(mut self, mask: MaskConfig) -> Self {
        self.config.mask = mask;
        self
    }

    /// Set the redaction marker.
    pub fn mask_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.mask.mask = marker.into();
        self
    }

    /// Add a query parameter name to mask in logged URIs.
    pub fn mask_query_param(mut self, name: impl Into<String>) -> Self {
        self.config.mask.query_params.insert(name.into());
        self
    }

    /// Add a JSON member key to mask in logged bodies.
    pub fn mask_json_key(mut self, key: impl Into<String>) -> Self {
        self.config.mask.json_keys.insert(key.into());
        self
    }

    /// Add a form-urlencoded key to mask in logged bodies.
    pub fn mask_form_key(mut self, key: impl Into<String>) -> Self {
        self.config.mask.form_keys.insert(key.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LoggingConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.name, "HTTP");
        assert_eq!(config.column_width, 14);
        assert!(!config.request.include_took_time);
        assert!(config.response.include_took_time);
        assert_eq!(config.request.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.mask.mask, "***");
        assert!(config.mask.case_insensitive);
        assert!(config.mask.json_keys.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::builder()
            .name("Payments")
            .level(LogLevel::Debug)
            .column_width(10)
            .mask_marker("[redacted]")
            .mask_json_key("password")
            .mask_form_key("secret")
            .mask_query_param("token")
            .build();

        assert_eq!(config.name, "Payments");
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.column_width, 10);
        assert_eq!(config.mask.mask, "[redacted]");
        assert!(config.mask.json_keys.contains("password"));
        assert!(config.mask.form_keys.contains("secret"));
        assert!(config.mask.query_params.contains("token"));
    }

    #[test]
    fn test_level_is_off() {
        assert!(LogLevel::Off.is_off());
        assert!(!LogLevel::Info.is_off());
    }

    #[test]
    fn test_direction_presets() {
        let request = DirectionConfig::request();
        let response = DirectionConfig::response();
        assert!(!request.include_took_time);
        assert!(response.include_took_time);
        assert_eq!(request.max_body_size, response.max_body_size);
    }

    #[test]
    fn test_serde_roundtrip_with_defaults() {
        // Hosts bind this struct from their own config files; missing fields
        // must fall back to the defaults.
        let config: LoggingConfig = serde_json::from_str("{}").expect("empty object binds");
        assert!(config.enabled);
        assert_eq!(config, LoggingConfig::default());

        let partial: LoggingConfig =
            serde_json::from_str(r#"{"level":"off","name":"Billing"}"#).expect("partial binds");
        assert!(partial.level.is_off());
        assert_eq!(partial.name, "Billing");
        assert!(partial.response.include_took_time);
    }
}
