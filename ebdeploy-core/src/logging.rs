use serde::{Deserialize, Serialize};
use std::io;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (text, json, compact)
    pub format: LogFormat,
    /// Whether to include file and line numbers
    pub include_location: bool,
    /// Whether to emit span open/close events
    pub include_spans: bool,
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact text format
    Compact,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
            include_location: false,
            include_spans: false,
        }
    }
}

/// Initialize logging with the given configuration.
///
/// Logs always go to stderr; stdout belongs to the prompt channel.
pub fn init_logging(config: &LogConfig) -> crate::Result<()> {
    parse_log_level(&config.level)?;

    let directive = format!("ebdeploy={}", config.level)
        .parse()
        .map_err(|e| crate::EbDeployError::config(format!("Invalid log directive: {}", e)))?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level))
        .add_directive(directive);

    let registry = tracing_subscriber::registry().with(env_filter);
    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_span_events(span_events)
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_span_events(span_events)
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(config.include_location)
                    .with_writer(io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| {
        crate::EbDeployError::config(format!("Failed to initialize logging: {}", e))
    })?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        "Logging initialized"
    );

    Ok(())
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> crate::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(crate::EbDeployError::validation(format!(
            "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
            level
        ))),
    }
}

/// Correlation ID shared by every log line of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names the stage of a run that log lines belong to.
///
/// Every stage of one run shares a correlation ID, so the lines of a single
/// deployment can be pulled out of interleaved output.
#[derive(Debug, Clone)]
pub struct LogContext {
    correlation_id: CorrelationId,
    operation: String,
    component: String,
}

impl LogContext {
    pub fn new(operation: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation: operation.into(),
            component: component.into(),
        }
    }

    /// Context for a later stage of the same run
    pub fn child(&self, operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..self.clone()
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "run",
            run_id = %self.correlation_id,
            stage = %self.operation,
            component = %self.component
        )
    }

    /// Emit `message` at `level` inside this context's span
    pub fn log(&self, level: Level, message: &str) {
        let _entered = self.span().entered();
        match level {
            Level::ERROR => tracing::error!("{message}"),
            Level::WARN => tracing::warn!("{message}"),
            Level::INFO => tracing::info!("{message}"),
            Level::DEBUG => tracing::debug!("{message}"),
            _ => tracing::trace!("{message}"),
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert!(parse_log_level("debug").is_ok());
        assert!(parse_log_level("warn").is_ok());
        assert!(parse_log_level("DEBUG").is_ok());
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_correlation_id() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        assert_ne!(id1.as_str(), id2.as_str());

        assert_eq!(id1.as_str().len(), 32);
        assert!(!id1.as_str().contains('-'));

        let custom_id = CorrelationId::from("run-123".to_string());
        assert_eq!(custom_id.to_string(), "run-123");
    }

    #[test]
    fn test_child_context_keeps_correlation_id() {
        let context = LogContext::new("create_pipeline", "orchestrator");
        let child = context.child("deploy");
        assert_eq!(child.operation(), "deploy");
        assert_eq!(child.component(), "orchestrator");
        assert_eq!(child.correlation_id().as_str(), context.correlation_id().as_str());
    }

    #[test]
    fn test_log_config_serialization() {
        let config = LogConfig {
            format: LogFormat::Json,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"json\""));
        let deserialized: LogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.format, LogFormat::Json);
        assert_eq!(deserialized.level, "warn");
    }
}
