// src/logger.rs

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Result;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "critical" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }

    fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LogConfig {
    pub(crate) level: LogLevel,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) otel_endpoint: Option<String>,
}

impl LogConfig {
    pub fn new(level: LogLevel, log_dir: Option<PathBuf>, otel_endpoint: Option<String>) -> Self {
        Self {
            level,
            log_dir,
            otel_endpoint,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_dir: None,
            otel_endpoint: None,
        }
    }
}

/// Logger handle passed to services so they log without caring where the
/// lines end up.
#[typetag::serde]
pub trait LoggerType: Send + Sync {
    fn log(&self, level: LogLevel, context: &str, msg: &str);
    fn clone_box(&self) -> Box<dyn LoggerType>;
    fn debug_box(&self) -> String;
}

#[derive(Serialize, Deserialize)]
pub struct Logger(pub Box<dyn LoggerType>);

impl Logger {
    pub fn into_inner(self) -> Box<dyn LoggerType> {
        self.0
    }
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Logger(self.0.clone_box())
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Routes every line into `tracing`; the installed subscriber decides
/// whether that means stdout, files or an OTLP collector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

#[typetag::serde]
impl LoggerType for TracingLogger {
    fn log(&self, level: LogLevel, context: &str, msg: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(%context, "{msg}"),
            LogLevel::Debug => tracing::debug!(%context, "{msg}"),
            LogLevel::Info => tracing::info!(%context, "{msg}"),
            LogLevel::Warn => tracing::warn!(%context, "{msg}"),
            LogLevel::Error => tracing::error!(%context, "{msg}"),
            LogLevel::Critical => tracing::error!(%context, "[CRITICAL] {msg}"),
        }
    }

    fn clone_box(&self) -> Box<dyn LoggerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        "TracingLogger".to_string()
    }
}

static RESOURCE: OnceLock<Resource> = OnceLock::new();
fn resource() -> Resource {
    RESOURCE
        .get_or_init(|| {
            Resource::builder()
                .with_service_name("waypoint-service")
                .build()
        })
        .clone()
}

fn init_otlp_logs(endpoint: &str) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()?;
    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource())
        .build())
}

/// Install the global tracing subscriber.
///
/// With an OTLP endpoint, log events are bridged to the collector and
/// mirrored to stdout; otherwise they go to a daily-rolled file under the
/// root's `logs/` plus stdout.
pub fn init_tracing(root: PathBuf, config: &LogConfig) -> Result<Logger> {
    let level = config.level.as_directive();

    if let Some(endpoint) = &config.otel_endpoint {
        let provider = init_otlp_logs(endpoint)?;
        let otel_layer = {
            let filter = EnvFilter::new(level)
                .add_directive("hyper=off".parse()?)
                .add_directive("reqwest=off".parse()?);
            OpenTelemetryTracingBridge::new(&provider).with_filter(filter)
        };
        let stdout_layer = fmt::layer()
            .with_thread_names(true)
            .with_filter(EnvFilter::new(level));
        Registry::default()
            .with(otel_layer)
            .with(stdout_layer)
            .try_init()?;
    } else {
        let log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| root.join("logs"));
        let appender = tracing_appender::rolling::daily(log_dir, "waypoint.log");
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
            .with_filter(EnvFilter::new(level));
        let stdout_layer = fmt::layer().with_filter(EnvFilter::new(level));
        Registry::default()
            .with(file_layer)
            .with(stdout_layer)
            .try_init()?;
    }

    Ok(Logger(Box::new(TracingLogger::new())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::parse("trace"), LogLevel::Trace);
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("nonsense"), LogLevel::Info);
    }

    #[test]
    fn test_logger_clones() {
        let logger = Logger(Box::new(TracingLogger::new()));
        let clone = logger.clone();
        clone.0.log(LogLevel::Debug, "test", "hello");
        assert_eq!(format!("{clone:?}"), "TracingLogger");
    }
}
