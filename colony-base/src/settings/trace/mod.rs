use eyre::Result;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

mod span_metrics;

use crate::CoreMetrics;
pub use span_metrics::TimeSpanLifetime;

/// Logging level
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    /// Off
    Off,
    /// Error
    Error,
    /// Warn
    Warn,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// Info
    #[serde(other)]
    Info,
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Output style of the stdout fmt layer.
#[derive(Debug, Clone, Copy, serde::Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    /// Pretty print
    Pretty,
    /// JSON
    Json,
    /// Compact
    Compact,
    /// Default style
    #[serde(other)]
    Full,
}

impl Default for Style {
    fn default() -> Self {
        Style::Pretty
    }
}

/// Configuration for the tracing subscribers used by colony binaries.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    fmt: Style,
    #[serde(default)]
    level: Level,
}

impl TracingConfig {
    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings.
    ///
    /// Each fmt style changes the type of the layered subscriber, so every
    /// style is assembled and initialized in its own arm.
    pub fn start_tracing(&self, metrics: &CoreMetrics) -> Result<()> {
        let base = tracing_subscriber::Registry::default()
            .with(TimeSpanLifetime::new(metrics))
            .with(LevelFilter::from(self.level))
            .with(tracing_error::ErrorLayer::default());

        match self.fmt {
            Style::Pretty => base.with(tracing_subscriber::fmt::layer().pretty()).try_init()?,
            Style::Json => base.with(tracing_subscriber::fmt::layer().json()).try_init()?,
            Style::Compact => base
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?,
            Style::Full => base.with(tracing_subscriber::fmt::layer()).try_init()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(serde::Deserialize)]
    struct TestStyle {
        style: Style,
    }

    #[test]
    fn it_deserializes_formatting_strings() {
        for (raw, want) in [
            (r#"{"style": "pretty"}"#, Style::Pretty),
            (r#"{"style": "compact"}"#, Style::Compact),
            (r#"{"style": "json"}"#, Style::Json),
            (r#"{"style": "full"}"#, Style::Full),
            (r#"{"style": "toast"}"#, Style::Full),
        ] {
            assert_eq!(serde_json::from_str::<TestStyle>(raw).unwrap().style, want);
        }
    }
}
