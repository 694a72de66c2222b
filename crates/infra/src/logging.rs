//! Tracing initialization.

use std::str::FromStr;
use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable selecting the output format when no explicit format
/// is given.
pub const LOG_FORMAT_ENV: &str = "DBARCHIVE_LOG_FORMAT";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl LogFormat {
    /// Format named by `DBARCHIVE_LOG_FORMAT`, falling back to text.
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV).ok().and_then(|raw| raw.parse().ok()).unwrap_or_default()
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Levels come from `RUST_LOG` and default to `info`. Idempotent; a
/// subscriber installed elsewhere first is left in place.
pub fn init_tracing(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match format {
            LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr).with_target(true)).try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_target(true),
                )
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("global tracing subscriber already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing(LogFormat::Text);
        init_tracing(LogFormat::Json);
    }
}
