//! Operator logging setup.
//!
//! This covers the worker's own diagnostics via `tracing`; the job's
//! remote log stream is a separate concern handled by [`crate::logchan`].

use tracing_subscriber::EnvFilter;

/// Builder-style logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    stderr: bool,
}

impl LogConfig {
    /// Build from the `RJR_LOG` environment variable, falling back to the
    /// provided default level.
    pub fn from_env(default_level: &str) -> Self {
        let level = std::env::var("RJR_LOG").unwrap_or_else(|_| default_level.to_string());
        Self {
            level,
            stderr: false,
        }
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }
}

/// Initialize the global tracing subscriber. Call once per process; a
/// second call fails, which matters only in tests.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.stderr {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_level_overrides() {
        let config = LogConfig::from_env("info").with_level("debug").with_stderr();
        assert_eq!(config.level, "debug");
        assert!(config.stderr);
    }
}
