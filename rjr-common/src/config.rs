//! Runner configuration sourced from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Base URL of the control server, e.g. `https://ctl.example.com/api`.
    #[serde(default = "default_control_url")]
    pub control_url: String,
    /// Directory jobs use for checkouts and intermediate artifacts.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Overall job deadline in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            control_url: default_control_url(),
            work_dir: default_work_dir(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl RunnerConfig {
    /// Read configuration from `RJR_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("RJR_CONTROL_URL") {
            config.control_url = url;
        }
        if let Ok(dir) = std::env::var("RJR_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("RJR_DEADLINE_SECS")
            && let Ok(secs) = raw.parse::<u64>()
        {
            config.deadline_secs = secs;
        }
        config
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_control_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("rjr")
}

/// Jobs get five hours end to end.
fn default_deadline_secs() -> u64 {
    5 * 60 * 60
}
