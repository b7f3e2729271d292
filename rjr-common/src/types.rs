//! Common types used across runner components.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RunnerError;

/// One line of job output destined for the control server's log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogLine {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.message
        )
    }
}

/// The closed set of workflow kinds a job can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    BuildDiff,
    Fuzz,
    Benchmark,
    Rebase,
    Backport,
}

impl JobKind {
    /// Resolve a metadata job-type selector. Unknown kinds are rejected
    /// explicitly rather than treated as a no-op.
    pub fn from_selector(selector: &str) -> Result<Self, RunnerError> {
        match selector.trim().to_ascii_lowercase().as_str() {
            "builddiff" | "build-diff" => Ok(Self::BuildDiff),
            "fuzz" => Ok(Self::Fuzz),
            "benchmark" => Ok(Self::Benchmark),
            "rebase" => Ok(Self::Rebase),
            "backport" => Ok(Self::Backport),
            other => Err(RunnerError::UnsupportedJobKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildDiff => write!(f, "build-diff"),
            Self::Fuzz => write!(f, "fuzz"),
            Self::Benchmark => write!(f, "benchmark"),
            Self::Rebase => write!(f, "rebase"),
            Self::Backport => write!(f, "backport"),
        }
    }
}

/// A `repo;branch` pair from a comma-separated metadata list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub repo: String,
    pub branch: String,
}

impl FromStr for DependencySpec {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(';') {
            Some((repo, branch)) if !repo.trim().is_empty() && !branch.trim().is_empty() => {
                Ok(Self {
                    repo: repo.trim().to_string(),
                    branch: branch.trim().to_string(),
                })
            }
            _ => Err(RunnerError::MalformedMetadata {
                key: "dependency list".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// The job's metadata map, immutable after fetch. Keys are matched
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct JobMetadata {
    values: HashMap<String, String>,
}

impl JobMetadata {
    pub fn from_map(map: HashMap<String, String>) -> Self {
        let values = map
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str, RunnerError> {
        self.get(key)
            .ok_or_else(|| RunnerError::MissingMetadata(key.to_string()))
    }

    pub fn kind(&self) -> Result<JobKind, RunnerError> {
        JobKind::from_selector(self.require("jobtype")?)
    }

    /// Parse an optional comma-separated `repo;branch` list.
    pub fn dependency_list(&self, key: &str) -> Result<Vec<DependencySpec>, RunnerError> {
        let Some(raw) = self.get(key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(DependencySpec::from_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> JobMetadata {
        JobMetadata::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_metadata_keys_are_case_insensitive() {
        let meta = metadata(&[("JobType", "fuzz"), ("Repo", "https://example/r.git")]);
        assert_eq!(meta.get("jobtype"), Some("fuzz"));
        assert_eq!(meta.get("JOBTYPE"), Some("fuzz"));
        assert_eq!(meta.get("repo"), Some("https://example/r.git"));
        assert!(meta.get("branch").is_none());
    }

    #[test]
    fn test_require_missing_key_errors() {
        let meta = metadata(&[]);
        let err = meta.require("repo").unwrap_err();
        assert!(matches!(err, RunnerError::MissingMetadata(key) if key == "repo"));
    }

    #[test]
    fn test_job_kind_selectors() {
        assert_eq!(JobKind::from_selector("BuildDiff").unwrap(), JobKind::BuildDiff);
        assert_eq!(JobKind::from_selector("build-diff").unwrap(), JobKind::BuildDiff);
        assert_eq!(JobKind::from_selector(" fuzz ").unwrap(), JobKind::Fuzz);
        assert_eq!(JobKind::from_selector("Backport").unwrap(), JobKind::Backport);
    }

    #[test]
    fn test_unknown_job_kind_is_rejected() {
        let err = JobKind::from_selector("mystery").unwrap_err();
        assert!(matches!(err, RunnerError::UnsupportedJobKind(kind) if kind == "mystery"));
    }

    #[test]
    fn test_dependency_list_parses_pairs() {
        let meta = metadata(&[(
            "Dependencies",
            "https://example/a.git;main, https://example/b.git;release/9.0",
        )]);
        let deps = meta.dependency_list("dependencies").unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].repo, "https://example/a.git");
        assert_eq!(deps[0].branch, "main");
        assert_eq!(deps[1].branch, "release/9.0");
    }

    #[test]
    fn test_dependency_list_missing_key_is_empty() {
        let meta = metadata(&[]);
        assert!(meta.dependency_list("dependencies").unwrap().is_empty());
    }

    #[test]
    fn test_dependency_list_malformed_pair_errors() {
        let meta = metadata(&[("Dependencies", "no-separator-here")]);
        assert!(meta.dependency_list("dependencies").is_err());
    }
}
