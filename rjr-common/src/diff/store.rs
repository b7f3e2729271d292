//! Persistence of per-branch generated-source results.
//!
//! Each branch's generation phase writes a JSON array of records at a
//! deterministic path under the job work dir, so the baseline and
//! candidate phases can run as separable steps (and be re-run
//! independently when debugging a job).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diff::collect::KnownPattern;
use crate::errors::RunnerError;

/// One persisted generation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedRecord {
    pub pattern: String,
    pub options: u32,
    pub count: u64,
    pub text: String,
}

/// Deterministic per-branch results path.
pub fn branch_results_path(work_dir: &Path, branch_label: &str) -> PathBuf {
    work_dir.join(format!("generated-{branch_label}.json"))
}

/// Load a branch's records. Malformed JSON is a hard error: silently
/// dropping records would skew the correlation.
pub fn load_generated(path: &Path) -> Result<Vec<(KnownPattern, String)>, RunnerError> {
    let raw = std::fs::read_to_string(path)?;
    let records: Vec<GeneratedRecord> = serde_json::from_str(&raw)
        .map_err(|err| RunnerError::Persist(format!("{}: {}", path.display(), err)))?;
    Ok(records
        .into_iter()
        .map(|record| {
            let key = KnownPattern {
                pattern: record.pattern,
                options: record.options,
                count: record.count,
            };
            (key, record.text)
        })
        .collect())
}

/// Write a branch's records.
pub fn save_generated(
    path: &Path,
    entries: &[(KnownPattern, String)],
) -> Result<(), RunnerError> {
    let records: Vec<GeneratedRecord> = entries
        .iter()
        .map(|(key, text)| GeneratedRecord {
            pattern: key.pattern.clone(),
            options: key.options,
            count: key.count,
            text: text.clone(),
        })
        .collect();
    let json = serde_json::to_string_pretty(&records)
        .map_err(|err| RunnerError::Persist(err.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}
