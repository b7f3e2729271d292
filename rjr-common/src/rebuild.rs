//! Incremental rebuild decision for two-way comparison jobs.
//!
//! Classifies the changed paths between the baseline and candidate
//! revisions to decide which components the candidate build can skip.
//! The baseline always rebuilds everything; this policy only trims the
//! candidate side. It is deterministic and side-effect-free, and a path
//! no rule recognizes marks *both* components affected — an unnecessary
//! rebuild is acceptable, a missed one is not.

/// Minimal rebuild target set for the candidate revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildPlan {
    pub runtime: bool,
    pub libraries: bool,
}

impl RebuildPlan {
    pub fn everything() -> Self {
        Self {
            runtime: true,
            libraries: true,
        }
    }

    /// Classify every changed path into the components it affects.
    pub fn from_changed_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut plan = Self::default();
        for path in paths {
            let path = path.trim().replace('\\', "/");
            if path.is_empty() {
                continue;
            }
            match classify(&path) {
                PathClass::Runtime => plan.runtime = true,
                PathClass::Libraries => plan.libraries = true,
                PathClass::Neither => {}
                PathClass::Unknown => {
                    plan.runtime = true;
                    plan.libraries = true;
                }
            }
        }
        plan
    }

    pub fn rebuild_nothing(&self) -> bool {
        !self.runtime && !self.libraries
    }
}

enum PathClass {
    Runtime,
    Libraries,
    Neither,
    Unknown,
}

const RUNTIME_PREFIXES: &[&str] = &["src/coreclr/", "src/native/"];
const LIBRARY_PREFIXES: &[&str] = &["src/libraries/"];
const EXCLUDED_PREFIXES: &[&str] = &["src/tests/"];
const EXCLUDED_SUBSTRINGS: &[&str] = &["/tests/"];

fn classify(path: &str) -> PathClass {
    if EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
        || EXCLUDED_SUBSTRINGS.iter().any(|s| path.contains(s))
    {
        return PathClass::Neither;
    }
    if RUNTIME_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return PathClass::Runtime;
    }
    if LIBRARY_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return PathClass::Libraries;
    }
    PathClass::Unknown
}
