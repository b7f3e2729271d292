//! Correlates baseline/candidate generated output and computes diffs.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tracing::warn;

use crate::diff::literals::{self, ExtractedLiteral};

/// Correlation key identifying one input sample across both revisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnownPattern {
    pub pattern: String,
    pub options: u32,
    pub count: u64,
}

/// One correlated baseline/candidate pair.
///
/// Diff fields and literal lists are populated during collection and are
/// read-only afterwards; they are set if and only if the two texts differ.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub pattern: KnownPattern,
    pub base_text: String,
    pub new_text: String,
    pub short_diff: Option<String>,
    pub full_diff: Option<String>,
    pub base_literals: Vec<ExtractedLiteral>,
    pub new_literals: Vec<ExtractedLiteral>,
}

impl DiffEntry {
    pub fn changed(&self) -> bool {
        self.short_diff.is_some()
    }
}

/// Indentation stripping kicks in above this depth.
const INDENT_STRIP_THRESHOLD: usize = 4;
/// Indentation preserved after stripping.
const INDENT_STRIP_MARGIN: usize = 2;
/// Context lines in the short diff.
const SHORT_CONTEXT: usize = 1;
/// Context lines in the full diff: effectively the whole text.
const FULL_CONTEXT: usize = 100_000;

pub struct DiffCollector;

impl DiffCollector {
    /// Correlate two generated-output mappings into ordered diff entries.
    ///
    /// Entries present in both inputs are kept, ordered by descending
    /// usage count with ties stable in baseline input order. Duplicate
    /// patterns collapse (first occurrence wins) before correlation.
    pub fn correlate(
        baseline: Vec<(KnownPattern, String)>,
        candidate: Vec<(KnownPattern, String)>,
    ) -> Vec<DiffEntry> {
        let mut candidate_texts: HashMap<KnownPattern, String> =
            HashMap::with_capacity(candidate.len());
        for (pattern, text) in candidate {
            candidate_texts.entry(pattern).or_insert(text);
        }

        let mut seen: HashSet<KnownPattern> = HashSet::new();
        let mut entries: Vec<DiffEntry> = Vec::new();
        for (pattern, base_text) in baseline {
            if !seen.insert(pattern.clone()) {
                continue;
            }
            let Some(new_text) = candidate_texts.get(&pattern) else {
                continue;
            };
            let mut entry = DiffEntry {
                pattern,
                base_text,
                new_text: new_text.clone(),
                short_diff: None,
                full_diff: None,
                base_literals: Vec::new(),
                new_literals: Vec::new(),
            };
            if blake3::hash(entry.base_text.as_bytes()) != blake3::hash(entry.new_text.as_bytes())
            {
                compute_diffs(&mut entry);
            }
            entries.push(entry);
        }

        // Stable sort keeps input order for equal counts.
        entries.sort_by(|a, b| b.pattern.count.cmp(&a.pattern.count));
        entries
    }

    /// Extract literal declarations for every changed entry, fanned out
    /// across blocking tasks. A failure on one entry is logged and leaves
    /// that entry's lists empty; the rest of the batch is unaffected, and
    /// entry order never changes.
    pub async fn extract_literals(entries: &mut [DiffEntry]) {
        let jobs: Vec<(usize, String, String)> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.changed())
            .map(|(idx, entry)| (idx, entry.base_text.clone(), entry.new_text.clone()))
            .collect();

        let tasks = jobs.into_iter().map(|(idx, base, new)| {
            tokio::task::spawn_blocking(move || {
                let base = literals::extract_search_values(&base);
                let new = literals::extract_search_values(&new);
                (idx, base, new)
            })
        });

        for joined in join_all(tasks).await {
            let Ok((idx, base, new)) = joined else {
                continue;
            };
            let pattern = entries[idx].pattern.pattern.clone();
            match base {
                Ok(list) => entries[idx].base_literals = list,
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "baseline literal extraction failed");
                }
            }
            match new {
                Ok(list) => entries[idx].new_literals = list,
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "candidate literal extraction failed");
                }
            }
        }
    }
}

fn compute_diffs(entry: &mut DiffEntry) {
    let diff = TextDiff::from_lines(entry.base_text.as_str(), entry.new_text.as_str());
    let full = diff
        .unified_diff()
        .context_radius(FULL_CONTEXT)
        .to_string();
    let short = diff
        .unified_diff()
        .context_radius(SHORT_CONTEXT)
        .to_string();
    entry.full_diff = Some(full);
    entry.short_diff = Some(normalize_indentation(&short));
}

/// Uniformly strips deep common indentation from a unified diff body so
/// report space is not wasted on generated-code nesting. The `+`/`-`/` `
/// marker stays the first character of every line; hunk headers pass
/// through untouched.
fn normalize_indentation(diff: &str) -> String {
    let mut min_indent: Option<usize> = None;
    for line in diff.lines() {
        let Some((_, body)) = split_marker(line) else {
            continue;
        };
        if body.trim().is_empty() {
            continue;
        }
        let indent = body.len() - body.trim_start_matches(' ').len();
        min_indent = Some(min_indent.map_or(indent, |m| m.min(indent)));
    }
    let Some(min_indent) = min_indent else {
        return diff.to_string();
    };
    if min_indent <= INDENT_STRIP_THRESHOLD {
        return diff.to_string();
    }

    let strip = min_indent - INDENT_STRIP_MARGIN;
    let mut out = String::with_capacity(diff.len());
    for line in diff.lines() {
        match split_marker(line) {
            Some((marker, body)) if !body.trim().is_empty() => {
                out.push(marker);
                out.push_str(&body[strip..]);
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

fn split_marker(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    match chars.next() {
        Some(marker @ ('+' | '-' | ' ')) => Some((marker, chars.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(text: &str, count: u64) -> KnownPattern {
        KnownPattern {
            pattern: text.to_string(),
            options: 0,
            count,
        }
    }

    #[test]
    fn test_intersection_order_and_diff_population() {
        // The scenario from the design: `abc` unchanged, `x+y` changed.
        let baseline = vec![
            (pattern("abc", 10), "shared body\n".to_string()),
            (pattern("x+y", 5), "old body\n".to_string()),
        ];
        let candidate = vec![
            (pattern("x+y", 5), "new body\n".to_string()),
            (pattern("abc", 10), "shared body\n".to_string()),
        ];

        let entries = DiffCollector::correlate(baseline, candidate);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pattern.pattern, "abc");
        assert_eq!(entries[1].pattern.pattern, "x+y");

        assert!(!entries[0].changed());
        assert!(entries[0].full_diff.is_none());
        assert!(entries[1].changed());
        assert!(entries[1].full_diff.is_some());
    }

    #[test]
    fn test_entries_missing_from_one_side_are_dropped() {
        let baseline = vec![
            (pattern("both", 1), "a\n".to_string()),
            (pattern("baseline-only", 9), "b\n".to_string()),
        ];
        let candidate = vec![
            (pattern("both", 1), "a\n".to_string()),
            (pattern("candidate-only", 9), "c\n".to_string()),
        ];
        let entries = DiffCollector::correlate(baseline, candidate);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pattern.pattern, "both");
    }

    #[test]
    fn test_duplicates_collapse_before_correlation() {
        let baseline = vec![
            (pattern("dup", 3), "first\n".to_string()),
            (pattern("dup", 3), "second\n".to_string()),
        ];
        let candidate = vec![(pattern("dup", 3), "first\n".to_string())];
        let entries = DiffCollector::correlate(baseline, candidate);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].changed());
    }

    #[test]
    fn test_sort_is_by_count_desc_with_stable_ties() {
        let baseline = vec![
            (pattern("low", 1), String::new()),
            (pattern("tie-a", 7), String::new()),
            (pattern("tie-b", 7), String::new()),
            (pattern("high", 20), String::new()),
        ];
        let candidate = baseline.clone();
        let entries = DiffCollector::correlate(baseline, candidate);
        let order: Vec<&str> = entries.iter().map(|e| e.pattern.pattern.as_str()).collect();
        assert_eq!(order, ["high", "tie-a", "tie-b", "low"]);
    }

    #[test]
    fn test_deep_indentation_is_stripped_from_short_diff() {
        let base = "        if (x)\n        {\n            old();\n        }\n";
        let new = "        if (x)\n        {\n            new();\n        }\n";
        let baseline = vec![(pattern("p", 1), base.to_string())];
        let candidate = vec![(pattern("p", 1), new.to_string())];
        let entries = DiffCollector::correlate(baseline, candidate);
        let short = entries[0].short_diff.as_deref().unwrap();

        // Min indent was 8, so bodies are shifted left until the
        // shallowest line keeps exactly the 2-space margin.
        let min = short
            .lines()
            .filter_map(split_marker)
            .filter(|(_, body)| !body.trim().is_empty())
            .map(|(_, body)| body.len() - body.trim_start_matches(' ').len())
            .min()
            .unwrap();
        assert_eq!(min, 2);
        assert!(short.contains("old();"));
        // Marker stays first.
        assert!(short.lines().any(|l| l.starts_with('-')));
        assert!(short.lines().any(|l| l.starts_with('+')));
    }

    #[test]
    fn test_shallow_indentation_is_left_alone() {
        let base = "  a();\n  old();\n";
        let new = "  a();\n  new();\n";
        let entries = DiffCollector::correlate(
            vec![(pattern("p", 1), base.to_string())],
            vec![(pattern("p", 1), new.to_string())],
        );
        let short = entries[0].short_diff.as_deref().unwrap();
        assert!(short.contains("-  old();"));
        assert!(short.contains("+  new();"));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_entry_without_aborting_batch() {
        let good_text = "static class Utilities\nSearchValues.Create(\"ok\");\n";
        let bad_text = "static class Utilities\nSearchValues.Create(oops);\n";
        let mut entries = DiffCollector::correlate(
            vec![
                (pattern("good", 2), "old\n".to_string()),
                (pattern("bad", 1), "old\n".to_string()),
            ],
            vec![
                (pattern("good", 2), good_text.to_string()),
                (pattern("bad", 1), bad_text.to_string()),
            ],
        );
        DiffCollector::extract_literals(&mut entries).await;

        assert_eq!(
            entries[0].new_literals,
            vec![ExtractedLiteral::Chars("ok".to_string())]
        );
        // The bad entry is skipped, not fatal; its order is unchanged.
        assert!(entries[1].new_literals.is_empty());
        assert_eq!(entries[1].pattern.pattern, "bad");
    }

    #[tokio::test]
    async fn test_unchanged_entries_are_not_scanned() {
        let text = "static class Utilities\nSearchValues.Create(\"same\");\n";
        let mut entries = DiffCollector::correlate(
            vec![(pattern("same", 1), text.to_string())],
            vec![(pattern("same", 1), text.to_string())],
        );
        DiffCollector::extract_literals(&mut entries).await;
        assert!(entries[0].base_literals.is_empty());
        assert!(entries[0].new_literals.is_empty());
    }
}
