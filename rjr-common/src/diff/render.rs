//! Length-budgeted markdown rendering of diff entries.
//!
//! The destination channels impose two fixed size limits: a comment-style
//! channel and a roomier gist-style channel. Blocks are appended greedily
//! and whole: a block that would push the render past its budget is never
//! partially emitted.

use crate::diff::collect::DiffEntry;
use crate::diff::literals::encode_literal;

/// Byte budget for the comment-style channel.
pub const COMMENT_LENGTH_LIMIT: usize = 65_536;
/// Byte budget for the gist-style channel.
pub const GIST_LENGTH_LIMIT: usize = 950_000;
/// Entry cap applied independently of size.
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;
/// Pattern literals longer than this are truncated for display.
const PATTERN_DISPLAY_LIMIT: usize = 50;

/// Known option flags, by bit.
const OPTION_FLAGS: &[(u32, &str)] = &[
    (0x0001, "IgnoreCase"),
    (0x0002, "Multiline"),
    (0x0004, "ExplicitCapture"),
    (0x0008, "Compiled"),
    (0x0010, "Singleline"),
    (0x0020, "IgnorePatternWhitespace"),
    (0x0040, "RightToLeft"),
    (0x0100, "ECMAScript"),
    (0x0200, "CultureInvariant"),
    (0x0400, "NonBacktracking"),
];

pub struct ReportRenderer {
    byte_budget: usize,
    max_entries: usize,
}

impl ReportRenderer {
    pub fn new(byte_budget: usize) -> Self {
        Self {
            byte_budget,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Render changed entries greedily until the next whole block would
    /// exceed the byte budget or the entry cap is reached.
    pub fn render(&self, entries: &[DiffEntry]) -> String {
        let mut out = String::new();
        let mut rendered = 0usize;
        for entry in entries {
            if rendered == self.max_entries {
                break;
            }
            let Some(diff) = entry.short_diff.as_deref() else {
                continue;
            };
            let block = render_block(entry, diff);
            if out.len() + block.len() > self.byte_budget {
                break;
            }
            out.push_str(&block);
            rendered += 1;
        }
        out
    }

    /// Render the two-tier pair. The second element is `None` when the
    /// short render already covers everything, i.e. no truncation
    /// occurred and a separate long upload would be redundant.
    pub fn render_tiers(entries: &[DiffEntry]) -> (String, Option<String>) {
        let short = Self::new(COMMENT_LENGTH_LIMIT).render(entries);
        let long = Self::new(GIST_LENGTH_LIMIT).render(entries);
        if long == short {
            (short, None)
        } else {
            (short, Some(long))
        }
    }
}

fn render_block(entry: &DiffEntry, diff: &str) -> String {
    let mut block = format!(
        "### `{}` ({}, used {} times)\n```diff\n",
        display_pattern(&entry.pattern.pattern),
        render_options(entry.pattern.options),
        entry.pattern.count,
    );
    block.push_str(diff);
    if !diff.ends_with('\n') {
        block.push('\n');
    }
    block.push_str("```\n\n");
    block
}

fn display_pattern(pattern: &str) -> String {
    let encoded = encode_literal(pattern);
    if encoded.chars().count() > PATTERN_DISPLAY_LIMIT {
        let truncated: String = encoded.chars().take(PATTERN_DISPLAY_LIMIT).collect();
        format!("{truncated}…")
    } else {
        encoded
    }
}

/// Render option flags symbolically when every set bit is known,
/// otherwise fall back to the raw number.
fn render_options(options: u32) -> String {
    if options == 0 {
        return "None".to_string();
    }
    let known = OPTION_FLAGS.iter().fold(0u32, |acc, (bit, _)| acc | bit);
    if options & !known != 0 {
        return options.to_string();
    }
    OPTION_FLAGS
        .iter()
        .filter(|(bit, _)| options & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::collect::KnownPattern;

    fn entry(pattern: &str, options: u32, count: u64, diff: Option<&str>) -> DiffEntry {
        DiffEntry {
            pattern: KnownPattern {
                pattern: pattern.to_string(),
                options,
                count,
            },
            base_text: String::new(),
            new_text: String::new(),
            short_diff: diff.map(str::to_string),
            full_diff: diff.map(str::to_string),
            base_literals: Vec::new(),
            new_literals: Vec::new(),
        }
    }

    #[test]
    fn test_render_never_exceeds_budget_and_is_boundary_tight() {
        let entries: Vec<DiffEntry> = (0..40)
            .map(|i| entry(&format!("p{i}"), 0, 40 - i, Some("-a\n+b\n")))
            .collect();
        let one_block = render_block(&entries[0], "-a\n+b\n").len();
        let budget = one_block * 3 + one_block / 2;
        let out = ReportRenderer::new(budget).render(&entries);

        assert!(out.len() <= budget);
        // Exactly three whole blocks fit; a fourth would have burst it.
        assert_eq!(out.matches("### ").count(), 3);
        let next_block = render_block(&entries[3], "-a\n+b\n");
        assert!(out.len() + next_block.len() > budget);
    }

    #[test]
    fn test_unchanged_entries_do_not_render() {
        let entries = vec![entry("quiet", 0, 5, None), entry("loud", 0, 1, Some("-x\n+y\n"))];
        let out = ReportRenderer::new(COMMENT_LENGTH_LIMIT).render(&entries);
        assert!(!out.contains("quiet"));
        assert!(out.contains("loud"));
    }

    #[test]
    fn test_max_entries_caps_independently_of_size() {
        let entries: Vec<DiffEntry> = (0..10)
            .map(|i| entry(&format!("p{i}"), 0, 10 - i, Some("-a\n+b\n")))
            .collect();
        let out = ReportRenderer::new(GIST_LENGTH_LIMIT)
            .with_max_entries(4)
            .render(&entries);
        assert_eq!(out.matches("### ").count(), 4);
    }

    #[test]
    fn test_tiers_match_when_nothing_truncated() {
        let entries = vec![entry("small", 0, 1, Some("-a\n+b\n"))];
        let (short, long) = ReportRenderer::render_tiers(&entries);
        assert!(long.is_none());
        assert!(short.contains("small"));
    }

    #[test]
    fn test_long_tier_extends_short_when_truncation_occurred() {
        // Each block is ~30 KiB, so the comment tier fits two blocks and
        // the gist tier fits all six.
        let big_diff = format!("-{}\n", "x".repeat(30 * 1024));
        let entries: Vec<DiffEntry> = (0..6)
            .map(|i| entry(&format!("p{i}"), 0, 6 - i, Some(big_diff.as_str())))
            .collect();
        let (short, long) = ReportRenderer::render_tiers(&entries);
        let long = long.expect("truncation must produce a long tier");
        assert!(short.len() <= COMMENT_LENGTH_LIMIT);
        assert!(long.len() <= GIST_LENGTH_LIMIT);
        assert!(long.len() > short.len());
        // Same leading entries: the short render is a prefix of the long.
        assert!(long.starts_with(&short));
    }

    #[test]
    fn test_pattern_display_truncates_and_escapes() {
        let long_pattern = "a".repeat(80);
        let e = entry(&long_pattern, 0, 1, Some("-a\n+b\n"));
        let out = ReportRenderer::new(COMMENT_LENGTH_LIMIT).render(&[e]);
        assert!(out.contains(&format!("{}…", "a".repeat(50))));

        let tabby = entry("tab\there", 0, 1, Some("-a\n+b\n"));
        let out = ReportRenderer::new(COMMENT_LENGTH_LIMIT).render(&[tabby]);
        assert!(out.contains("tab\\there"));
    }

    #[test]
    fn test_options_render_symbolically_or_numerically() {
        assert_eq!(render_options(0), "None");
        assert_eq!(render_options(0x0001), "IgnoreCase");
        assert_eq!(render_options(0x0003), "IgnoreCase | Multiline");
        // An unknown bit falls back to the raw number.
        assert_eq!(render_options(0x8000), "32768");
        assert_eq!(render_options(0x8001), "32769");
    }
}
