//! Scrapes `SearchValues` declarations out of generated source text.
//!
//! This is a line-oriented recognizer over one generator's exact output
//! shape, not a general parser. A construct that looks like a recognized
//! declaration but does not parse is an error, never a silent skip —
//! silently misreading generated code would corrupt report content
//! without detection. Keep this module isolated so it can be replaced
//! wholesale if the generator's output format changes.

use crate::errors::RunnerError;

/// Marker opening the helper region that holds the declarations. Absent
/// when the generated code uses no search values.
const UTILITIES_MARKER: &str = "static class Utilities";
const CREATE_PREFIX: &str = "SearchValues.Create(";
const COMPARISON_PREFIX: &str = "StringComparison.";

/// Comparison mode carried by multi-value declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringComparison {
    CurrentCulture,
    CurrentCultureIgnoreCase,
    InvariantCulture,
    InvariantCultureIgnoreCase,
    Ordinal,
    OrdinalIgnoreCase,
}

impl StringComparison {
    fn parse(name: &str) -> Result<Self, RunnerError> {
        match name {
            "CurrentCulture" => Ok(Self::CurrentCulture),
            "CurrentCultureIgnoreCase" => Ok(Self::CurrentCultureIgnoreCase),
            "InvariantCulture" => Ok(Self::InvariantCulture),
            "InvariantCultureIgnoreCase" => Ok(Self::InvariantCultureIgnoreCase),
            "Ordinal" => Ok(Self::Ordinal),
            "OrdinalIgnoreCase" => Ok(Self::OrdinalIgnoreCase),
            other => Err(RunnerError::LiteralParse(format!(
                "unknown comparison mode: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for StringComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CurrentCulture => "CurrentCulture",
            Self::CurrentCultureIgnoreCase => "CurrentCultureIgnoreCase",
            Self::InvariantCulture => "InvariantCulture",
            Self::InvariantCultureIgnoreCase => "InvariantCultureIgnoreCase",
            Self::Ordinal => "Ordinal",
            Self::OrdinalIgnoreCase => "OrdinalIgnoreCase",
        };
        write!(f, "{name}")
    }
}

/// One extracted declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedLiteral {
    /// Single-value construct: a set of characters.
    Chars(String),
    /// Multi-value construct with a comparison mode.
    Strings {
        values: Vec<String>,
        comparison: StringComparison,
    },
}

/// Scan generated source for `SearchValues.Create` declarations.
///
/// Returns an empty list when the marker region is absent. Any line that
/// contains the declaration prefix but does not parse is a hard error.
pub fn extract_search_values(text: &str) -> Result<Vec<ExtractedLiteral>, RunnerError> {
    let Some(marker) = text.find(UTILITIES_MARKER) else {
        return Ok(Vec::new());
    };
    let mut found = Vec::new();
    for line in text[marker..].lines() {
        let Some(start) = line.find(CREATE_PREFIX) else {
            continue;
        };
        found.push(parse_create_args(&line[start + CREATE_PREFIX.len()..])?);
    }
    Ok(found)
}

fn parse_create_args(args: &str) -> Result<ExtractedLiteral, RunnerError> {
    let rest = args.trim_start();
    if rest.starts_with('"') {
        let (value, after) = parse_quoted(rest)?;
        if !after.trim_start().starts_with(')') {
            return Err(RunnerError::LiteralParse(format!(
                "expected ')' after character literal, found: {after}"
            )));
        }
        return Ok(ExtractedLiteral::Chars(value));
    }
    let Some(list) = rest.strip_prefix('[') else {
        return Err(RunnerError::LiteralParse(format!(
            "unrecognized SearchValues.Create argument: {rest}"
        )));
    };

    let mut values = Vec::new();
    let mut cursor = list.trim_start();
    loop {
        if let Some(after) = cursor.strip_prefix(']') {
            cursor = after;
            break;
        }
        let (value, after) = parse_quoted(cursor)?;
        values.push(value);
        cursor = after.trim_start();
        if let Some(after) = cursor.strip_prefix(',') {
            cursor = after.trim_start();
        } else if !cursor.starts_with(']') {
            return Err(RunnerError::LiteralParse(format!(
                "expected ',' or ']' in value list, found: {cursor}"
            )));
        }
    }

    let cursor = cursor.trim_start();
    let Some(after_comma) = cursor.strip_prefix(',') else {
        return Err(RunnerError::LiteralParse(format!(
            "expected comparison mode after value list, found: {cursor}"
        )));
    };
    let after_comma = after_comma.trim_start();
    let Some(mode) = after_comma.strip_prefix(COMPARISON_PREFIX) else {
        return Err(RunnerError::LiteralParse(format!(
            "expected {COMPARISON_PREFIX} enumerator, found: {after_comma}"
        )));
    };
    let end = mode
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(mode.len());
    let comparison = StringComparison::parse(&mode[..end])?;
    if !mode[end..].trim_start().starts_with(')') {
        return Err(RunnerError::LiteralParse(format!(
            "expected ')' after comparison mode, found: {}",
            &mode[end..]
        )));
    }
    Ok(ExtractedLiteral::Strings { values, comparison })
}

/// Parse a double-quoted literal, returning the decoded value and the
/// rest of the input after the closing quote.
fn parse_quoted(input: &str) -> Result<(String, &str), RunnerError> {
    let Some(inner) = input.strip_prefix('"') else {
        return Err(RunnerError::LiteralParse(format!(
            "expected '\"', found: {input}"
        )));
    };
    let mut value = String::new();
    let mut chars = inner.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &inner[idx + c.len_utf8()..])),
            '\\' => {
                let Some((_, esc)) = chars.next() else {
                    return Err(RunnerError::LiteralParse(
                        "dangling escape at end of literal".to_string(),
                    ));
                };
                value.push(decode_escape(esc, &mut chars)?);
            }
            other => value.push(other),
        }
    }
    Err(RunnerError::LiteralParse(
        "unterminated string literal".to_string(),
    ))
}

/// Decode a bare escaped string through the same grammar as the quoted
/// literals. Used by tests and for round-tripping display values.
pub fn decode_literal(escaped: &str) -> Result<String, RunnerError> {
    let mut value = String::with_capacity(escaped.len());
    let mut chars = escaped.char_indices();
    while let Some((_, c)) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        let Some((_, esc)) = chars.next() else {
            return Err(RunnerError::LiteralParse(
                "dangling escape at end of literal".to_string(),
            ));
        };
        value.push(decode_escape(esc, &mut chars)?);
    }
    Ok(value)
}

fn decode_escape(
    esc: char,
    chars: &mut std::str::CharIndices<'_>,
) -> Result<char, RunnerError> {
    Ok(match esc {
        '"' => '"',
        'a' => '\u{0007}',
        'b' => '\u{0008}',
        'v' => '\u{000B}',
        't' => '\t',
        'n' => '\n',
        'f' => '\u{000C}',
        'r' => '\r',
        'e' => '\u{001B}',
        '\\' => '\\',
        '0' => '\0',
        'u' => {
            let mut code = 0u32;
            for _ in 0..4 {
                let Some((_, digit)) = chars.next() else {
                    return Err(RunnerError::LiteralParse(
                        "truncated \\u escape".to_string(),
                    ));
                };
                let nibble = digit.to_digit(16).ok_or_else(|| {
                    RunnerError::LiteralParse(format!("invalid hex digit in \\u escape: {digit}"))
                })?;
                code = code * 16 + nibble;
            }
            char::from_u32(code).ok_or_else(|| {
                RunnerError::LiteralParse(format!("\\u{code:04x} is not a scalar value"))
            })?
        }
        other => {
            return Err(RunnerError::LiteralParse(format!(
                "unrecognized escape: \\{other}"
            )));
        }
    })
}

/// Encode a string through the same escape grammar, for display.
pub fn encode_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0007}' => out.push_str("\\a"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000B}' => out.push_str("\\v"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{000C}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            '\u{001B}' => out.push_str("\\e"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GENERATED: &str = r#"
        // <auto-generated/>
        private bool TryMatchAtCurrentPosition(ReadOnlySpan<char> inputSpan)
        {
            // matching body elided
        }

        file static class Utilities
        {
            internal static readonly SearchValues<char> s_ascii = SearchValues.Create("abc\t\n");
            internal static readonly SearchValues<string> s_words = SearchValues.Create(["foo", "bar\t"], StringComparison.OrdinalIgnoreCase);
        }
    "#;

    #[test]
    fn test_extracts_both_declaration_shapes() {
        let found = extract_search_values(GENERATED).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], ExtractedLiteral::Chars("abc\t\n".to_string()));
        assert_eq!(
            found[1],
            ExtractedLiteral::Strings {
                values: vec!["foo".to_string(), "bar\t".to_string()],
                comparison: StringComparison::OrdinalIgnoreCase,
            }
        );
    }

    #[test]
    fn test_no_marker_region_means_no_literals() {
        let found = extract_search_values("no helpers generated here").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_declarations_before_marker_are_ignored() {
        let text = "SearchValues.Create(!!!)\nfile static class Utilities\n";
        assert!(extract_search_values(text).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_declaration_is_a_hard_error() {
        let text = "static class Utilities\nSearchValues.Create(42);\n";
        let err = extract_search_values(text).unwrap_err();
        assert!(matches!(err, RunnerError::LiteralParse(_)));
    }

    #[test]
    fn test_unknown_comparison_mode_is_a_hard_error() {
        let text =
            "static class Utilities\nSearchValues.Create([\"x\"], StringComparison.Fancy);\n";
        assert!(extract_search_values(text).is_err());
    }

    #[test]
    fn test_unterminated_literal_is_a_hard_error() {
        let text = "static class Utilities\nSearchValues.Create(\"oops);\n";
        assert!(extract_search_values(text).is_err());
    }

    #[test]
    fn test_decode_known_escapes() {
        assert_eq!(
            decode_literal("a\\tb\\nc\\\\d\\\"e\\0f\\u0041").unwrap(),
            "a\tb\nc\\d\"e\0fA"
        );
        assert_eq!(decode_literal("\\a\\b\\v\\f\\r\\e").unwrap(), "\u{7}\u{8}\u{b}\u{c}\r\u{1b}");
    }

    #[test]
    fn test_unrecognized_escape_is_rejected() {
        let err = decode_literal("oops\\q").unwrap_err();
        assert!(matches!(err, RunnerError::LiteralParse(msg) if msg.contains("\\q")));
    }

    #[test]
    fn test_surrogate_code_unit_is_rejected() {
        assert!(decode_literal("\\ud800").unwrap_err().to_string().contains("scalar"));
    }

    #[test]
    fn test_truncated_unicode_escape_is_rejected() {
        assert!(decode_literal("\\u00").is_err());
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trips(s in any::<String>()) {
            prop_assert_eq!(decode_literal(&encode_literal(&s)).unwrap(), s);
        }
    }
}
