//! Splits device program text into its header block and program body.
//!
//! The controller frames the header with two marker comment lines. Both
//! markers live here so they are the single point of change.

/// Marker line that opens the header block.
pub const HEADER_BEGIN: &str = "# HEADER_BEGIN";
/// Marker line that closes the header block.
pub const HEADER_END: &str = "# HEADER_END";

/// Program text split into header (preamble) and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedProgram {
    /// Text from `HEADER_BEGIN` through the end of `HEADER_END`, or empty.
    pub preamble: String,
    /// Everything after the header, leading newlines stripped.
    pub body: String,
}

/// Split `text` into a [`ParsedProgram`].
///
/// Uses the first occurrence of each marker. When either marker is missing,
/// or the end marker comes before the begin marker, the whole text is the
/// body and the preamble is empty. Never fails.
pub fn parse(text: &str) -> ParsedProgram {
    match (text.find(HEADER_BEGIN), text.find(HEADER_END)) {
        (Some(start), Some(end)) if end > start => {
            let header_end = end + HEADER_END.len();
            ParsedProgram {
                preamble: text[start..header_end].to_string(),
                body: text[header_end..].trim_start_matches('\n').to_string(),
            }
        }
        _ => ParsedProgram {
            preamble: String::new(),
            body: text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_header_and_body() {
        let text = "# HEADER_BEGIN\nx=1\n# HEADER_END\ndef prog(): pass\nend_prog()\n";
        let parsed = parse(text);
        assert_eq!(parsed.preamble, "# HEADER_BEGIN\nx=1\n# HEADER_END");
        assert_eq!(parsed.body, "def prog(): pass\nend_prog()\n");
    }

    #[test]
    fn test_parse_strips_only_leading_newlines() {
        let text = "# HEADER_BEGIN\n# HEADER_END\n\n\n  movej(p)\n\n";
        let parsed = parse(text);
        assert_eq!(parsed.body, "  movej(p)\n\n");
    }

    #[test]
    fn test_parse_ignores_text_before_begin_marker() {
        let text = "junk\n# HEADER_BEGIN\nh\n# HEADER_END\nbody";
        let parsed = parse(text);
        assert_eq!(parsed.preamble, "# HEADER_BEGIN\nh\n# HEADER_END");
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn test_parse_reconstructs_suffix_from_begin_marker() {
        let text = "pre\n# HEADER_BEGIN\na\n# HEADER_END\n\nrest\n";
        let parsed = parse(text);
        let start = text.find(HEADER_BEGIN).unwrap();
        let after_header = &text[start + parsed.preamble.len()..];
        let stripped = after_header.len() - after_header.trim_start_matches('\n').len();
        let rebuilt = format!("{}{}{}", parsed.preamble, "\n".repeat(stripped), parsed.body);
        assert_eq!(rebuilt, &text[start..]);
    }

    #[test]
    fn test_parse_without_markers_returns_whole_text() {
        let text = "def prog():\n  pass\nend\n";
        let parsed = parse(text);
        assert_eq!(parsed.preamble, "");
        assert_eq!(parsed.body, text);
    }

    #[test]
    fn test_parse_missing_end_marker() {
        let text = "# HEADER_BEGIN\nx=1\n\nprog";
        let parsed = parse(text);
        assert!(parsed.preamble.is_empty());
        assert_eq!(parsed.body, text);
    }

    #[test]
    fn test_parse_missing_begin_marker() {
        let text = "x=1\n# HEADER_END\nprog";
        let parsed = parse(text);
        assert!(parsed.preamble.is_empty());
        assert_eq!(parsed.body, text);
    }

    #[test]
    fn test_parse_end_before_begin_falls_back() {
        let text = "# HEADER_END\nprog\n# HEADER_BEGIN\n";
        let parsed = parse(text);
        assert!(parsed.preamble.is_empty());
        assert_eq!(parsed.body, text);
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse(""), ParsedProgram::default());
    }

    #[test]
    fn test_parse_header_only() {
        let parsed = parse("# HEADER_BEGIN\n# HEADER_END");
        assert_eq!(parsed.preamble, "# HEADER_BEGIN\n# HEADER_END");
        assert_eq!(parsed.body, "");
    }
}
