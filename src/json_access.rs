use crate::error::{CompileError, CompileResult};

/// Result of parsing a JSON access tail: the ordered path segments plus
/// whether the terminal access extracts text (`->>`) or stays JSON (`->`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonAccess {
    pub segments: Vec<String>,
    pub extract_text: bool,
}

/// Parses the substring of a field path starting at the first `->`.
///
/// Grammar:
/// ```text
/// access  := "->>" segment
///          | "->" segment ( "->" segment )* ( "->>" segment )?
/// segment := "'" [^']+ "'" | [0-9a-z_]+
/// ```
pub fn parse_json_access(input: &str) -> CompileResult<JsonAccess> {
    let bytes = input.as_bytes();
    let mut pos = 0usize;
    let mut segments = Vec::new();
    let mut extract_text = false;

    loop {
        if !input[pos..].starts_with("->") {
            return Err(CompileError::InvalidJsonAccessFormat(input.to_string()));
        }
        pos += 2;
        let is_extract = bytes.get(pos) == Some(&b'>');
        if is_extract {
            pos += 1;
        }

        let (segment, consumed) = parse_segment(&input[pos..], input)?;
        pos += consumed;
        segments.push(segment);
        extract_text = is_extract;

        if pos >= input.len() {
            break;
        }
        if !input[pos..].starts_with("->") {
            return Err(CompileError::InvalidJsonAccessFormat(input.to_string()));
        }
        if is_extract {
            // `->>` must be the terminal access; anything after it is a
            // grammar error.
            return Err(CompileError::InvalidJsonAccessFormat(input.to_string()));
        }
    }

    if segments.is_empty() {
        return Err(CompileError::InvalidJsonAccessFormat(input.to_string()));
    }

    Ok(JsonAccess {
        segments,
        extract_text,
    })
}

fn parse_segment<'a>(rest: &'a str, whole: &str) -> CompileResult<(String, usize)> {
    if let Some(stripped) = rest.strip_prefix('\'') {
        match stripped.find('\'') {
            Some(end) => {
                let content = &stripped[..end];
                if content.is_empty() {
                    return Err(CompileError::InvalidJsonAccessFormat(whole.to_string()));
                }
                Ok((content.to_string(), end + 2))
            }
            None => Err(CompileError::InvalidJsonAccessQuote(whole.to_string())),
        }
    } else {
        let end = rest
            .find(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(CompileError::InvalidJsonAccessFormat(whole.to_string()));
        }
        Ok((rest[..end].to_string(), end))
    }
}

/// Re-emit a path string from segments and the extract-text flag, the
/// inverse of `parse_json_access` used by the round-trip property test.
pub fn emit_json_access(segments: &[String], extract_text: bool) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        let op = if is_last && extract_text { "->>" } else { "->" };
        out.push_str(op);
        if seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            out.push_str(seg);
        } else {
            out.push('\'');
            out.push_str(seg);
            out.push('\'');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_text_extract() {
        let r = parse_json_access("->>region").unwrap();
        assert_eq!(r.segments, vec!["region".to_string()]);
        assert!(r.extract_text);
    }

    #[test]
    fn single_json_access() {
        let r = parse_json_access("->category").unwrap();
        assert_eq!(r.segments, vec!["category".to_string()]);
        assert!(!r.extract_text);
    }

    #[test]
    fn chained_access_with_trailing_extract() {
        let r = parse_json_access("->'a'->'b'->>c").unwrap();
        assert_eq!(r.segments, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert!(r.extract_text);
    }

    #[test]
    fn unterminated_quote_errors() {
        let err = parse_json_access("->'abc").unwrap_err();
        assert_eq!(err, CompileError::InvalidJsonAccessQuote("->'abc".to_string()));
    }

    #[test]
    fn empty_quoted_segment_errors() {
        let err = parse_json_access("->''").unwrap_err();
        assert!(matches!(err, CompileError::InvalidJsonAccessFormat(_)));
    }

    #[test]
    fn extract_not_terminal_errors() {
        let err = parse_json_access("->>a->b").unwrap_err();
        assert!(matches!(err, CompileError::InvalidJsonAccessFormat(_)));
    }

    #[test]
    fn round_trips_through_emit() {
        for (input, segs, extract) in [
            ("->>region", vec!["region"], true),
            ("->'category'", vec!["category"], false),
            ("->a->'b'->>c", vec!["a", "b", "c"], true),
        ] {
            let parsed = parse_json_access(input).unwrap();
            assert_eq!(parsed.extract_text, extract);
            let segs: Vec<String> = segs.into_iter().map(String::from).collect();
            assert_eq!(parsed.segments, segs);
            let reparsed = parse_json_access(&emit_json_access(&parsed.segments, parsed.extract_text)).unwrap();
            assert_eq!(reparsed, parsed);
        }
    }
}
