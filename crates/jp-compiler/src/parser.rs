//! Path Grammar Parser
//!
//! Turns the space-separated path strings of a scriptlet rule into
//! [`PathDescriptor`]s:
//!
//! ```text
//! entries  := entry (' '+ entry)*
//! entry    := token ('.' token)* ('.' '[=]' '.' payload)?
//! token    := '*' | '[]' | '{-}' | '[-]' | name
//! payload  := 'true' | 'false' | 'null' | number | '/' regex '/' flags | text
//! ```
//!
//! A `\` escapes the next character in names and text payloads. Spaces inside
//! a `/.../` regex do not split entries. Malformed entries are never rejected;
//! they degrade to a plain literal path.

use jp_core::types::{regex_literal, CompiledRule, MatchValue, PathDescriptor, PatternError, Segment};

/// Parse a raw path string into descriptors. Empty input yields no descriptors.
pub fn parse_paths(raw: &str) -> Vec<PathDescriptor> {
    let mut lexer = EntryLexer::new(raw);
    let mut descriptors = Vec::new();
    while let Some(entry) = lexer.next_entry() {
        descriptors.push(parse_entry(entry));
    }
    descriptors
}

/// Compile the three string arguments of a pruning scriptlet.
pub fn compile_rule(prune_paths: &str, required_paths: &str, stack_pattern: &str) -> CompiledRule {
    let stack_pattern = stack_pattern.trim();
    CompiledRule {
        prune_paths: parse_paths(prune_paths),
        required_paths: parse_paths(required_paths),
        stack_pattern: (!stack_pattern.is_empty()).then(|| stack_pattern.to_string()),
    }
}

// =============================================================================
// Entry splitting
// =============================================================================

struct EntryLexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> EntryLexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn next_entry(&mut self) -> Option<&'a str> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] == b' ' {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' => break,
                b'\\' => self.pos += 2,
                // A slash opening a token starts a regex literal if it is closed
                b'/' if self.pos == start || bytes[self.pos - 1] == b'.' => {
                    self.pos = match closing_slash(self.src, self.pos) {
                        Some(end) => end + 1,
                        None => self.pos + 1,
                    };
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(bytes.len());

        Some(&self.src[start..self.pos])
    }
}

/// Position of the first unescaped `/` after `open`.
fn closing_slash(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'/' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

// =============================================================================
// Entry parsing
// =============================================================================

struct Tokens<'a> {
    entry: &'a str,
    pos: Option<usize>,
}

impl<'a> Tokens<'a> {
    fn new(entry: &'a str) -> Self {
        Self {
            entry,
            pos: Some(0),
        }
    }

    /// Next token up to an unescaped `.`.
    fn next_token(&mut self) -> Option<&'a str> {
        let start = self.pos?;
        let bytes = self.entry.as_bytes();
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'.' => {
                    self.pos = Some(i + 1);
                    return Some(&self.entry[start..i]);
                }
                _ => i += 1,
            }
        }
        self.pos = None;
        Some(&self.entry[start..])
    }

    /// Everything after the current token, unsplit.
    fn rest(&mut self) -> Option<&'a str> {
        let start = self.pos.take()?;
        Some(&self.entry[start..])
    }
}

fn parse_entry(entry: &str) -> PathDescriptor {
    let mut tokens = Tokens::new(entry);
    let mut segments = Vec::new();

    while let Some(token) = tokens.next_token() {
        let segment = match token {
            "*" => Segment::Wildcard,
            "[]" => Segment::ArrayWildcard,
            "{-}" => Segment::ObjectDeleteMarker,
            "[-]" => Segment::ArrayDeleteMarker,
            "[=]" => {
                let payload = match tokens.rest() {
                    Some(payload) if !payload.is_empty() => payload,
                    _ => {
                        log::warn!("Dangling [=] in path '{entry}', treating it as a literal path");
                        return literal_descriptor(entry);
                    }
                };
                return match parse_match_value(payload) {
                    Ok(value) => PathDescriptor::with_match_value(segments, value),
                    Err(e) => {
                        log::warn!("{e} in path '{entry}', treating it as a literal path");
                        literal_descriptor(entry)
                    }
                };
            }
            name => Segment::Literal(unescape(name)),
        };
        segments.push(segment);
    }

    PathDescriptor::new(segments)
}

/// Degraded form of an entry: every token is a plain key.
fn literal_descriptor(entry: &str) -> PathDescriptor {
    let mut tokens = Tokens::new(entry);
    let mut segments = Vec::new();
    while let Some(token) = tokens.next_token() {
        segments.push(Segment::Literal(unescape(token)));
    }
    PathDescriptor::new(segments)
}

// =============================================================================
// Payload coercion
// =============================================================================

/// Coerce the text after `[=].` into a match payload.
pub fn parse_match_value(payload: &str) -> Result<MatchValue, PatternError> {
    match payload {
        "true" => return Ok(MatchValue::Bool(true)),
        "false" => return Ok(MatchValue::Bool(false)),
        "null" => return Ok(MatchValue::Null),
        _ => {}
    }

    if is_decimal(payload) {
        if let Ok(n) = payload.parse::<f64>() {
            return Ok(MatchValue::Number(n));
        }
    }

    if let Some((body, flags)) = regex_literal(payload)? {
        return MatchValue::regex(body, flags);
    }

    Ok(MatchValue::String(unescape(payload)))
}

/// `^-?\d+(\.\d+)?$`
fn is_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.map_or(true, all_digits)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(name: &str) -> Segment {
        Segment::Literal(name.to_string())
    }

    #[test]
    fn empty_input() {
        assert!(parse_paths("").is_empty());
        assert!(parse_paths("   ").is_empty());
    }

    #[test]
    fn splits_on_spaces() {
        let paths = parse_paths("a.b   c  d.*.e");
        assert_eq!(
            paths,
            vec![
                PathDescriptor::new(vec![lit("a"), lit("b")]),
                PathDescriptor::new(vec![lit("c")]),
                PathDescriptor::new(vec![lit("d"), Segment::Wildcard, lit("e")]),
            ]
        );
    }

    #[test]
    fn maps_marker_tokens() {
        let paths = parse_paths("a.[].b c.{-}.d e.[-].f");
        assert_eq!(paths[0].segments, vec![lit("a"), Segment::ArrayWildcard, lit("b")]);
        assert_eq!(paths[1].segments, vec![lit("c"), Segment::ObjectDeleteMarker, lit("d")]);
        assert_eq!(paths[2].segments, vec![lit("e"), Segment::ArrayDeleteMarker, lit("f")]);
        assert!(paths.iter().all(|p| p.match_value.is_none()));
    }

    #[test]
    fn equality_payload_coercion() {
        let paths = parse_paths("a.[=].3 b.[=].-1.5 c.[=].true d.[=].false e.[=].null f.[=].ad");
        let values: Vec<_> = paths.iter().map(|p| p.match_value.clone()).collect();
        assert_eq!(
            values,
            vec![
                Some(MatchValue::Number(3.0)),
                Some(MatchValue::Number(-1.5)),
                Some(MatchValue::Bool(true)),
                Some(MatchValue::Bool(false)),
                Some(MatchValue::Null),
                Some(MatchValue::String("ad".into())),
            ]
        );
        assert_eq!(paths[0].segments, vec![lit("a"), Segment::EqualityMarker]);
    }

    #[test]
    fn non_decimal_numbers_stay_strings() {
        for text in ["1.", ".5", "1e3", "+1", "0x10", "--1"] {
            assert_eq!(
                parse_match_value(text).ok(),
                Some(MatchValue::String(text.to_string())),
                "{text}"
            );
        }
    }

    #[test]
    fn payload_is_not_resplit() {
        let paths = parse_paths("ad.src.[=].cdn.example.com");
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].segments, vec![lit("ad"), lit("src"), Segment::EqualityMarker]);
        assert_eq!(
            paths[0].match_value,
            Some(MatchValue::String("cdn.example.com".into()))
        );
    }

    #[test]
    fn regex_payload_keeps_spaces() {
        let paths = parse_paths("title.[=]./sponsored by .+/ other");
        assert_eq!(paths.len(), 2);
        let expected = MatchValue::regex("sponsored by .+", "").expect("regex should build");
        assert_eq!(paths[0].match_value, Some(expected));
        assert_eq!(paths[1].segments, vec![lit("other")]);
    }

    #[test]
    fn regex_payload_unescapes_slashes_and_flags() {
        let paths = parse_paths("url.[=]./ads\\/v[0-9]/i");
        let expected = MatchValue::regex("ads/v[0-9]", "i").expect("regex should build");
        assert_eq!(paths[0].match_value, Some(expected));
    }

    #[test]
    fn slash_text_without_flags_is_a_string() {
        let paths = parse_paths("path.[=]./static/ads.js");
        assert_eq!(
            paths[0].match_value,
            Some(MatchValue::String("/static/ads.js".into()))
        );
    }

    #[test]
    fn escaped_dots_and_spaces_in_keys() {
        let paths = parse_paths("a\\.b.c my\\ key");
        assert_eq!(paths[0].segments, vec![lit("a.b"), lit("c")]);
        assert_eq!(paths[1].segments, vec![lit("my key")]);
    }

    #[test]
    fn dangling_equality_degrades_to_literal() {
        let paths = parse_paths("a.*.[=] b.[=].");
        assert_eq!(paths[0], PathDescriptor::new(vec![lit("a"), lit("*"), lit("[=]")]));
        assert_eq!(
            paths[1],
            PathDescriptor::new(vec![lit("b"), lit("[=]"), lit("")])
        );
    }

    #[test]
    fn unterminated_regex_degrades_to_literal() {
        let paths = parse_paths("a.[=]./ads b");
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0],
            PathDescriptor::new(vec![lit("a"), lit("[=]"), lit("/ads")])
        );
        assert_eq!(paths[1].segments, vec![lit("b")]);
    }

    #[test]
    fn invalid_regex_degrades_to_literal() {
        let paths = parse_paths("a.[=]./(/");
        assert_eq!(paths[0].match_value, None);
        assert_eq!(paths[0].segments[1], lit("[=]"));
    }

    #[test]
    fn compiles_rule_arguments() {
        let rule = compile_rule("data.ads", "data", "  ");
        assert_eq!(rule.prune_paths.len(), 1);
        assert_eq!(rule.required_paths.len(), 1);
        assert_eq!(rule.stack_pattern, None);

        let rule = compile_rule("", "", "player.js");
        assert!(rule.prune_paths.is_empty());
        assert_eq!(rule.stack_pattern.as_deref(), Some("player.js"));
    }
}
