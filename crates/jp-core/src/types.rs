//! Core type definitions for JSONPrune
//!
//! These types are produced by the path grammar parser in `jp-compiler`
//! and consumed by the pruning engine.

use regex::{Regex, RegexBuilder};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::Value;

/// Error type for building match payloads.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Unterminated regular expression: {0}")]
    UnterminatedRegex(String),
    #[error("Unsupported regular expression flag '{flag}' in {pattern}")]
    UnsupportedFlag { pattern: String, flag: char },
    #[error("Invalid regular expression {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// =============================================================================
// Regex Literals
// =============================================================================

/// Split a `/body/flags` literal into body and flags.
///
/// `Ok(None)` when `text` is not a regex literal: it does not start with `/`,
/// or the text after the closing `/` is not made of flag letters.
pub fn regex_literal(text: &str) -> Result<Option<(&str, &str)>, PatternError> {
    if !text.starts_with('/') {
        return Ok(None);
    }
    let close = last_unescaped_slash(text)
        .ok_or_else(|| PatternError::UnterminatedRegex(text.to_string()))?;
    let flags = &text[close + 1..];
    if flags.bytes().all(|b| b"gimsuy".contains(&b)) {
        Ok(Some((&text[1..close], flags)))
    } else {
        Ok(None)
    }
}

/// Compile the body and flags of a regex literal.
///
/// `\/` in the body is unescaped to `/`. Flags `i`, `m` and `s` map onto
/// the regex builder; `g`, `u` and `y` have no effect on a single test.
pub fn build_regex(body: &str, flags: &str) -> Result<Regex, PatternError> {
    let source = body.replace("\\/", "/");
    let mut builder = RegexBuilder::new(&source);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'g' | 'u' | 'y' => {}
            other => {
                return Err(PatternError::UnsupportedFlag {
                    pattern: format!("/{body}/{flags}"),
                    flag: other,
                })
            }
        }
    }
    builder.build().map_err(|source| PatternError::InvalidRegex {
        pattern: format!("/{body}/{flags}"),
        source,
    })
}

/// Index of the last unescaped `/` past the opening one.
fn last_unescaped_slash(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut last = None;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'/' => {
                last = Some(i);
                i += 1;
            }
            _ => i += 1,
        }
    }
    last
}

// =============================================================================
// Path Segments
// =============================================================================

/// One dot-separated component of a path entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Segment {
    /// Exact object key (or decimal array index)
    Literal(String),
    /// `*` - every own key of an object or array
    Wildcard,
    /// `[]` - every index of an array
    ArrayWildcard,
    /// `{-}` - remove object entries whose remainder matches
    ObjectDeleteMarker,
    /// `[-]` - remove array elements whose remainder matches
    ArrayDeleteMarker,
    /// `[=]` - compare the current value with the descriptor payload
    EqualityMarker,
}

impl Segment {
    /// Surface syntax of the segment, as a rule author writes it.
    pub fn as_token(&self) -> &str {
        match self {
            Self::Literal(name) => name,
            Self::Wildcard => "*",
            Self::ArrayWildcard => "[]",
            Self::ObjectDeleteMarker => "{-}",
            Self::ArrayDeleteMarker => "[-]",
            Self::EqualityMarker => "[=]",
        }
    }
}

// =============================================================================
// Match Values
// =============================================================================

/// Payload of a `[=]` clause.
#[derive(Debug, Clone)]
pub enum MatchValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Regex(Regex),
}

impl MatchValue {
    /// Build a regex payload from the body and flags of a `/body/flags` literal.
    pub fn regex(body: &str, flags: &str) -> Result<Self, PatternError> {
        build_regex(body, flags).map(Self::Regex)
    }

    /// Test a JSON value against this payload.
    ///
    /// Literals use strict equality (no type coercion); regexes are tested
    /// against the JavaScript string conversion of the value.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool(expected) => value.as_bool() == Some(*expected),
            Self::Number(expected) => value.as_f64() == Some(*expected),
            Self::String(expected) => value.as_str() == Some(expected.as_str()),
            Self::Regex(re) => re.is_match(&crate::value::js_string(value)),
        }
    }
}

impl PartialEq for MatchValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Serialize for MatchValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Regex(re) => {
                let mut state = serializer.serialize_struct("Regex", 1)?;
                state.serialize_field("regex", re.as_str())?;
                state.end()
            }
        }
    }
}

// =============================================================================
// Path Descriptors
// =============================================================================

/// A parsed path entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDescriptor {
    pub segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_value: Option<MatchValue>,
}

impl PathDescriptor {
    /// Existence-only descriptor.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            match_value: None,
        }
    }

    /// Descriptor ending in a `[=]` clause.
    pub fn with_match_value(mut segments: Vec<Segment>, value: MatchValue) -> Self {
        if segments.last() != Some(&Segment::EqualityMarker) {
            segments.push(Segment::EqualityMarker);
        }
        Self {
            segments,
            match_value: Some(value),
        }
    }
}

// =============================================================================
// Compiled Rule
// =============================================================================

/// Everything one scriptlet invocation needs, parsed from its string arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledRule {
    pub prune_paths: Vec<PathDescriptor>,
    pub required_paths: Vec<PathDescriptor>,
    /// Stack pattern; `None` when the rule has no stack constraint
    pub stack_pattern: Option<String>,
}

// =============================================================================
// Prune Outcome
// =============================================================================

/// Result of pruning one value.
#[derive(Debug, Clone, PartialEq)]
pub struct PruneOutcome {
    pub value: Value,
    /// At least one key or element was removed
    pub changed: bool,
}

impl PruneOutcome {
    pub fn unchanged(value: Value) -> Self {
        Self {
            value,
            changed: false,
        }
    }
}
