//! Scriptlet rules from filter lists
//!
//! Only pruning scriptlet filters are kept:
//!
//! ```text
//! example.com,~shop.example.com##+js(json-prune, data.ads, data, /player/)
//! api.example##+js(json-prune-fetch-response, items.[-].ad, , url:/feed/ method:GET)
//! example.com##+js(trusted-prune-inbound-object, Object.assign, ads)
//! ```
//!
//! Everything else in the list (network rules, cosmetics, comments,
//! `#@#` exceptions) is skipped.

use serde::Deserialize;

use jp_core::stack::{PatternStackMatcher, StackMatcher};
use jp_core::types::CompiledRule;

use crate::adapter::PruneError;
use crate::parser::compile_rule;

/// Which intercepted API a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptletKind {
    /// `json-prune` - results of `JSON.parse`
    JsonParse,
    /// `json-prune-fetch-response` - `fetch` response bodies
    FetchResponse,
    /// `json-prune-xhr-response` - XHR response bodies
    XhrResponse,
    /// `evaldata-prune` - values produced by `eval`
    EvalData,
    /// `trusted-prune-inbound-object` - arguments of a named function
    InboundObject,
}

impl ScriptletKind {
    /// Resolve a scriptlet name, with or without its `.js` suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().strip_suffix(".js").unwrap_or(name.trim()) {
            "json-prune" => Some(Self::JsonParse),
            "json-prune-fetch-response" => Some(Self::FetchResponse),
            "json-prune-xhr-response" => Some(Self::XhrResponse),
            "evaldata-prune" => Some(Self::EvalData),
            "trusted-prune-inbound-object" => Some(Self::InboundObject),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JsonParse => "json-prune",
            Self::FetchResponse => "json-prune-fetch-response",
            Self::XhrResponse => "json-prune-xhr-response",
            Self::EvalData => "evaldata-prune",
            Self::InboundObject => "trusted-prune-inbound-object",
        }
    }

    fn layout(&self) -> ArgumentLayout {
        match self {
            Self::JsonParse | Self::EvalData => ArgumentLayout {
                function: None,
                prune: 0,
                required: 1,
                request: None,
                stack: 2,
            },
            Self::FetchResponse | Self::XhrResponse => ArgumentLayout {
                function: None,
                prune: 0,
                required: 1,
                request: Some(2),
                stack: 3,
            },
            Self::InboundObject => ArgumentLayout {
                function: Some(0),
                prune: 1,
                required: 2,
                request: None,
                stack: 3,
            },
        }
    }
}

/// Positions of the rule parts in a scriptlet's argument list.
struct ArgumentLayout {
    function: Option<usize>,
    prune: usize,
    required: usize,
    request: Option<usize>,
    stack: usize,
}

// =============================================================================
// Request matching
// =============================================================================

/// The intercepted network request of a response rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestInfo<'a> {
    pub url: &'a str,
    pub method: &'a str,
}

/// Request constraint of `json-prune-fetch-response` and
/// `json-prune-xhr-response` rules.
///
/// Space separated `url:<needle>` and `method:<needle>` entries; any other
/// entry is a URL needle. Needles are substrings or `/regex/flags`, and every
/// entry has to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPattern {
    props: Vec<(RequestProp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestProp {
    Url,
    Method,
}

impl RequestPattern {
    /// `None` for an empty pattern.
    pub fn parse(text: &str) -> Option<Self> {
        let props: Vec<_> = text
            .split_whitespace()
            .map(|entry| {
                if let Some(needle) = entry.strip_prefix("url:") {
                    (RequestProp::Url, needle.to_string())
                } else if let Some(needle) = entry.strip_prefix("method:") {
                    (RequestProp::Method, needle.to_string())
                } else {
                    (RequestProp::Url, entry.to_string())
                }
            })
            .collect();
        if props.is_empty() {
            None
        } else {
            Some(Self { props })
        }
    }

    pub fn matches(&self, request: &RequestInfo<'_>) -> bool {
        self.props.iter().all(|(prop, needle)| {
            let subject = match prop {
                RequestProp::Url => request.url,
                RequestProp::Method => request.method,
            };
            PatternStackMatcher.matches(needle, subject)
        })
    }
}

/// Hostname constraint of a scriptlet filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConstraint {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl HostConstraint {
    /// An empty include list is generic.
    pub fn applies_to(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if self.exclude.iter().any(|d| host_matches(&host, d)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|d| host_matches(&host, d))
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// A parsed pruning scriptlet filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptletRule {
    pub kind: ScriptletKind,
    pub hosts: HostConstraint,
    /// Raw scriptlet arguments, unescaped
    pub args: Vec<String>,
    /// Intercepted function of a `trusted-prune-inbound-object` rule
    pub function_name: Option<String>,
    /// Request constraint of a response rule
    pub request: Option<RequestPattern>,
    pub rule: CompiledRule,
}

impl ScriptletRule {
    pub fn applies_to(&self, host: &str) -> bool {
        self.hosts.applies_to(host)
    }

    /// Rules without a request constraint match every request.
    pub fn matches_request(&self, request: &RequestInfo<'_>) -> bool {
        self.request.as_ref().map_or(true, |pattern| pattern.matches(request))
    }

    /// Rules that name no function match every function.
    pub fn targets_function(&self, name: &str) -> bool {
        self.function_name.as_deref().map_or(true, |f| f == name)
    }
}

/// Ordered collection of scriptlet rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ScriptletRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ScriptletRule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[ScriptletRule] {
        &self.rules
    }

    /// Rules of `kind` that apply on `host`, in list order.
    pub fn for_host<'a>(
        &'a self,
        host: &'a str,
        kind: ScriptletKind,
    ) -> impl Iterator<Item = &'a ScriptletRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.kind == kind && r.applies_to(host))
    }
}

// =============================================================================
// Filter list parsing
// =============================================================================

pub fn parse_scriptlet_filters(text: &str) -> RuleSet {
    let mut rules = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        let Some((domains, body)) = line.split_once("##+js(") else {
            continue;
        };
        if domains.contains('#') {
            continue;
        }
        let Some(body) = body.strip_suffix(')') else {
            log::warn!("Unterminated scriptlet filter: {line}");
            continue;
        };

        let mut args = split_args(body);
        if args.is_empty() {
            continue;
        }
        let name = args.remove(0);
        let Some(kind) = ScriptletKind::from_name(&name) else {
            continue;
        };
        let Some(hosts) = parse_domains(domains) else {
            log::warn!("Skipping scriptlet filter with invalid domains: {line}");
            continue;
        };

        let layout = kind.layout();
        let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");
        let function_name = layout
            .function
            .map(arg)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        if layout.function.is_some() && function_name.is_none() {
            log::warn!("Skipping scriptlet filter without a function name: {line}");
            continue;
        }
        let request = layout.request.map(arg).and_then(RequestPattern::parse);
        let rule = compile_rule(arg(layout.prune), arg(layout.required), arg(layout.stack));

        rules.push(ScriptletRule {
            kind,
            hosts,
            args,
            function_name,
            request,
            rule,
        });
    }

    RuleSet::new(rules)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

/// Comma separated, `\,` escapes a comma.
fn split_args(body: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    args
}

fn parse_domains(text: &str) -> Option<HostConstraint> {
    let mut hosts = HostConstraint::default();
    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (negated, domain) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let domain = normalize_domain(domain)?;
        if negated {
            hosts.exclude.push(domain);
        } else {
            hosts.include.push(domain);
        }
    }
    Some(hosts)
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

// =============================================================================
// JSON rule files
// =============================================================================

#[derive(Debug, Deserialize)]
struct RuleSpec {
    prune: String,
    #[serde(default)]
    required: String,
    #[serde(default)]
    stack: String,
}

/// Parse a JSON rule file: `[{"prune": "...", "required": "...", "stack": "..."}]`.
pub fn parse_rule_file(text: &str) -> Result<Vec<CompiledRule>, PruneError> {
    let specs: Vec<RuleSpec> =
        serde_json::from_str(text).map_err(|e| PruneError::InvalidRules(e.to_string()))?;
    Ok(specs
        .iter()
        .map(|s| compile_rule(&s.prune, &s.required, &s.stack))
        .collect())
}

#[cfg(test)]
mod tests {
    use jp_core::types::{PathDescriptor, Segment};

    use super::*;

    const LIST: &str = r#"
! Title: test list
[Adblock Plus 2.0]
||ads.example.com^
example.com##.banner
example.com##+js(json-prune, playerResponse.adPlacements, playerResponse)
video.example,~music.video.example##+js(json-prune-fetch-response.js, data.ads, , , /player\.js/)
##+js(evaldata-prune, config.preroll)
example.com#@#+js(json-prune, a)
example.com##+js(set-constant, ads, false)
feed.example##+js(json-prune-xhr-response, items.[-].type.[=].ad, items)
example.com##+js(trusted-prune-inbound-object, Object.assign, ads tracking, , /loader/)
api.example##+js(json-prune-fetch-response, ads, , url:/api/ method:/^get$/i)
example.com##+js(trusted-prune-inbound-object)
"#;

    #[test]
    fn keeps_only_pruning_scriptlets() {
        let set = parse_scriptlet_filters(LIST);
        let kinds: Vec<_> = set.rules().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ScriptletKind::JsonParse,
                ScriptletKind::FetchResponse,
                ScriptletKind::EvalData,
                ScriptletKind::XhrResponse,
                ScriptletKind::InboundObject,
                ScriptletKind::FetchResponse,
            ]
        );
    }

    #[test]
    fn compiles_positional_arguments() {
        let set = parse_scriptlet_filters(LIST);
        let fetch = &set.rules()[1];
        assert_eq!(fetch.args, vec!["data.ads", "", "", "/player\\.js/"]);
        assert_eq!(fetch.rule.prune_paths.len(), 1);
        assert!(fetch.rule.required_paths.is_empty());
        assert!(fetch.request.is_none());
        assert_eq!(fetch.rule.stack_pattern.as_deref(), Some("/player\\.js/"));

        let xhr = &set.rules()[3];
        assert!(xhr.rule.prune_paths[0].match_value.is_some());
        assert_eq!(xhr.rule.required_paths.len(), 1);
    }

    #[test]
    fn inbound_object_rules_name_a_function() {
        let set = parse_scriptlet_filters(LIST);
        let inbound = &set.rules()[4];
        assert_eq!(inbound.function_name.as_deref(), Some("Object.assign"));
        assert_eq!(
            inbound.rule.prune_paths,
            vec![
                PathDescriptor::new(vec![Segment::Literal("ads".into())]),
                PathDescriptor::new(vec![Segment::Literal("tracking".into())]),
            ]
        );
        assert!(inbound.rule.required_paths.is_empty());
        assert_eq!(inbound.rule.stack_pattern.as_deref(), Some("/loader/"));
        assert!(inbound.targets_function("Object.assign"));
        assert!(!inbound.targets_function("Object.freeze"));
    }

    #[test]
    fn inbound_object_without_function_is_skipped() {
        let set = parse_scriptlet_filters(LIST);
        assert_eq!(set.for_host("example.com", ScriptletKind::InboundObject).count(), 1);
    }

    #[test]
    fn response_rules_keep_request_matcher_apart_from_stack() {
        let set = parse_scriptlet_filters(LIST);
        let fetch = &set.rules()[5];
        assert_eq!(fetch.rule.prune_paths.len(), 1);
        assert!(fetch.rule.stack_pattern.is_none());

        let get = RequestInfo {
            url: "https://api.example/api/feed",
            method: "GET",
        };
        assert!(fetch.matches_request(&get));
        assert!(!fetch.matches_request(&RequestInfo { method: "POST", ..get }));
        assert!(!fetch.matches_request(&RequestInfo {
            url: "https://cdn.example/static/app.js",
            ..get
        }));

        // no request constraint
        assert!(set.rules()[0].matches_request(&RequestInfo::default()));
    }

    #[test]
    fn request_patterns() {
        assert!(RequestPattern::parse("  ").is_none());
        let bare = RequestPattern::parse("/v1/player").expect("non-empty pattern");
        assert!(bare.matches(&RequestInfo {
            url: "https://x.test/v1/player?id=1",
            method: "POST",
        }));
        let regex = RequestPattern::parse("url:/\\/ads\\?/").expect("non-empty pattern");
        assert!(regex.matches(&RequestInfo {
            url: "https://x.test/ads?slot=1",
            method: "",
        }));
        assert!(!regex.matches(&RequestInfo {
            url: "https://x.test/adsense",
            method: "",
        }));
    }

    #[test]
    fn host_constraints() {
        let set = parse_scriptlet_filters(LIST);
        let fetch = &set.rules()[1];
        assert!(fetch.applies_to("video.example"));
        assert!(fetch.applies_to("www.video.example"));
        assert!(!fetch.applies_to("music.video.example"));
        assert!(!fetch.applies_to("othervideo.example"));

        let generic = &set.rules()[2];
        assert!(generic.applies_to("anything.test"));
    }

    #[test]
    fn selects_rules_for_host() {
        let set = parse_scriptlet_filters(LIST);
        assert_eq!(set.for_host("www.example.com", ScriptletKind::JsonParse).count(), 1);
        assert_eq!(set.for_host("other.test", ScriptletKind::JsonParse).count(), 0);
        assert_eq!(set.for_host("other.test", ScriptletKind::EvalData).count(), 1);
    }

    #[test]
    fn escaped_commas_in_arguments() {
        assert_eq!(split_args("json-prune, a\\,b, c"), vec!["json-prune", "a,b", "c"]);
        assert!(split_args("").is_empty());
    }

    #[test]
    fn scriptlet_names() {
        assert_eq!(ScriptletKind::from_name("json-prune.js"), Some(ScriptletKind::JsonParse));
        assert_eq!(ScriptletKind::from_name("set-constant"), None);
        assert_eq!(ScriptletKind::InboundObject.name(), "trusted-prune-inbound-object");
    }

    #[test]
    fn rule_files() {
        let rules = parse_rule_file(r#"[{"prune": "a.b c"}, {"prune": "x", "required": "y", "stack": "ads.js"}]"#)
            .expect("valid rule file");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].prune_paths.len(), 2);
        assert_eq!(rules[1].stack_pattern.as_deref(), Some("ads.js"));

        assert!(matches!(
            parse_rule_file(r#"{"prune": 1}"#),
            Err(PruneError::InvalidRules(_))
        ));
    }
}
