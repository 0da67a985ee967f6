//! WebAssembly bindings for JSONPrune

use std::sync::OnceLock;

use jp_compiler::{
    compile_rule, parse_paths as parse_path_string, parse_scriptlet_filters, Pruner, RequestInfo,
    RuleSet, ScriptletKind,
};
use jp_core::CompiledRule;
use serde_json::Value;
use wasm_bindgen::prelude::*;

static RULE_SET: OnceLock<RuleSet> = OnceLock::new();

// =============================================================================
// Logging
// =============================================================================

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = JsValue::from_str(&format!("[jsonprune] {}", record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&message),
            log::Level::Warn => web_sys::console::warn_1(&message),
            log::Level::Info => web_sys::console::info_1(&message),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&message),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Route engine diagnostics to the developer console.
#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    // A second call only adjusts the level
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

// =============================================================================
// Adapter contract
// =============================================================================

/// Prune a JS value. The original value is returned when nothing changed or
/// the value cannot be represented as JSON.
#[wasm_bindgen]
pub fn prune(
    value: JsValue,
    prune_paths: &str,
    required_paths: &str,
    stack_pattern: &str,
    stack_trace: &str,
    hostname: Option<String>,
) -> JsValue {
    let rule = compile_rule(prune_paths, required_paths, stack_pattern);
    apply_rules(value, std::slice::from_ref(&rule), stack_trace, hostname.as_deref().unwrap_or(""))
}

/// Prune a `fetch`/XHR response body. Non-JSON bodies come back unchanged.
#[wasm_bindgen]
pub fn prune_response_text(
    text: &str,
    prune_paths: &str,
    required_paths: &str,
    stack_pattern: &str,
    stack_trace: &str,
    hostname: Option<String>,
) -> String {
    let rule = compile_rule(prune_paths, required_paths, stack_pattern);
    let pruner: Pruner = Pruner::default().with_hostname(hostname.unwrap_or_default());
    match pruner.apply_text(text, &rule, stack_trace) {
        Ok(Some(pruned)) => pruned,
        Ok(None) => text.to_string(),
        Err(e) => {
            log::debug!("{}: {}", pruner.hostname(), e);
            text.to_string()
        }
    }
}

/// Parsed descriptors of a path string, for rule authoring tools.
#[wasm_bindgen]
pub fn parse_paths(raw: &str) -> JsValue {
    let descriptors = parse_path_string(raw);
    serde_json::to_string(&descriptors)
        .ok()
        .and_then(|json| js_sys::JSON::parse(&json).ok())
        .unwrap_or_else(|| js_sys::Array::new().into())
}

// =============================================================================
// Filter list rule set
// =============================================================================

#[wasm_bindgen]
pub fn init_rules(filter_text: &str) -> Result<JsValue, JsValue> {
    if RULE_SET.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the page to reinitialize."));
    }

    let rule_set = parse_scriptlet_filters(filter_text);
    let rule_count = rule_set.len();

    RULE_SET
        .set(rule_set)
        .map_err(|_| JsValue::from_str("Failed to set rule state"))?;

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"rules".into(), &JsValue::from(rule_count as u32));
    let _ = js_sys::Reflect::set(&result, &"lines".into(), &JsValue::from(filter_text.lines().count() as u32));
    Ok(result.into())
}

#[wasm_bindgen]
pub fn rules_initialized() -> bool {
    RULE_SET.get().is_some()
}

/// Apply every rule of `scriptlet` that targets `hostname`, in list order.
///
/// Response rules with a request constraint only apply when `request_url`
/// and `request_method` satisfy it.
#[wasm_bindgen]
pub fn prune_for_host(
    value: JsValue,
    hostname: &str,
    scriptlet: &str,
    stack_trace: &str,
    request_url: Option<String>,
    request_method: Option<String>,
) -> JsValue {
    let Some(rule_set) = RULE_SET.get() else {
        return value;
    };
    let Some(kind) = ScriptletKind::from_name(scriptlet) else {
        log::warn!("Unknown scriptlet: {scriptlet}");
        return value;
    };

    let request = RequestInfo {
        url: request_url.as_deref().unwrap_or(""),
        method: request_method.as_deref().unwrap_or(""),
    };
    let rules: Vec<CompiledRule> = rule_set
        .for_host(hostname, kind)
        .filter(|r| r.matches_request(&request))
        .map(|r| r.rule.clone())
        .collect();
    if rules.is_empty() {
        return value;
    }
    apply_rules(value, &rules, stack_trace, hostname)
}

/// Prune the arguments of an intercepted call to `function_name` with the
/// `trusted-prune-inbound-object` rules for `hostname`.
///
/// `args` is an array; a new array is returned when something changed.
#[wasm_bindgen]
pub fn prune_arguments(args: JsValue, hostname: &str, function_name: &str, stack_trace: &str) -> JsValue {
    let Some(rule_set) = RULE_SET.get() else {
        return args;
    };
    let Some(Value::Array(mut values)) = to_json(&args) else {
        return args;
    };

    let pruner: Pruner = Pruner::default().with_hostname(hostname);
    let mut changed = false;
    for rule in rule_set
        .for_host(hostname, ScriptletKind::InboundObject)
        .filter(|r| r.targets_function(function_name))
    {
        changed |= pruner.apply_arguments(&mut values, &rule.rule, stack_trace);
    }

    if !changed {
        return args;
    }
    from_json(&Value::Array(values)).unwrap_or(args)
}

fn apply_rules(value: JsValue, rules: &[CompiledRule], stack_trace: &str, hostname: &str) -> JsValue {
    let Some(mut json) = to_json(&value) else {
        return value;
    };

    let pruner: Pruner = Pruner::default().with_hostname(hostname);
    let mut changed = false;
    for rule in rules {
        let outcome = pruner.apply(json, rule, stack_trace);
        json = outcome.value;
        changed |= outcome.changed;
    }

    if !changed {
        return value;
    }
    from_json(&json).unwrap_or(value)
}

fn to_json(value: &JsValue) -> Option<Value> {
    // `undefined` and functions stringify to a non-string
    let text = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

fn from_json(value: &Value) -> Option<JsValue> {
    let text = serde_json::to_string(value).ok()?;
    js_sys::JSON::parse(&text).ok()
}
