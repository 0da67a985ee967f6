//! Helpers over `serde_json::Value` trees
//!
//! Locations, own-key iteration and JavaScript-style string conversion.

use serde_json::Value;

/// An array element index or object member name in a location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElement {
    Index(usize),
    Name(String),
}

/// Path from the root to a node.
pub type Location = Vec<PathElement>;

/// Render a location as a normalized path, e.g. `$['videos'][0]`.
pub fn normalized_path(location: &[PathElement]) -> String {
    let mut out = String::from("$");
    for element in location {
        match element {
            PathElement::Index(i) => out.push_str(&format!("[{i}]")),
            PathElement::Name(name) => {
                out.push_str("['");
                out.push_str(&name.replace('\\', "\\\\").replace('\'', "\\'"));
                out.push_str("']");
            }
        }
    }
    out
}

/// Look up an own key of an object, or a decimal index of an array.
pub fn child<'v>(value: &'v Value, name: &str) -> Option<(PathElement, &'v Value)> {
    match value {
        Value::Object(map) => map
            .get(name)
            .map(|v| (PathElement::Name(name.to_owned()), v)),
        Value::Array(items) => {
            let index = parse_index(name)?;
            items.get(index).map(|v| (PathElement::Index(index), v))
        }
        _ => None,
    }
}

/// Every own entry of an object or array; empty for primitives.
pub fn children(value: &Value) -> Vec<(PathElement, &Value)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (PathElement::Name(k.clone()), v))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (PathElement::Index(i), v))
            .collect(),
        _ => Vec::new(),
    }
}

/// Mutable lookup of a node by location.
pub fn get_mut<'v>(root: &'v mut Value, location: &[PathElement]) -> Option<&'v mut Value> {
    location.iter().try_fold(root, |node, element| match (node, element) {
        (Value::Object(map), PathElement::Name(name)) => map.get_mut(name),
        (Value::Array(items), PathElement::Index(i)) => items.get_mut(*i),
        _ => None,
    })
}

/// Remove `key` from the container at `owner`. Returns whether anything was removed.
pub fn remove_at(root: &mut Value, owner: &[PathElement], key: &PathElement) -> bool {
    match (get_mut(root, owner), key) {
        (Some(Value::Object(map)), PathElement::Name(name)) => map.shift_remove(name).is_some(),
        (Some(Value::Array(items)), PathElement::Index(i)) if *i < items.len() => {
            items.remove(*i);
            true
        }
        _ => false,
    }
}

/// Canonical decimal array index: no sign, no leading zeros.
fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// String conversion as performed by JavaScript's `String(value)`.
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                js_number(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// `Number.prototype.toString`: shortest round-trip digits, exponent form
/// outside `[1e-6, 1e21)`.
fn js_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if n == 0.0 {
        // covers -0
        return "0".to_string();
    }

    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return n.to_string();
    }

    let scientific = format!("{n:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => scientific,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalized_paths() {
        let location = vec![
            PathElement::Name("a".into()),
            PathElement::Index(2),
            PathElement::Name("it's".into()),
        ];
        assert_eq!(normalized_path(&location), "$['a'][2]['it\\'s']");
        assert_eq!(normalized_path(&[]), "$");
    }

    #[test]
    fn child_lookup_on_arrays_needs_canonical_index() {
        let doc = json!([10, 20, 30]);
        assert_eq!(child(&doc, "1").map(|(_, v)| v), Some(&json!(20)));
        assert!(child(&doc, "01").is_none());
        assert!(child(&doc, "-1").is_none());
        assert!(child(&doc, "3").is_none());
        assert!(child(&json!("str"), "0").is_none());
    }

    #[test]
    fn remove_preserves_sibling_order() {
        let mut doc = json!({"z": 1, "a": 2, "m": 3});
        assert!(remove_at(&mut doc, &[], &PathElement::Name("a".into())));
        let keys: Vec<_> = doc.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default();
        assert_eq!(keys, vec!["z".to_string(), "m".to_string()]);
        assert!(!remove_at(&mut doc, &[], &PathElement::Name("a".into())));
    }

    #[test]
    fn remove_array_element_collapses_indices() {
        let mut doc = json!({"list": [1, 2, 3]});
        let owner = vec![PathElement::Name("list".into())];
        assert!(remove_at(&mut doc, &owner, &PathElement::Index(0)));
        assert_eq!(doc, json!({"list": [2, 3]}));
        assert!(!remove_at(&mut doc, &owner, &PathElement::Index(5)));
    }

    #[test]
    fn js_string_conversion() {
        assert_eq!(js_string(&json!(null)), "null");
        assert_eq!(js_string(&json!(3)), "3");
        assert_eq!(js_string(&json!(3.0)), "3");
        assert_eq!(js_string(&json!(0.5)), "0.5");
        assert_eq!(js_string(&json!([1, null, "x"])), "1,,x");
        assert_eq!(js_string(&json!({"a": 1})), "[object Object]");
    }

    #[test]
    fn js_number_exponent_range() {
        assert_eq!(js_string(&json!(1e-7)), "1e-7");
        assert_eq!(js_string(&json!(-2.5e-8)), "-2.5e-8");
        assert_eq!(js_string(&json!(0.000001)), "0.000001");
        assert_eq!(js_string(&json!(1e21)), "1e+21");
        assert_eq!(js_string(&json!(1.5e300)), "1.5e+300");
        assert_eq!(js_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(js_string(&json!(-0.0)), "0");
    }
}
