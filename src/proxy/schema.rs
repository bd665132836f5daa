//! Schema query detection and cleanup.
//!
//! The engine reports its own internal predicates and types (names
//! starting with `dgraph.`) next to user ones. Schema replies sent back
//! through the proxy only carry the user's definitions.

use serde_json::{Map, Value};

const INTERNAL_PREFIX: &str = "dgraph.";

/// Lines of a DQL text with `#` comments and blank lines removed.
fn code_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// True for `schema {}` and `schema(...) { ... }` requests.
pub fn is_schema_query(query: &str) -> bool {
    let body = code_lines(query).collect::<Vec<_>>().join(" ");
    let body = body.trim_start();
    let body = body.strip_prefix('{').map(str::trim_start).unwrap_or(body);
    match body.strip_prefix("schema") {
        Some(rest) => matches!(rest.trim_start().chars().next(), Some('{') | Some('(')),
        None => false,
    }
}

fn is_internal(entry: &Value, key: &str) -> bool {
    entry
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|name| name.starts_with(INTERNAL_PREFIX))
}

/// Drop internal predicates, types and type fields from a schema reply.
pub fn clean_schema(reply: &Value) -> Value {
    let mut cleaned = Map::new();

    if let Some(predicates) = reply.get("schema").and_then(Value::as_array) {
        let kept: Vec<Value> = predicates
            .iter()
            .filter(|p| p.is_object() && !is_internal(p, "predicate"))
            .cloned()
            .collect();
        cleaned.insert("schema".to_string(), Value::Array(kept));
    }

    if let Some(types) = reply.get("types").and_then(Value::as_array) {
        let kept: Vec<Value> = types
            .iter()
            .filter(|t| t.is_object() && !is_internal(t, "name"))
            .cloned()
            .map(|mut t| {
                if let Some(fields) = t.get_mut("fields").and_then(Value::as_array_mut) {
                    fields.retain(|f| !is_internal(f, "name"));
                }
                t
            })
            .collect();
        cleaned.insert("types".to_string(), Value::Array(kept));
    }

    Value::Object(cleaned)
}
