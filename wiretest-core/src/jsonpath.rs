//! JsonPath subset used for payload validation and value extraction.
//!
//! Supports dot and bracket child access (`$.user.name`, `$['user']`),
//! array indexes (`$.items[0]`), wildcards (`$.items[*]`, `$.*`) and
//! recursive descent by name (`$..id`).

use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Child(String),
    Index(usize),
    Wildcard,
    Recursive(String),
}

/// Selects all values matched by `expression`.
pub fn select<'a>(root: &'a Value, expression: &str) -> Result<Vec<&'a Value>, String> {
    let segments = parse(expression)?;
    Ok(select_segments(root, &segments))
}

/// Evaluates `expression` to a single value.
///
/// Definite paths (no wildcard, no recursive descent) yield the matched
/// value and fail when nothing matches; indefinite paths always yield an
/// array of matches.
pub fn evaluate(root: &Value, expression: &str) -> Result<Value, String> {
    let segments = parse(expression)?;
    let matches = select_segments(root, &segments);
    if is_definite(&segments) {
        matches
            .into_iter()
            .next()
            .cloned()
            .ok_or_else(|| no_result(expression))
    } else {
        Ok(Value::Array(matches.into_iter().cloned().collect()))
    }
}

/// Renders a JSON value the way header and variable values are stored:
/// strings without quotes, everything else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse(expression: &str) -> Result<Vec<Segment>, String> {
    let trimmed = expression.trim();
    let Some(mut rest) = trimmed.strip_prefix('$') else {
        return Err(invalid(expression));
    };
    let mut segments = Vec::new();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("..") {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let name = &after[..end];
            if name.is_empty() || name == "*" {
                return Err(invalid(expression));
            }
            segments.push(Segment::Recursive(name.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('.') {
            if let Some(after_star) = after.strip_prefix('*') {
                segments.push(Segment::Wildcard);
                rest = after_star;
                continue;
            }
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let name = &after[..end];
            if name.is_empty() {
                return Err(invalid(expression));
            }
            segments.push(Segment::Child(name.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let Some(close) = after.find(']') else {
                return Err(invalid(expression));
            };
            let inner = after[..close].trim();
            rest = &after[close + 1..];
            if inner == "*" {
                segments.push(Segment::Wildcard);
            } else if is_quoted(inner) {
                segments.push(Segment::Child(inner[1..inner.len() - 1].to_string()));
            } else {
                let index: usize = inner.parse().map_err(|_| invalid(expression))?;
                segments.push(Segment::Index(index));
            }
        } else {
            return Err(invalid(expression));
        }
    }
    Ok(segments)
}

fn is_quoted(token: &str) -> bool {
    token.len() >= 2
        && ((token.starts_with('\'') && token.ends_with('\''))
            || (token.starts_with('"') && token.ends_with('"')))
}

fn is_definite(segments: &[Segment]) -> bool {
    segments
        .iter()
        .all(|segment| matches!(segment, Segment::Child(_) | Segment::Index(_)))
}

fn select_segments<'a>(root: &'a Value, segments: &[Segment]) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Child(name) => {
                    if let Some(child) = value.as_object().and_then(|object| object.get(name)) {
                        next.push(child);
                    }
                }
                Segment::Index(index) => {
                    if let Some(child) = value.as_array().and_then(|array| array.get(*index)) {
                        next.push(child);
                    }
                }
                Segment::Wildcard => match value {
                    Value::Object(map) => next.extend(map.values()),
                    Value::Array(items) => next.extend(items.iter()),
                    _ => {}
                },
                Segment::Recursive(name) => collect_recursive(value, name, &mut next),
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn collect_recursive<'a>(value: &'a Value, name: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == name {
                    out.push(child);
                }
                collect_recursive(child, name, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_recursive(child, name, out);
            }
        }
        _ => {}
    }
}

fn invalid(expression: &str) -> String {
    format!("invalid jsonpath expression '{expression}'")
}

fn no_result(expression: &str) -> String {
    format!("no result for jsonpath expression '{expression}'")
}
