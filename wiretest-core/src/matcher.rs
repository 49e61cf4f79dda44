//! Validation matcher expressions used in control values, `@name(args)@`.

use regex::Regex;

/// Control value accepting any received value.
pub const IGNORE_PLACEHOLDER: &str = "@ignore@";

/// True when a control value invokes a matcher instead of plain equality.
pub fn is_matcher_expression(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() >= 2 && trimmed.starts_with('@') && trimmed.ends_with('@')
}

/// True for the ignore placeholder.
pub fn is_ignore_placeholder(value: &str) -> bool {
    value.trim() == IGNORE_PLACEHOLDER
}

/// Evaluates a matcher expression against the received value.
/// Returns a failure description when the match does not hold.
pub fn resolve_matcher(field: &str, received: &str, control: &str) -> Result<(), String> {
    let expression = control.trim();
    let inner = expression
        .strip_prefix('@')
        .and_then(|rest| rest.strip_suffix('@'))
        .ok_or_else(|| format!("malformed matcher expression '{control}' for field '{field}'"))?;
    if inner == "ignore" {
        return Ok(());
    }
    let open = inner
        .find('(')
        .ok_or_else(|| format!("malformed matcher expression '{control}' for field '{field}'"))?;
    let close = inner
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(|| format!("malformed matcher expression '{control}' for field '{field}'"))?;
    let name = inner[..open].trim();
    let arguments = crate::context::split_arguments(&inner[open + 1..close]);

    let matched = apply_matcher(name, received, &arguments).map_err(|reason| {
        format!("matcher '@{name}(..)@' for field '{field}': {reason}")
    })?;
    if matched {
        return Ok(());
    }
    Err(format!(
        "matcher failed for field '{field}': received value '{received}' did not match '{expression}'"
    ))
}

fn apply_matcher(name: &str, received: &str, arguments: &[String]) -> Result<bool, String> {
    let single = |what: &str| -> Result<&String, String> {
        arguments
            .first()
            .filter(|_| arguments.len() == 1)
            .ok_or_else(|| format!("expected exactly one {what} argument"))
    };
    match name {
        "equalsIgnoreCase" => Ok(received.eq_ignore_ascii_case(single("comparison")?)),
        "contains" => Ok(received.contains(single("substring")?.as_str())),
        "startsWith" => Ok(received.starts_with(single("prefix")?.as_str())),
        "endsWith" => Ok(received.ends_with(single("suffix")?.as_str())),
        "matches" => {
            let pattern = single("pattern")?;
            let regex =
                Regex::new(pattern).map_err(|error| format!("invalid pattern '{pattern}': {error}"))?;
            Ok(regex.is_match(received))
        }
        "isNumber" => {
            if !arguments.is_empty() {
                return Err("expected no arguments".to_string());
            }
            Ok(received.trim().parse::<f64>().is_ok())
        }
        "hasLength" => {
            let expected: usize = single("length")?
                .trim()
                .parse()
                .map_err(|_| "expected a numeric length argument".to_string())?;
            Ok(received.chars().count() == expected)
        }
        other => Err(format!("unknown validation matcher '{other}'")),
    }
}
