//! Minimal XPath evaluation over the owned XML tree.
//!
//! Supports child (`/`) and descendant (`//`) steps, wildcard and positional
//! steps, terminal `@attribute` and `text()` selections, `count()`, result
//! mode prefixes (`node-set:`, `boolean:`, `number:`, `integer:`, `string:`)
//! and dot-notation paths such as `employees.employee.name`.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;

use super::XmlElement;

const RESULT_MODES: [(&str, ResultMode); 5] = [
    ("node-set:", ResultMode::NodeSet),
    ("boolean:", ResultMode::Boolean),
    ("number:", ResultMode::Number),
    ("integer:", ResultMode::Integer),
    ("string:", ResultMode::Str),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResultMode {
    Default,
    NodeSet,
    Boolean,
    Number,
    Integer,
    Str,
}

/// Evaluation result, shaped by the expression's result-mode prefix.
#[derive(Clone, Debug, PartialEq)]
pub enum XpathValue {
    NodeSet(Vec<String>),
    Boolean(bool),
    Number(f64),
    Integer(i64),
    Str(String),
}

impl XpathValue {
    /// Flattens the value into the strings used for control comparison.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            XpathValue::NodeSet(values) => values.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for XpathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XpathValue::NodeSet(values) => write!(f, "[{}]", values.join(", ")),
            XpathValue::Boolean(value) => write!(f, "{value}"),
            XpathValue::Number(value) => write!(f, "{value}"),
            XpathValue::Integer(value) => write!(f, "{value}"),
            XpathValue::Str(value) => write!(f, "{value}"),
        }
    }
}

/// Position of a selected node inside a parsed document.
///
/// `element_path` lists child indexes from the root element; `attribute`
/// narrows the location to one attribute of that element.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeLocation {
    pub element_path: Vec<usize>,
    pub attribute: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum StepKind {
    Name(String),
    Wildcard,
    Attribute(String),
    Text,
}

#[derive(Clone, Debug)]
struct Step {
    axis: Axis,
    kind: StepKind,
    index: Option<usize>,
}

struct Expression {
    mode: ResultMode,
    count: bool,
    steps: Vec<Step>,
}

/// Evaluates `expression` against `root` and coerces the result.
///
/// Expressions without a result-mode prefix take the string value of the
/// first selected node; an empty selection is an error in that mode.
pub fn evaluate(root: &XmlElement, expression: &str) -> Result<XpathValue, String> {
    evaluate_in(root, expression, &IndexMap::new())
}

/// Like [`evaluate`], with prefix-to-namespace bindings applied to name
/// steps: two qualified names match when their prefixes bind to the same
/// namespace.
pub fn evaluate_in(
    root: &XmlElement,
    expression: &str,
    namespaces: &IndexMap<String, String>,
) -> Result<XpathValue, String> {
    let parsed = parse(expression)?;
    let values = collect_values(root, &parsed.steps, namespaces);
    if parsed.count {
        let count = values.len() as i64;
        return Ok(match parsed.mode {
            ResultMode::Number => XpathValue::Number(count as f64),
            ResultMode::Str => XpathValue::Str(count.to_string()),
            _ => XpathValue::Integer(count),
        });
    }
    match parsed.mode {
        ResultMode::NodeSet => Ok(XpathValue::NodeSet(values)),
        ResultMode::Boolean => Ok(XpathValue::Boolean(!values.is_empty())),
        ResultMode::Number => {
            let first = first_value(values, expression)?;
            let number: f64 = first
                .trim()
                .parse()
                .map_err(|_| not_a_number(&first, expression))?;
            Ok(XpathValue::Number(number))
        }
        ResultMode::Integer => {
            let first = first_value(values, expression)?;
            let number: i64 = first
                .trim()
                .parse()
                .map_err(|_| not_a_number(&first, expression))?;
            Ok(XpathValue::Integer(number))
        }
        ResultMode::Str | ResultMode::Default => {
            Ok(XpathValue::Str(first_value(values, expression)?))
        }
    }
}

/// Resolves `expression` to the locations it selects in `root`.
///
/// Used for ignore handling: an empty selection is not an error here.
pub fn select_locations(root: &XmlElement, expression: &str) -> Result<Vec<NodeLocation>, String> {
    select_locations_in(root, expression, &IndexMap::new())
}

/// Like [`select_locations`], with prefix-to-namespace bindings.
pub fn select_locations_in(
    root: &XmlElement,
    expression: &str,
    namespaces: &IndexMap<String, String>,
) -> Result<Vec<NodeLocation>, String> {
    let parsed = parse(expression)?;
    let (element_steps, terminal) = split_terminal(&parsed.steps);
    let selected = select(root, element_steps, namespaces);
    Ok(match terminal {
        None => selected
            .into_iter()
            .map(|(path, _)| NodeLocation {
                element_path: path,
                attribute: None,
            })
            .collect(),
        Some(step) => {
            let expanded = expand_for_terminal(selected, step.axis);
            match &step.kind {
                StepKind::Attribute(name) => expanded
                    .into_iter()
                    .map(|(path, _)| NodeLocation {
                        element_path: path,
                        attribute: Some(name.clone()),
                    })
                    .collect(),
                _ => expanded
                    .into_iter()
                    .map(|(path, _)| NodeLocation {
                        element_path: path,
                        attribute: None,
                    })
                    .collect(),
            }
        }
    })
}

fn parse(expression: &str) -> Result<Expression, String> {
    let mut rest = expression.trim();
    let mut mode = ResultMode::Default;
    for (prefix, prefix_mode) in RESULT_MODES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            mode = prefix_mode;
            rest = stripped;
            break;
        }
    }
    let mut count = false;
    if let Some(inner) = rest.strip_prefix("count(") {
        let Some(inner) = inner.strip_suffix(')') else {
            return Err(invalid(expression));
        };
        count = true;
        rest = inner;
    }
    let steps = if rest.starts_with('/') {
        parse_slash_path(rest, expression)?
    } else {
        parse_dot_path(rest, expression)?
    };
    if steps.is_empty() {
        return Err(invalid(expression));
    }
    for (position, step) in steps.iter().enumerate() {
        let terminal = matches!(step.kind, StepKind::Attribute(_) | StepKind::Text);
        if terminal && (position == 0 || position + 1 != steps.len()) {
            return Err(invalid(expression));
        }
    }
    Ok(Expression { mode, count, steps })
}

fn parse_slash_path(path: &str, expression: &str) -> Result<Vec<Step>, String> {
    let mut steps = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        let axis = if let Some(stripped) = rest.strip_prefix("//") {
            rest = stripped;
            Axis::Descendant
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
            Axis::Child
        } else {
            return Err(invalid(expression));
        };
        let end = rest.find('/').unwrap_or(rest.len());
        let token = &rest[..end];
        rest = &rest[end..];
        steps.push(parse_step(axis, token, expression)?);
    }
    Ok(steps)
}

fn parse_dot_path(path: &str, expression: &str) -> Result<Vec<Step>, String> {
    path.split('.')
        .map(|token| parse_step(Axis::Child, token, expression))
        .collect()
}

fn parse_step(axis: Axis, token: &str, expression: &str) -> Result<Step, String> {
    if token.is_empty() {
        return Err(invalid(expression));
    }
    if let Some(name) = token.strip_prefix('@') {
        if name.is_empty() {
            return Err(invalid(expression));
        }
        return Ok(Step {
            axis,
            kind: StepKind::Attribute(name.to_string()),
            index: None,
        });
    }
    if token == "text()" {
        return Ok(Step {
            axis,
            kind: StepKind::Text,
            index: None,
        });
    }
    let (name, index) = match token.find('[') {
        Some(open) => {
            let Some(inner) = token[open..].strip_prefix('[').and_then(|t| t.strip_suffix(']'))
            else {
                return Err(invalid(expression));
            };
            let position: usize = inner.trim().parse().map_err(|_| invalid(expression))?;
            (&token[..open], Some(position))
        }
        None => (token, None),
    };
    if name == "*" {
        return Ok(Step {
            axis,
            kind: StepKind::Wildcard,
            index,
        });
    }
    if name.is_empty() || name.contains(['@', '[', ']', '(', ')']) {
        return Err(invalid(expression));
    }
    Ok(Step {
        axis,
        kind: StepKind::Name(name.to_string()),
        index,
    })
}

fn collect_values(
    root: &XmlElement,
    steps: &[Step],
    namespaces: &IndexMap<String, String>,
) -> Vec<String> {
    let (element_steps, terminal) = split_terminal(steps);
    let selected = select(root, element_steps, namespaces);
    match terminal {
        None => selected
            .into_iter()
            .map(|(_, element)| string_value(element))
            .collect(),
        Some(step) => {
            let expanded = expand_for_terminal(selected, step.axis);
            match &step.kind {
                StepKind::Attribute(name) => expanded
                    .into_iter()
                    .filter_map(|(_, element)| element.attribute(name).map(str::to_string))
                    .collect(),
                StepKind::Text => expanded
                    .into_iter()
                    .map(|(_, element)| element.text.clone())
                    .collect(),
                _ => Vec::new(),
            }
        }
    }
}

fn split_terminal(steps: &[Step]) -> (&[Step], Option<&Step>) {
    match steps.last() {
        Some(step) if matches!(step.kind, StepKind::Attribute(_) | StepKind::Text) => {
            (&steps[..steps.len() - 1], Some(step))
        }
        _ => (steps, None),
    }
}

fn select<'a>(
    root: &'a XmlElement,
    steps: &[Step],
    namespaces: &IndexMap<String, String>,
) -> Vec<(Vec<usize>, &'a XmlElement)> {
    let mut current: Vec<(Vec<usize>, &'a XmlElement)> = Vec::new();
    for (position, step) in steps.iter().enumerate() {
        let mut next: Vec<(Vec<usize>, &'a XmlElement)> = Vec::new();
        if position == 0 {
            let mut matched = Vec::new();
            if kind_matches(&step.kind, root, namespaces) {
                matched.push((Vec::new(), root));
            }
            if step.axis == Axis::Descendant {
                collect_descendants(root, &[], &step.kind, namespaces, &mut matched);
            }
            next = apply_index(matched, step.index);
        } else {
            for (path, element) in &current {
                let mut matched = Vec::new();
                match step.axis {
                    Axis::Child => {
                        for (child_position, child) in element.children.iter().enumerate() {
                            if kind_matches(&step.kind, child, namespaces) {
                                let mut child_path = path.clone();
                                child_path.push(child_position);
                                matched.push((child_path, child));
                            }
                        }
                    }
                    Axis::Descendant => {
                        collect_descendants(element, path, &step.kind, namespaces, &mut matched);
                    }
                }
                next.extend(apply_index(matched, step.index));
            }
        }
        let mut seen = BTreeSet::new();
        next.retain(|(path, _)| seen.insert(path.clone()));
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn expand_for_terminal<'a>(
    selected: Vec<(Vec<usize>, &'a XmlElement)>,
    axis: Axis,
) -> Vec<(Vec<usize>, &'a XmlElement)> {
    match axis {
        Axis::Child => selected,
        Axis::Descendant => {
            let mut seen = BTreeSet::new();
            let mut expanded = Vec::new();
            for (path, element) in selected {
                let mut matched = vec![(path.clone(), element)];
                collect_descendants(
                    element,
                    &path,
                    &StepKind::Wildcard,
                    &IndexMap::new(),
                    &mut matched,
                );
                for entry in matched {
                    if seen.insert(entry.0.clone()) {
                        expanded.push(entry);
                    }
                }
            }
            expanded
        }
    }
}

fn kind_matches(kind: &StepKind, element: &XmlElement, namespaces: &IndexMap<String, String>) -> bool {
    match kind {
        StepKind::Name(name) => qualified_equal(name, &element.name, namespaces),
        StepKind::Wildcard => true,
        StepKind::Attribute(_) | StepKind::Text => false,
    }
}

pub(crate) fn qualified_equal(
    left: &str,
    right: &str,
    namespaces: &IndexMap<String, String>,
) -> bool {
    if left == right {
        return true;
    }
    match (resolve_prefix(left, namespaces), resolve_prefix(right, namespaces)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn resolve_prefix<'a>(
    name: &'a str,
    namespaces: &'a IndexMap<String, String>,
) -> Option<(&'a str, &'a str)> {
    let (prefix, local) = name.split_once(':')?;
    namespaces.get(prefix).map(|uri| (uri.as_str(), local))
}

fn collect_descendants<'a>(
    element: &'a XmlElement,
    base: &[usize],
    kind: &StepKind,
    namespaces: &IndexMap<String, String>,
    out: &mut Vec<(Vec<usize>, &'a XmlElement)>,
) {
    for (position, child) in element.children.iter().enumerate() {
        let mut path = base.to_vec();
        path.push(position);
        if kind_matches(kind, child, namespaces) {
            out.push((path.clone(), child));
        }
        collect_descendants(child, &path, kind, namespaces, out);
    }
}

fn apply_index<'a>(
    matched: Vec<(Vec<usize>, &'a XmlElement)>,
    index: Option<usize>,
) -> Vec<(Vec<usize>, &'a XmlElement)> {
    match index {
        Some(position) if position >= 1 => {
            matched.into_iter().nth(position - 1).into_iter().collect()
        }
        Some(_) => Vec::new(),
        None => matched,
    }
}

fn string_value(element: &XmlElement) -> String {
    if element.children.is_empty() {
        return element.text.clone();
    }
    let mut value = element.text.clone();
    for child in &element.children {
        value.push_str(&string_value(child));
    }
    value
}

fn first_value(values: Vec<String>, expression: &str) -> Result<String, String> {
    values.into_iter().next().ok_or_else(|| no_result(expression))
}

fn invalid(expression: &str) -> String {
    format!("invalid xpath expression '{expression}'")
}

fn no_result(expression: &str) -> String {
    format!("no result for xpath expression '{expression}'")
}

fn not_a_number(value: &str, expression: &str) -> String {
    format!("cannot convert result '{value}' of xpath expression '{expression}' to a number")
}

#[cfg(test)]
#[path = "../../tests/internal/xpath_unit_tests.rs"]
mod tests;
