use serde_json::Value;

use crate::context::TestContext;
use crate::error::ValidationError;
use crate::jsonpath;
use crate::matcher;
use crate::message::{has_json_payload, Message, MessageType};

use super::{JsonPathValidationContext, JsonValidationContext, MessageValidator, ValidationContext};

/// Compares the whole received JSON document against the control document.
///
/// Strict mode also requires equal entry counts on both sides; soft mode
/// lets the control document describe a partial subset.
pub struct JsonMessageValidator;

impl MessageValidator for JsonMessageValidator {
    fn name(&self) -> &str {
        "json"
    }

    fn is_payload_validator(&self) -> bool {
        true
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Json && has_json_payload(message)
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Json(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if control.payload().trim().is_empty() {
            log::debug!("skipping json payload validation, no control payload");
            return Ok(());
        }
        let default_settings = JsonValidationContext::default();
        let settings = validation_contexts
            .iter()
            .find_map(|context| match context {
                ValidationContext::Json(settings) => Some(settings),
                _ => None,
            })
            .unwrap_or(&default_settings);
        let received_value: Value = serde_json::from_str(received.payload()).map_err(|error| {
            ValidationError::single(format!("failed to parse json payload: {error}"))
        })?;
        let control_text = context
            .replace_dynamic_content(control.payload())
            .map_err(|error| ValidationError::single(error.to_string()))?;
        let control_value: Value = serde_json::from_str(&control_text).map_err(|error| {
            ValidationError::single(format!("failed to parse json control payload: {error}"))
        })?;
        let mut failures = Vec::new();
        let ignored = collect_ignored(&received_value, &settings.ignore_expressions, &mut failures);
        let comparison = JsonComparison {
            strict: settings.strict,
            ignored,
        };
        comparison.compare(&received_value, &control_value, "$", &mut failures);
        if failures.is_empty() {
            log::debug!("json payload validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}

/// Checks individual JsonPath expressions against expected values.
pub struct JsonPathMessageValidator;

impl MessageValidator for JsonPathMessageValidator {
    fn name(&self) -> &str {
        "json-path"
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Json || has_json_payload(message)
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::JsonPath(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        _control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let contexts: Vec<&JsonPathValidationContext> = validation_contexts
            .iter()
            .filter_map(|context| match context {
                ValidationContext::JsonPath(settings) => Some(settings),
                _ => None,
            })
            .collect();
        if contexts.is_empty() {
            return Ok(());
        }
        let document: Value = serde_json::from_str(received.payload()).map_err(|error| {
            ValidationError::single(format!("failed to parse json payload: {error}"))
        })?;
        let mut failures = Vec::new();
        for settings in contexts {
            for (expression, expected) in &settings.expressions {
                let expected = match context.replace_dynamic_content(expected) {
                    Ok(expected) => expected,
                    Err(error) => {
                        failures.push(error.to_string());
                        continue;
                    }
                };
                let actual = match jsonpath::evaluate(&document, expression) {
                    Ok(actual) => jsonpath::render_value(&actual),
                    Err(error) => {
                        failures.push(error);
                        continue;
                    }
                };
                if matcher::is_matcher_expression(&expected) {
                    if let Err(failure) = matcher::resolve_matcher(expression, &actual, &expected) {
                        failures.push(failure);
                    }
                } else if actual != expected {
                    failures.push(format!(
                        "values not equal for element '{expression}', expected '{expected}' but was '{actual}'"
                    ));
                }
            }
        }
        if failures.is_empty() {
            log::debug!("json path validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}

/// Resolves ignore expressions to the received values they match.
pub(super) fn collect_ignored(
    document: &Value,
    expressions: &[String],
    failures: &mut Vec<String>,
) -> Vec<*const Value> {
    let mut ignored = Vec::new();
    for expression in expressions {
        match jsonpath::select(document, expression) {
            Ok(matches) => ignored.extend(matches.into_iter().map(|value| value as *const Value)),
            Err(error) => failures.push(error),
        }
    }
    ignored
}

/// Recursive JSON tree comparison collecting every mismatch.
pub(super) struct JsonComparison {
    pub(super) strict: bool,
    pub(super) ignored: Vec<*const Value>,
}

impl JsonComparison {
    fn is_ignored(&self, value: &Value) -> bool {
        self.ignored
            .iter()
            .any(|pointer| std::ptr::eq(*pointer, value))
    }

    pub(super) fn compare(
        &self,
        received: &Value,
        control: &Value,
        path: &str,
        failures: &mut Vec<String>,
    ) {
        if self.is_ignored(received) {
            log::trace!("skipping ignored json entry '{path}'");
            return;
        }
        if let Value::String(expected) = control {
            if matcher::is_matcher_expression(expected) {
                let rendered = jsonpath::render_value(received);
                if let Err(failure) = matcher::resolve_matcher(path, &rendered, expected) {
                    failures.push(failure);
                }
                return;
            }
        }
        match (received, control) {
            (Value::Object(received_map), Value::Object(control_map)) => {
                if self.strict && received_map.len() != control_map.len() {
                    failures.push(format!(
                        "number of json entries not equal for element '{path}', expected [{}] but was [{}]",
                        keys(control_map),
                        keys(received_map)
                    ));
                }
                for (key, control_value) in control_map {
                    let child_path = format!("{path}.{key}");
                    match received_map.get(key) {
                        Some(received_value) => {
                            self.compare(received_value, control_value, &child_path, failures);
                        }
                        None => failures.push(format!("missing json entry '{child_path}'")),
                    }
                }
            }
            (Value::Array(received_items), Value::Array(control_items)) => {
                if self.strict && received_items.len() != control_items.len() {
                    failures.push(format!(
                        "number of json entries not equal for element '{path}', expected {} entries but was {}",
                        control_items.len(),
                        received_items.len()
                    ));
                }
                for (index, control_item) in control_items.iter().enumerate() {
                    let child_path = format!("{path}[{index}]");
                    match received_items.get(index) {
                        Some(received_item) => {
                            self.compare(received_item, control_item, &child_path, failures);
                        }
                        None => failures.push(format!("missing json entry '{child_path}'")),
                    }
                }
            }
            _ => {
                if json_type_name(received) != json_type_name(control) {
                    failures.push(format!(
                        "type mismatch for entry '{path}', expected {} but was {}",
                        json_type_name(control),
                        json_type_name(received)
                    ));
                } else if received != control {
                    failures.push(format!(
                        "values not equal for entry '{path}', expected '{}' but was '{}'",
                        jsonpath::render_value(control),
                        jsonpath::render_value(received)
                    ));
                }
            }
        }
    }
}

fn keys(map: &serde_json::Map<String, Value>) -> String {
    map.keys().cloned().collect::<Vec<_>>().join(", ")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
