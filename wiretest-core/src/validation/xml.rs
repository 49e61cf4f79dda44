use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::context::TestContext;
use crate::error::ValidationError;
use crate::matcher;
use crate::message::{has_xml_payload, Message, MessageType};
use crate::xml::xpath::{self, NodeLocation};
use crate::xml::{parse_document, XmlElement};

use super::{MessageValidator, ValidationContext, XmlValidationContext, XpathValidationContext};

/// Compares the received XML tree against the control tree element by
/// element: names, attributes, child structure and text content.
pub struct XmlMessageValidator;

impl MessageValidator for XmlMessageValidator {
    fn name(&self) -> &str {
        "xml"
    }

    fn is_payload_validator(&self) -> bool {
        true
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Xml && has_xml_payload(message)
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Xml(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if control.payload().trim().is_empty() {
            log::debug!("skipping xml payload validation, no control payload");
            return Ok(());
        }
        let default_settings = XmlValidationContext::default();
        let settings = validation_contexts
            .iter()
            .find_map(|context| match context {
                ValidationContext::Xml(settings) => Some(settings),
                _ => None,
            })
            .unwrap_or(&default_settings);
        let received_root = parse_document(received.payload()).map_err(|error| {
            ValidationError::single(format!("failed to parse xml payload: {error}"))
        })?;
        let control_text = context
            .replace_dynamic_content(control.payload())
            .map_err(|error| ValidationError::single(error.to_string()))?;
        let control_root = parse_document(&control_text).map_err(|error| {
            ValidationError::single(format!("failed to parse xml control payload: {error}"))
        })?;
        let mut failures = Vec::new();
        let mut ignored = BTreeSet::new();
        for expression in &settings.ignore_expressions {
            match xpath::select_locations_in(&received_root, expression, &settings.namespaces) {
                Ok(locations) => ignored.extend(locations),
                Err(error) => failures.push(error),
            }
        }
        let comparison = XmlComparison {
            namespaces: &settings.namespaces,
            ignored,
        };
        let root_path = format!("/{}", received_root.name);
        comparison.compare(&received_root, &control_root, &[], &root_path, &mut failures);
        if failures.is_empty() {
            log::debug!("xml payload validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}

/// Checks individual XPath expressions against expected values.
pub struct XpathMessageValidator;

impl MessageValidator for XpathMessageValidator {
    fn name(&self) -> &str {
        "xpath"
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Xml || has_xml_payload(message)
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Xpath(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        _control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let contexts: Vec<&XpathValidationContext> = validation_contexts
            .iter()
            .filter_map(|context| match context {
                ValidationContext::Xpath(settings) => Some(settings),
                _ => None,
            })
            .collect();
        if contexts.is_empty() {
            return Ok(());
        }
        let root = parse_document(received.payload()).map_err(|error| {
            ValidationError::single(format!("failed to parse xml payload: {error}"))
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
                let actual = match xpath::evaluate_in(&root, expression, &settings.namespaces) {
                    Ok(value) => value.to_string(),
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
                        "values not equal for xpath '{expression}', expected '{expected}' but was '{actual}'"
                    ));
                }
            }
        }
        if failures.is_empty() {
            log::debug!("xpath validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}

/// Recursive XML tree comparison collecting every mismatch.
///
/// Ignored locations are resolved against the received tree up front; an
/// ignored element exempts its whole subtree.
struct XmlComparison<'a> {
    namespaces: &'a IndexMap<String, String>,
    ignored: BTreeSet<NodeLocation>,
}

impl XmlComparison<'_> {
    fn is_element_ignored(&self, path: &[usize]) -> bool {
        self.ignored.iter().any(|location| {
            location.attribute.is_none() && path.starts_with(&location.element_path)
        })
    }

    fn is_attribute_ignored(&self, path: &[usize], name: &str) -> bool {
        self.ignored.iter().any(|location| match &location.attribute {
            None => path.starts_with(&location.element_path),
            Some(attribute) => location.element_path.as_slice() == path && attribute == name,
        })
    }

    fn compare(
        &self,
        received: &XmlElement,
        control: &XmlElement,
        element_path: &[usize],
        display_path: &str,
        failures: &mut Vec<String>,
    ) {
        if self.is_element_ignored(element_path) {
            log::trace!("skipping ignored xml element '{display_path}'");
            return;
        }
        if !xpath::qualified_equal(&control.name, &received.name, self.namespaces) {
            failures.push(format!(
                "element name not equal at '{display_path}', expected '{}' but was '{}'",
                control.name, received.name
            ));
            return;
        }
        self.compare_attributes(received, control, element_path, display_path, failures);
        if received.children.len() != control.children.len() {
            failures.push(format!(
                "number of child elements not equal for element '{display_path}', expected {} but was {}",
                control.children.len(),
                received.children.len()
            ));
        }
        for (position, (received_child, control_child)) in
            received.children.iter().zip(&control.children).enumerate()
        {
            let mut child_path = element_path.to_vec();
            child_path.push(position);
            let child_display = format!("{display_path}/{}", received_child.name);
            self.compare(
                received_child,
                control_child,
                &child_path,
                &child_display,
                failures,
            );
        }
        if control.children.is_empty() || !control.text.is_empty() {
            let expected = &control.text;
            if matcher::is_matcher_expression(expected) {
                if let Err(failure) = matcher::resolve_matcher(display_path, &received.text, expected)
                {
                    failures.push(failure);
                }
            } else if received.text != *expected {
                failures.push(format!(
                    "values not equal for element '{display_path}', expected '{expected}' but was '{}'",
                    received.text
                ));
            }
        }
    }

    fn compare_attributes(
        &self,
        received: &XmlElement,
        control: &XmlElement,
        element_path: &[usize],
        display_path: &str,
        failures: &mut Vec<String>,
    ) {
        let control_attributes: Vec<&(String, String)> = control.comparable_attributes().collect();
        let received_count = received.comparable_attributes().count();
        if control_attributes.len() != received_count {
            failures.push(format!(
                "number of attributes not equal for element '{display_path}', expected {} but was {}",
                control_attributes.len(),
                received_count
            ));
        }
        for (name, expected) in control_attributes {
            if self.is_attribute_ignored(element_path, name) {
                continue;
            }
            let Some(actual) = received.attribute(name) else {
                failures.push(format!(
                    "missing expected attribute '{name}' at element '{display_path}'"
                ));
                continue;
            };
            if matcher::is_matcher_expression(expected) {
                let target = format!("{display_path}/@{name}");
                if let Err(failure) = matcher::resolve_matcher(&target, actual, expected) {
                    failures.push(failure);
                }
            } else if actual != expected {
                failures.push(format!(
                    "values not equal for attribute '{name}' at element '{display_path}', \
                     expected '{expected}' but was '{actual}'"
                ));
            }
        }
    }
}
