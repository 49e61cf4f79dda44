use crate::context::TestContext;
use crate::error::ValidationError;
use crate::matcher;
use crate::message::{headers, Message, MessageType};

use super::{MessageValidator, ValidationContext};

/// Compares every control header against the received message.
///
/// Framework-internal id and timestamp headers are skipped; only runs when a
/// header context is present.
pub struct HeaderMessageValidator;

impl MessageValidator for HeaderMessageValidator {
    fn name(&self) -> &str {
        "header"
    }

    fn supports_message_type(&self, _message_type: MessageType, _message: &Message) -> bool {
        true
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Header(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let Some(settings) = validation_contexts.iter().find_map(|context| match context {
            ValidationContext::Header(settings) => Some(settings),
            _ => None,
        }) else {
            return Ok(());
        };
        let mut failures = Vec::new();
        for (name, control_value) in control.headers() {
            if headers::is_internal(name) {
                continue;
            }
            let expected = match context.replace_dynamic_content(control_value) {
                Ok(expected) => expected,
                Err(error) => {
                    failures.push(error.to_string());
                    continue;
                }
            };
            let received_value = if settings.ignore_case {
                received.header_ignore_case(name)
            } else {
                received.header(name)
            };
            let Some(received_value) = received_value else {
                failures.push(format!("missing expected header '{name}'"));
                continue;
            };
            if matcher::is_matcher_expression(&expected) {
                if let Err(failure) = matcher::resolve_matcher(name, received_value, &expected) {
                    failures.push(failure);
                }
            } else if received_value != expected {
                failures.push(format!(
                    "values not equal for header '{name}', expected '{expected}' but was '{received_value}'"
                ));
            }
        }
        if failures.is_empty() {
            log::debug!("header validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}
