use serde_json::Value;

use crate::context::TestContext;
use crate::error::ValidationError;
use crate::message::{Message, MessageType};

use super::json::{collect_ignored, JsonComparison};
use super::{MessageValidator, ValidationContext, YamlValidationContext};

/// Compares YAML payloads by bridging both documents into the JSON data
/// model and running the structural JSON comparison on them.
pub struct YamlMessageValidator;

impl MessageValidator for YamlMessageValidator {
    fn name(&self) -> &str {
        "yaml"
    }

    fn is_payload_validator(&self) -> bool {
        true
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Yaml && !message.payload().trim().is_empty()
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Yaml(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if control.payload().trim().is_empty() {
            log::debug!("skipping yaml payload validation, no control payload");
            return Ok(());
        }
        let default_settings = YamlValidationContext::default();
        let settings = validation_contexts
            .iter()
            .find_map(|context| match context {
                ValidationContext::Yaml(settings) => Some(settings),
                _ => None,
            })
            .unwrap_or(&default_settings);
        let received_value: Value = serde_yaml::from_str(received.payload()).map_err(|error| {
            ValidationError::single(format!("failed to parse yaml payload: {error}"))
        })?;
        let control_text = context
            .replace_dynamic_content(control.payload())
            .map_err(|error| ValidationError::single(error.to_string()))?;
        let control_value: Value = serde_yaml::from_str(&control_text).map_err(|error| {
            ValidationError::single(format!("failed to parse yaml control payload: {error}"))
        })?;
        let mut failures = Vec::new();
        let ignored = collect_ignored(&received_value, &settings.ignore_expressions, &mut failures);
        let comparison = JsonComparison {
            strict: settings.strict,
            ignored,
        };
        comparison.compare(&received_value, &control_value, "$", &mut failures);
        if failures.is_empty() {
            log::debug!("yaml payload validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}
