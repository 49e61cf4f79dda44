use crate::context::TestContext;
use crate::error::ValidationError;
use crate::message::{Message, MessageType};

use super::{MessageValidator, ValidationContext};

/// Runs user-supplied verification closures against the received message.
pub struct ScriptMessageValidator;

impl MessageValidator for ScriptMessageValidator {
    fn name(&self) -> &str {
        "script"
    }

    fn supports_message_type(&self, _message_type: MessageType, _message: &Message) -> bool {
        true
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Script(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        _control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let mut failures = Vec::new();
        for settings in validation_contexts.iter().filter_map(|context| match context {
            ValidationContext::Script(settings) => Some(settings),
            _ => None,
        }) {
            if let Err(message) = settings.run(received, context) {
                failures.push(format!(
                    "script validator '{}' failed: {message}",
                    settings.name
                ));
            } else {
                log::debug!("script validator '{}' successful", settings.name);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}
