use crate::context::TestContext;
use crate::error::ValidationError;
use crate::matcher;
use crate::message::{Message, MessageType};

use super::{MessageValidator, ValidationContext};

/// Trimmed text equality between received and control payloads.
#[derive(Default)]
pub struct PlaintextMessageValidator {
    normalize_whitespace: bool,
}

impl PlaintextMessageValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapses every run of whitespace to a single space before comparing.
    pub fn normalizing_whitespace() -> Self {
        PlaintextMessageValidator {
            normalize_whitespace: true,
        }
    }

    fn prepare(&self, text: &str) -> String {
        let trimmed = text.trim();
        if self.normalize_whitespace {
            trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            trimmed.to_string()
        }
    }
}

impl MessageValidator for PlaintextMessageValidator {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn is_payload_validator(&self) -> bool {
        true
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Plaintext && !message.payload().trim().is_empty()
    }

    fn supports_validation_context(&self, _context: &ValidationContext) -> bool {
        false
    }

    fn validate_message(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        _validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if control.payload().trim().is_empty() {
            log::debug!("skipping text payload validation, no control payload");
            return Ok(());
        }
        let expected = context
            .replace_dynamic_content(control.payload())
            .map_err(|error| ValidationError::single(error.to_string()))?;
        let expected = expected.trim();
        let actual = self.prepare(received.payload());
        if matcher::is_matcher_expression(expected) {
            return matcher::resolve_matcher("payload", &actual, expected)
                .map_err(ValidationError::single);
        }
        let expected = self.prepare(expected);
        if actual != expected {
            return Err(ValidationError::single(format!(
                "values not equal in text payload, expected '{expected}' but was '{actual}'"
            )));
        }
        log::debug!("text payload validation successful: all values ok");
        Ok(())
    }
}

/// Accepts any empty received payload; expects nothing else.
///
/// Selected by the registry when a message arrives with an empty body.
pub struct EmptyPayloadMessageValidator;

impl MessageValidator for EmptyPayloadMessageValidator {
    fn name(&self) -> &str {
        "empty-payload"
    }

    fn is_payload_validator(&self) -> bool {
        true
    }

    fn supports_message_type(&self, _message_type: MessageType, message: &Message) -> bool {
        message.payload().trim().is_empty()
    }

    fn supports_validation_context(&self, _context: &ValidationContext) -> bool {
        false
    }

    fn validate_message(
        &self,
        _received: &Message,
        control: &Message,
        context: &TestContext,
        _validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if control.payload().trim().is_empty() {
            return Ok(());
        }
        let expected = context
            .replace_dynamic_content(control.payload())
            .map_err(|error| ValidationError::single(error.to_string()))?;
        Err(ValidationError::single(format!(
            "received payload is empty, expected '{}'",
            expected.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_text_passes_after_trimming() {
        let received = Message::new("  hello world \n");
        let control = Message::new("hello world");
        let result = PlaintextMessageValidator::new().validate_message(
            &received,
            &control,
            &TestContext::new(),
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn different_text_reports_both_values() {
        let received = Message::new("goodbye");
        let control = Message::new("hello");
        let error = PlaintextMessageValidator::new()
            .validate_message(&received, &control, &TestContext::new(), &[])
            .unwrap_err();
        assert_eq!(
            error.failures,
            vec!["values not equal in text payload, expected 'hello' but was 'goodbye'"]
        );
    }

    #[test]
    fn whole_payload_matcher_is_honored() {
        let received = Message::new("order-4711 accepted");
        let control = Message::new("@contains(accepted)@");
        let result = PlaintextMessageValidator::new().validate_message(
            &received,
            &control,
            &TestContext::new(),
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn empty_control_skips_text_validation() {
        let received = Message::new("anything");
        let control = Message::new("");
        let result = PlaintextMessageValidator::new().validate_message(
            &received,
            &control,
            &TestContext::new(),
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn whitespace_normalization_collapses_internal_runs() {
        let received = Message::new("hello\n\t  world");
        let control = Message::new("hello world");
        let strict = PlaintextMessageValidator::new()
            .validate_message(&received, &control, &TestContext::new(), &[])
            .unwrap_err();
        assert_eq!(
            strict.failures,
            vec!["values not equal in text payload, expected 'hello world' but was 'hello\n\t  world'"]
        );
        let result = PlaintextMessageValidator::normalizing_whitespace().validate_message(
            &received,
            &control,
            &TestContext::new(),
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn empty_payload_validator_accepts_empty_pair() {
        let received = Message::new("");
        let control = Message::new("  ");
        let result = EmptyPayloadMessageValidator.validate_message(
            &received,
            &control,
            &TestContext::new(),
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn empty_payload_validator_rejects_missing_content() {
        let received = Message::new("");
        let control = Message::new("<doc/>");
        let error = EmptyPayloadMessageValidator
            .validate_message(&received, &control, &TestContext::new(), &[])
            .unwrap_err();
        assert_eq!(
            error.failures,
            vec!["received payload is empty, expected '<doc/>'"]
        );
    }

    #[test]
    fn plaintext_only_claims_nonempty_plaintext_messages() {
        let validator = PlaintextMessageValidator::new();
        let text = Message::new("hello");
        assert!(validator.supports_message_type(MessageType::Plaintext, &text));
        assert!(!validator.supports_message_type(MessageType::Xml, &text));
        let empty = Message::new(" ");
        assert!(!validator.supports_message_type(MessageType::Plaintext, &empty));
        assert!(EmptyPayloadMessageValidator.supports_message_type(MessageType::Plaintext, &empty));
    }
}
