use std::sync::Arc;
use std::time::Duration;

use crate::context::TestContext;
use crate::endpoint::{Endpoint, MessageSelector};
use crate::error::WiretestError;
use crate::jsonpath;
use crate::message::{Message, MessageBuilder, MessageType};
use crate::validation::{
    reconcile_validation_contexts, validate_received_message, ValidationContext,
};
use crate::xml;
use crate::xml::xpath;

use super::TestAction;

/// Pulls one value out of a received message into a test variable.
pub enum VariableExtractor {
    Header { name: String, variable: String },
    Xpath { expression: String, variable: String },
    JsonPath { expression: String, variable: String },
}

impl VariableExtractor {
    pub fn header(name: impl Into<String>, variable: impl Into<String>) -> Self {
        VariableExtractor::Header {
            name: name.into(),
            variable: variable.into(),
        }
    }

    pub fn xpath(expression: impl Into<String>, variable: impl Into<String>) -> Self {
        VariableExtractor::Xpath {
            expression: expression.into(),
            variable: variable.into(),
        }
    }

    pub fn json_path(expression: impl Into<String>, variable: impl Into<String>) -> Self {
        VariableExtractor::JsonPath {
            expression: expression.into(),
            variable: variable.into(),
        }
    }

    fn extract(&self, message: &Message, context: &mut TestContext) -> Result<(), WiretestError> {
        match self {
            VariableExtractor::Header { name, variable } => {
                let value = message.header(name).ok_or_else(|| {
                    WiretestError::construction(format!(
                        "failed to extract variable '{variable}': no header '{name}' in received message"
                    ))
                })?;
                let value = value.to_string();
                context.set_variable(variable.clone(), value)
            }
            VariableExtractor::Xpath {
                expression,
                variable,
            } => {
                let root = xml::parse_document(message.payload()).map_err(|error| {
                    WiretestError::construction(format!("failed to parse xml payload: {error}"))
                })?;
                let value = xpath::evaluate(&root, expression).map_err(|reason| {
                    WiretestError::construction(format!(
                        "failed to extract variable '{variable}': {reason}"
                    ))
                })?;
                context.set_variable(variable.clone(), value.to_string())
            }
            VariableExtractor::JsonPath {
                expression,
                variable,
            } => {
                let document: serde_json::Value = serde_json::from_str(message.payload())
                    .map_err(|error| {
                        WiretestError::construction(format!(
                            "failed to parse json payload: {error}"
                        ))
                    })?;
                let value = jsonpath::evaluate(&document, expression).map_err(|reason| {
                    WiretestError::construction(format!(
                        "failed to extract variable '{variable}': {reason}"
                    ))
                })?;
                context.set_variable(variable.clone(), jsonpath::render_value(&value))
            }
        }
    }
}

/// Receives a message from an endpoint, validates it against a control
/// message and extracts variables from it.
///
/// The control message and the declared validation contexts are reconciled
/// first, so a plain JSON control payload gets JSON and header validation
/// without any explicit context.
pub struct ReceiveAction {
    name: String,
    endpoint: Arc<dyn Endpoint>,
    builder: MessageBuilder,
    message_type: MessageType,
    selector: MessageSelector,
    timeout: Option<Duration>,
    validation_contexts: Vec<ValidationContext>,
    extractors: Vec<VariableExtractor>,
}

impl ReceiveAction {
    pub fn new(
        name: impl Into<String>,
        endpoint: Arc<dyn Endpoint>,
        builder: MessageBuilder,
    ) -> Self {
        ReceiveAction {
            name: name.into(),
            endpoint,
            builder,
            message_type: MessageType::default(),
            selector: MessageSelector::default(),
            timeout: None,
            validation_contexts: Vec::new(),
            extractors: Vec::new(),
        }
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_selector(mut self, selector: MessageSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Overrides the endpoint's receive timeout for this action.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_validation_context(mut self, validation_context: ValidationContext) -> Self {
        self.validation_contexts.push(validation_context);
        self
    }

    pub fn with_extractor(mut self, extractor: VariableExtractor) -> Self {
        self.extractors.push(extractor);
        self
    }
}

impl TestAction for ReceiveAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        let timeout = self
            .timeout
            .unwrap_or_else(|| self.endpoint.receive_timeout());
        let received = self
            .endpoint
            .receive_selected(&self.selector, timeout, context)?;
        context.store_message(self.name.clone(), received.clone());
        log::debug!(
            "receive action '{}' got message from endpoint '{}': {}",
            self.name,
            self.endpoint.name(),
            context.mask(received.payload())
        );
        let control = self.builder.build(context, self.message_type)?;
        let mut validation_contexts = self.validation_contexts.clone();
        reconcile_validation_contexts(&mut validation_contexts, &control, self.message_type);
        validate_received_message(
            &received,
            &control,
            self.message_type,
            context,
            &validation_contexts,
        )?;
        for extractor in &self.extractors {
            extractor.extract(&received, context)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::DirectEndpoint;
    use crate::error::WiretestError;

    fn queued_endpoint(messages: Vec<Message>) -> Arc<DirectEndpoint> {
        let endpoint = Arc::new(DirectEndpoint::new("orders"));
        let context = TestContext::new();
        for message in messages {
            endpoint.send(message, &context).expect("queueing failed");
        }
        endpoint
    }

    #[test]
    fn validates_matching_json_message() {
        let endpoint = queued_endpoint(vec![Message::new(r#"{"user":"john","age":31}"#)
            .with_header("operation", "create")]);
        let action = ReceiveAction::new(
            "receive-order",
            endpoint as Arc<dyn Endpoint>,
            MessageBuilder::new()
                .with_payload(r#"{"user":"john","age":31}"#)
                .with_header("operation", "create"),
        )
        .with_message_type(MessageType::Json);
        let mut context = TestContext::new();

        action.execute(&mut context).expect("validation failed");
        assert!(context.stored_message("receive-order").is_some());
    }

    #[test]
    fn mismatches_surface_as_validation_error() {
        let endpoint = queued_endpoint(vec![Message::new(r#"{"user":"john"}"#)]);
        let action = ReceiveAction::new(
            "receive-order",
            endpoint as Arc<dyn Endpoint>,
            MessageBuilder::new().with_payload(r#"{"user":"jane"}"#),
        )
        .with_message_type(MessageType::Json);
        let mut context = TestContext::new();

        let error = action.execute(&mut context).unwrap_err();
        match error {
            WiretestError::Validation(error) => {
                assert_eq!(
                    error.failures,
                    vec!["values not equal for entry '$.user', expected 'jane' but was 'john'"]
                );
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn action_timeout_overrides_the_endpoint_default() {
        let endpoint = Arc::new(DirectEndpoint::new("silent"));
        let action = ReceiveAction::new(
            "receive-nothing",
            endpoint as Arc<dyn Endpoint>,
            MessageBuilder::new(),
        )
        .with_timeout(Duration::from_millis(50));
        let mut context = TestContext::new();

        let error = action.execute(&mut context).unwrap_err();
        match error {
            WiretestError::Timeout { endpoint, timeout } => {
                assert_eq!(endpoint, "silent");
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[test]
    fn extractors_store_header_and_json_path_values() {
        let endpoint = queued_endpoint(vec![Message::new(r#"{"order":{"id":"4711"}}"#)
            .with_header("operation", "create")]);
        let action = ReceiveAction::new(
            "receive-order",
            endpoint as Arc<dyn Endpoint>,
            MessageBuilder::new()
                .with_payload(r#"{"order":{"id":"@ignore@"}}"#)
                .with_header("operation", "create"),
        )
        .with_message_type(MessageType::Json)
        .with_extractor(VariableExtractor::header("operation", "op"))
        .with_extractor(VariableExtractor::json_path("$.order.id", "orderId"));
        let mut context = TestContext::new();

        action.execute(&mut context).expect("receive failed");
        assert_eq!(context.variable("op"), Some("create"));
        assert_eq!(context.variable("orderId"), Some("4711"));
    }

    #[test]
    fn xpath_extractor_reads_element_text() {
        let endpoint = queued_endpoint(vec![Message::new(
            "<order><id>7</id><status>open</status></order>",
        )]);
        let action = ReceiveAction::new(
            "receive-order",
            endpoint as Arc<dyn Endpoint>,
            MessageBuilder::new().with_payload("<order><id>7</id><status>open</status></order>"),
        )
        .with_extractor(VariableExtractor::xpath("//order/id", "orderId"));
        let mut context = TestContext::new();

        action.execute(&mut context).expect("receive failed");
        assert_eq!(context.variable("orderId"), Some("7"));
    }

    #[test]
    fn selector_skips_non_matching_messages() {
        let endpoint = queued_endpoint(vec![
            Message::new("first").with_header("operation", "ignore-me"),
            Message::new("second").with_header("operation", "take-me"),
        ]);
        let action = ReceiveAction::new(
            "receive-selected",
            Arc::clone(&endpoint) as Arc<dyn Endpoint>,
            MessageBuilder::new().with_payload("second"),
        )
        .with_message_type(MessageType::Plaintext)
        .with_selector(MessageSelector::default().with_header("operation", "take-me"));
        let mut context = TestContext::new();

        action.execute(&mut context).expect("receive failed");
        assert_eq!(endpoint.queued(), 1);
    }

    #[test]
    fn missing_extractor_header_is_a_construction_error() {
        let endpoint = queued_endpoint(vec![Message::new("payload")]);
        let action = ReceiveAction::new(
            "receive",
            endpoint as Arc<dyn Endpoint>,
            MessageBuilder::new().with_payload("payload"),
        )
        .with_message_type(MessageType::Plaintext)
        .with_extractor(VariableExtractor::header("absent", "value"));
        let mut context = TestContext::new();

        let error = action.execute(&mut context).unwrap_err();
        assert!(error
            .to_string()
            .contains("failed to extract variable 'value': no header 'absent'"));
    }
}
