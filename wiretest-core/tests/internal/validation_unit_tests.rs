use std::sync::Arc;

use super::*;
use crate::error::WiretestError;

fn names_of(validators: &[Arc<dyn MessageValidator>]) -> Vec<&str> {
    validators.iter().map(|validator| validator.name()).collect()
}

#[test]
fn declared_json_type_selects_the_json_validators() {
    let registry = MessageValidatorRegistry::default();
    let message = Message::new(r#"{"id": 1}"#);
    let selected = registry
        .find_validators(MessageType::Json, &message, &[])
        .expect("selection");
    assert_eq!(
        names_of(&selected),
        ["json", "json-path", "schema", "script", "header"]
    );
}

#[test]
fn declared_xml_type_selects_the_xml_validators() {
    let registry = MessageValidatorRegistry::default();
    let message = Message::new("<doc/>");
    let selected = registry
        .find_validators(MessageType::Xml, &message, &[])
        .expect("selection");
    assert_eq!(names_of(&selected), ["xml", "xpath", "script", "header"]);
}

#[test]
fn mismatched_declared_type_sniffs_the_payload() {
    let registry = MessageValidatorRegistry::default();
    let message = Message::new(r#"{"id": 1}"#);
    let selected = registry
        .find_validators(MessageType::Xml, &message, &[])
        .expect("selection");
    assert_eq!(
        names_of(&selected),
        ["xpath", "json-path", "schema", "script", "header", "json"]
    );
}

#[test]
fn unshaped_payload_sniffs_as_plaintext() {
    let registry = MessageValidatorRegistry::default();
    let message = Message::new("hello there");
    let selected = registry
        .find_validators(MessageType::Xml, &message, &[])
        .expect("selection");
    assert_eq!(names_of(&selected), ["xpath", "script", "header", "plaintext"]);
}

#[test]
fn empty_payload_selects_the_empty_payload_validator() {
    let registry = MessageValidatorRegistry::default();
    let message = Message::new("   ");
    let selected = registry
        .find_validators(MessageType::Json, &message, &[])
        .expect("selection");
    assert_eq!(
        names_of(&selected),
        ["json-path", "schema", "script", "header", "empty-payload"]
    );
}

#[test]
fn path_context_without_capable_validator_is_a_configuration_error() {
    let mut registry = MessageValidatorRegistry::empty();
    registry
        .register("header", Arc::new(HeaderMessageValidator))
        .expect("register");
    let contexts = vec![ValidationContext::Xpath(XpathValidationContext::default())];
    let error = registry
        .find_validators(MessageType::Xml, &Message::new("<doc/>"), &contexts)
        .expect_err("missing xpath validator");
    assert_eq!(
        error.to_string(),
        "configuration error: failed to find proper message validator for \
         message type 'xml' and validation context 'xpath'"
    );
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = MessageValidatorRegistry::empty();
    registry
        .register("header", Arc::new(HeaderMessageValidator))
        .expect("first registration");
    let error = registry
        .register("header", Arc::new(HeaderMessageValidator))
        .expect_err("duplicate registration");
    assert_eq!(
        error.to_string(),
        "configuration error: message validator 'header' is already registered"
    );
}

#[test]
fn find_looks_up_by_registry_name() {
    let registry = MessageValidatorRegistry::default();
    assert!(registry.find("yaml").is_some());
    assert!(registry.find("protobuf").is_none());
}

#[test]
fn reconcile_adds_header_and_payload_contexts() {
    let mut contexts = Vec::new();
    reconcile_validation_contexts(&mut contexts, &Message::new("<doc/>"), MessageType::Xml);
    let kinds: Vec<&str> = contexts.iter().map(ValidationContext::kind).collect();
    assert_eq!(kinds, ["header", "xml"]);
}

#[test]
fn reconcile_backs_xpath_contexts_with_an_xml_context() {
    let mut contexts = vec![ValidationContext::Xpath(XpathValidationContext::default())];
    reconcile_validation_contexts(&mut contexts, &Message::new("<doc/>"), MessageType::Xml);
    let kinds: Vec<&str> = contexts.iter().map(ValidationContext::kind).collect();
    assert_eq!(kinds, ["xpath", "header", "xml"]);
}

#[test]
fn reconcile_backs_json_path_contexts_with_a_json_context() {
    let mut contexts = vec![ValidationContext::JsonPath(
        JsonPathValidationContext::default(),
    )];
    reconcile_validation_contexts(
        &mut contexts,
        &Message::new(r#"{"id": 1}"#),
        MessageType::Json,
    );
    let kinds: Vec<&str> = contexts.iter().map(ValidationContext::kind).collect();
    assert_eq!(kinds, ["json-path", "header", "json"]);
}

#[test]
fn reconcile_leaves_an_empty_control_payload_alone() {
    let mut contexts = Vec::new();
    reconcile_validation_contexts(&mut contexts, &Message::new("   "), MessageType::Json);
    let kinds: Vec<&str> = contexts.iter().map(ValidationContext::kind).collect();
    assert_eq!(kinds, ["header"]);
}

#[test]
fn reconcile_respects_an_existing_payload_context() {
    let mut contexts = vec![ValidationContext::Json(JsonValidationContext {
        strict: false,
        ignore_expressions: Vec::new(),
    })];
    reconcile_validation_contexts(
        &mut contexts,
        &Message::new(r#"{"id": 1}"#),
        MessageType::Json,
    );
    let kinds: Vec<&str> = contexts.iter().map(ValidationContext::kind).collect();
    assert_eq!(kinds, ["json", "header"]);
}

#[test]
fn reconcile_derives_yaml_from_the_declared_type() {
    let mut contexts = Vec::new();
    reconcile_validation_contexts(&mut contexts, &Message::new("user: jane\n"), MessageType::Yaml);
    let kinds: Vec<&str> = contexts.iter().map(ValidationContext::kind).collect();
    assert_eq!(kinds, ["header", "yaml"]);
}

#[test]
fn validate_received_message_merges_findings_across_validators() {
    let context = TestContext::new();
    let received =
        Message::new(r#"{"user": "john", "age": 31}"#).with_header("operation", "update");
    let control = Message::new(r#"{"user": "jane", "age": 32}"#).with_header("operation", "create");
    let mut contexts = Vec::new();
    reconcile_validation_contexts(&mut contexts, &control, MessageType::Json);
    let error =
        validate_received_message(&received, &control, MessageType::Json, &context, &contexts)
            .expect_err("mismatching pair");
    let WiretestError::Validation(error) = error else {
        panic!("expected a validation error, got {error}");
    };
    assert_eq!(
        error.failures,
        vec![
            "values not equal for entry '$.age', expected '32' but was '31'",
            "values not equal for entry '$.user', expected 'jane' but was 'john'",
            "values not equal for header 'operation', expected 'create' but was 'update'",
        ]
    );
}

#[test]
fn validate_received_message_accepts_a_matching_pair() {
    let context = TestContext::new();
    let received = Message::new(r#"{"user": "jane"}"#).with_header("operation", "create");
    let control = Message::new(r#"{"user": "jane"}"#).with_header("operation", "create");
    let mut contexts = Vec::new();
    reconcile_validation_contexts(&mut contexts, &control, MessageType::Json);
    let result =
        validate_received_message(&received, &control, MessageType::Json, &context, &contexts);
    assert!(result.is_ok());
}
