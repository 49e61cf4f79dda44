//! Message validation: typed contexts, validator strategies and the registry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::TestContext;
use crate::error::{ValidationError, WiretestError};
use crate::message::{has_json_payload, has_xml_payload, Message, MessageType};

mod header;
mod json;
mod schema;
mod script;
mod text;
mod xml;
mod yaml;

pub use header::HeaderMessageValidator;
pub use json::{JsonMessageValidator, JsonPathMessageValidator};
pub use schema::JsonSchemaMessageValidator;
pub use script::ScriptMessageValidator;
pub use text::{EmptyPayloadMessageValidator, PlaintextMessageValidator};
pub use xml::{XmlMessageValidator, XpathMessageValidator};
pub use yaml::YamlMessageValidator;

#[cfg(test)]
#[path = "../../tests/internal/validation_unit_tests.rs"]
mod tests;

/// Parameters for header validation.
#[derive(Clone, Debug, Default)]
pub struct HeaderValidationContext {
    /// Match header names case-insensitively.
    pub ignore_case: bool,
}

/// Parameters for whole-payload XML validation.
#[derive(Clone, Debug, Default)]
pub struct XmlValidationContext {
    /// XPath expressions whose matched nodes are exempt from comparison.
    pub ignore_expressions: Vec<String>,
    /// Prefix-to-namespace bindings applied to qualified names.
    pub namespaces: IndexMap<String, String>,
}

/// Expected values for individual XPath expressions.
#[derive(Clone, Debug, Default)]
pub struct XpathValidationContext {
    /// Expected value per expression, checked in insertion order.
    pub expressions: IndexMap<String, String>,
    /// Prefix-to-namespace bindings applied to qualified names.
    pub namespaces: IndexMap<String, String>,
}

/// Parameters for whole-payload JSON validation.
#[derive(Clone, Debug)]
pub struct JsonValidationContext {
    /// Require the same entry count on both sides.
    pub strict: bool,
    /// JsonPath expressions whose matched values are exempt from comparison.
    pub ignore_expressions: Vec<String>,
}

impl Default for JsonValidationContext {
    fn default() -> Self {
        JsonValidationContext {
            strict: true,
            ignore_expressions: Vec::new(),
        }
    }
}

/// Expected values for individual JsonPath expressions.
#[derive(Clone, Debug, Default)]
pub struct JsonPathValidationContext {
    /// Expected value per expression, checked in insertion order.
    pub expressions: IndexMap<String, String>,
}

/// Parameters for YAML validation; documents compare as value trees.
#[derive(Clone, Debug)]
pub struct YamlValidationContext {
    /// Require the same entry count on both sides.
    pub strict: bool,
    /// JsonPath expressions applied to the converted document.
    pub ignore_expressions: Vec<String>,
}

impl Default for YamlValidationContext {
    fn default() -> Self {
        YamlValidationContext {
            strict: true,
            ignore_expressions: Vec::new(),
        }
    }
}

/// JSON schema the received payload must satisfy.
#[derive(Clone, Debug)]
pub struct SchemaValidationContext {
    pub schema: serde_json::Value,
}

/// Callable applied to the received message by the script validator.
pub type ScriptValidatorFn = Arc<dyn Fn(&Message, &TestContext) -> Result<(), String> + Send + Sync>;

/// Custom verification closure with a diagnostic name.
#[derive(Clone)]
pub struct ScriptValidationContext {
    pub name: String,
    script: ScriptValidatorFn,
}

impl ScriptValidationContext {
    pub fn new(
        name: impl Into<String>,
        script: impl Fn(&Message, &TestContext) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        ScriptValidationContext {
            name: name.into(),
            script: Arc::new(script),
        }
    }

    pub fn run(&self, received: &Message, context: &TestContext) -> Result<(), String> {
        (self.script)(received, context)
    }
}

impl fmt::Debug for ScriptValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptValidationContext")
            .field("name", &self.name)
            .finish()
    }
}

/// Typed parameter bag guiding one validator's comparison logic.
///
/// One receive step may carry several contexts; each validator filters the
/// list to the variant(s) it understands and ignores the rest.
#[derive(Clone, Debug)]
pub enum ValidationContext {
    Header(HeaderValidationContext),
    Xml(XmlValidationContext),
    Xpath(XpathValidationContext),
    Json(JsonValidationContext),
    JsonPath(JsonPathValidationContext),
    Yaml(YamlValidationContext),
    Schema(SchemaValidationContext),
    Script(ScriptValidationContext),
}

impl ValidationContext {
    /// Short name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationContext::Header(_) => "header",
            ValidationContext::Xml(_) => "xml",
            ValidationContext::Xpath(_) => "xpath",
            ValidationContext::Json(_) => "json",
            ValidationContext::JsonPath(_) => "json-path",
            ValidationContext::Yaml(_) => "yaml",
            ValidationContext::Schema(_) => "schema",
            ValidationContext::Script(_) => "script",
        }
    }

    /// Contexts that must not be silently skipped when no validator takes them.
    fn requires_capable_validator(&self) -> bool {
        matches!(
            self,
            ValidationContext::Xpath(_)
                | ValidationContext::JsonPath(_)
                | ValidationContext::Schema(_)
                | ValidationContext::Script(_)
        )
    }
}

/// Compares a received message against a control message.
///
/// Implementations collect every mismatch they find instead of stopping at
/// the first; a failed run reports the full list as one validation error.
pub trait MessageValidator: Send + Sync {
    /// Registry name, also used in log output.
    fn name(&self) -> &str;

    /// Payload validators compare whole payloads; their
    /// `supports_message_type` claims are disjoint by payload shape.
    fn is_payload_validator(&self) -> bool {
        false
    }

    /// Whether this validator applies to the given message.
    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool;

    /// Whether this validator consumes the given context.
    fn supports_validation_context(&self, context: &ValidationContext) -> bool;

    fn validate_message(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError>;
}

impl std::fmt::Debug for dyn MessageValidator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MessageValidator")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered registry of named message validators.
pub struct MessageValidatorRegistry {
    validators: Vec<(String, Arc<dyn MessageValidator>)>,
}

impl MessageValidatorRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        MessageValidatorRegistry {
            validators: Vec::new(),
        }
    }

    /// Registers a validator under a unique name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        validator: Arc<dyn MessageValidator>,
    ) -> Result<(), WiretestError> {
        let name = name.into();
        if self.validators.iter().any(|(existing, _)| *existing == name) {
            return Err(WiretestError::configuration(format!(
                "message validator '{name}' is already registered"
            )));
        }
        self.validators.push((name, validator));
        Ok(())
    }

    /// Looks up a validator by registry name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn MessageValidator>> {
        self.validators
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, validator)| Arc::clone(validator))
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.validators
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Selects every validator that applies to the received message.
    ///
    /// When the declared type finds no payload validator the payload is
    /// sniffed: `<` revalidates as XML, `{` or `[` as JSON, otherwise
    /// plaintext; an empty payload selects the empty-payload validator.
    /// A path, schema or script context with no capable validator in the
    /// selection is a configuration error.
    pub fn find_validators(
        &self,
        message_type: MessageType,
        received: &Message,
        validation_contexts: &[ValidationContext],
    ) -> Result<Vec<Arc<dyn MessageValidator>>, WiretestError> {
        let mut selected: Vec<Arc<dyn MessageValidator>> = Vec::new();
        let mut has_payload_validator = false;
        for (_, validator) in &self.validators {
            if validator.supports_message_type(message_type, received) {
                has_payload_validator |= validator.is_payload_validator();
                selected.push(Arc::clone(validator));
            }
        }
        if !has_payload_validator {
            if let Some(fallback) = self.sniff_payload_validator(received) {
                log::debug!(
                    "message type '{message_type}' matched no payload validator, sniffed '{}'",
                    fallback.name()
                );
                selected.push(fallback);
            }
        }
        for context in validation_contexts {
            if context.requires_capable_validator()
                && !selected
                    .iter()
                    .any(|validator| validator.supports_validation_context(context))
            {
                return Err(WiretestError::configuration(format!(
                    "failed to find proper message validator for message type '{message_type}' \
                     and validation context '{}'",
                    context.kind()
                )));
            }
        }
        Ok(selected)
    }

    fn sniff_payload_validator(&self, received: &Message) -> Option<Arc<dyn MessageValidator>> {
        let payload = received.payload().trim();
        let name = if payload.is_empty() {
            "empty-payload"
        } else if has_xml_payload(received) {
            "xml"
        } else if has_json_payload(received) {
            "json"
        } else {
            "plaintext"
        };
        self.find(name)
    }
}

impl Default for MessageValidatorRegistry {
    fn default() -> Self {
        let mut registry = MessageValidatorRegistry::empty();
        let shipped: [(&str, Arc<dyn MessageValidator>); 10] = [
            ("xml", Arc::new(XmlMessageValidator)),
            ("xpath", Arc::new(XpathMessageValidator)),
            ("json", Arc::new(JsonMessageValidator)),
            ("json-path", Arc::new(JsonPathMessageValidator)),
            ("yaml", Arc::new(YamlMessageValidator)),
            ("schema", Arc::new(JsonSchemaMessageValidator)),
            ("plaintext", Arc::new(PlaintextMessageValidator::new())),
            ("script", Arc::new(ScriptMessageValidator)),
            ("header", Arc::new(HeaderMessageValidator)),
            ("empty-payload", Arc::new(EmptyPayloadMessageValidator)),
        ];
        for (name, validator) in shipped {
            // names are unique here, registration cannot fail
            let _ = registry.register(name, validator);
        }
        registry
    }
}

impl fmt::Debug for MessageValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}

/// Fills in the contexts a receive step left implicit.
///
/// Ensures a header context exists, backs path contexts with their base
/// payload context, and when no payload context was declared at all derives
/// one from the control payload shape.
pub fn reconcile_validation_contexts(
    validation_contexts: &mut Vec<ValidationContext>,
    control: &Message,
    message_type: MessageType,
) {
    let mut has_header = false;
    let mut has_xml = false;
    let mut has_json = false;
    let mut has_yaml = false;
    let mut has_xpath = false;
    let mut has_json_path = false;
    for context in validation_contexts.iter() {
        match context {
            ValidationContext::Header(_) => has_header = true,
            ValidationContext::Xml(_) => has_xml = true,
            ValidationContext::Json(_) => has_json = true,
            ValidationContext::Yaml(_) => has_yaml = true,
            ValidationContext::Xpath(_) => has_xpath = true,
            ValidationContext::JsonPath(_) => has_json_path = true,
            _ => {}
        }
    }
    if !has_header {
        validation_contexts.push(ValidationContext::Header(HeaderValidationContext::default()));
    }
    if has_xpath && !has_xml {
        validation_contexts.push(ValidationContext::Xml(XmlValidationContext::default()));
        has_xml = true;
    }
    if has_json_path && !has_json {
        validation_contexts.push(ValidationContext::Json(JsonValidationContext::default()));
        has_json = true;
    }
    if has_xml || has_json || has_yaml {
        return;
    }
    if control.payload().trim().is_empty() {
        return;
    }
    if has_xml_payload(control) {
        validation_contexts.push(ValidationContext::Xml(XmlValidationContext::default()));
    } else if has_json_payload(control) {
        validation_contexts.push(ValidationContext::Json(JsonValidationContext::default()));
    } else if message_type == MessageType::Yaml {
        validation_contexts.push(ValidationContext::Yaml(YamlValidationContext::default()));
    }
}

/// Runs every applicable validator from the context's registry and merges
/// their findings into one result.
///
/// Later validators still run after an earlier one fails, so the returned
/// error lists the mismatches of the whole receive step.
pub fn validate_received_message(
    received: &Message,
    control: &Message,
    message_type: MessageType,
    context: &TestContext,
    validation_contexts: &[ValidationContext],
) -> Result<(), WiretestError> {
    let validators =
        context
            .validators()
            .find_validators(message_type, received, validation_contexts)?;
    let mut aggregate: Option<ValidationError> = None;
    for validator in validators {
        log::debug!("running message validator '{}'", validator.name());
        if let Err(error) =
            validator.validate_message(received, control, context, validation_contexts)
        {
            match &mut aggregate {
                Some(existing) => existing.merge(error),
                None => aggregate = Some(error),
            }
        }
    }
    match aggregate {
        Some(error) => Err(WiretestError::Validation(error)),
        None => Ok(()),
    }
}
