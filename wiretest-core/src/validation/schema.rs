use jsonschema::{draft201909, draft202012, draft4, draft6, draft7, Validator};
use serde_json::Value;

use crate::context::TestContext;
use crate::error::ValidationError;
use crate::message::{has_json_payload, Message, MessageType};

use super::{MessageValidator, ValidationContext};

const DRAFT202012: &str = "https://json-schema.org/draft/2020-12/schema";
const DRAFT201909: &str = "https://json-schema.org/draft/2019-09/schema";
const DRAFT7_HTTP: &str = "http://json-schema.org/draft-07/schema";
const DRAFT7_HTTPS: &str = "https://json-schema.org/draft-07/schema";
const DRAFT6_HTTP: &str = "http://json-schema.org/draft-06/schema";
const DRAFT6_HTTPS: &str = "https://json-schema.org/draft-06/schema";
const DRAFT4_HTTP: &str = "http://json-schema.org/draft-04/schema";
const DRAFT4_HTTPS: &str = "https://json-schema.org/draft-04/schema";

fn normalize_schema_id(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed.strip_suffix('#').unwrap_or(trimmed)
}

/// Compiles a schema with the dialect named in its `$schema` field, falling
/// back to draft 2020-12 when the field is absent.
fn compile_schema(schema: &Value) -> Result<Validator, String> {
    let schema_id = schema
        .get("$schema")
        .and_then(|value| value.as_str())
        .map(normalize_schema_id)
        .unwrap_or(DRAFT202012);

    match schema_id {
        DRAFT202012 => draft202012::new(schema).map_err(|error| error.to_string()),
        DRAFT201909 => draft201909::new(schema).map_err(|error| error.to_string()),
        DRAFT7_HTTP | DRAFT7_HTTPS => draft7::new(schema).map_err(|error| error.to_string()),
        DRAFT6_HTTP | DRAFT6_HTTPS => draft6::new(schema).map_err(|error| error.to_string()),
        DRAFT4_HTTP | DRAFT4_HTTPS => draft4::new(schema).map_err(|error| error.to_string()),
        other => Err(format!("unknown json schema version: {other}")),
    }
}

/// Validates the received JSON payload against declared JSON schemas and
/// reports every violation.
pub struct JsonSchemaMessageValidator;

impl MessageValidator for JsonSchemaMessageValidator {
    fn name(&self) -> &str {
        "schema"
    }

    fn supports_message_type(&self, message_type: MessageType, message: &Message) -> bool {
        message_type == MessageType::Json || has_json_payload(message)
    }

    fn supports_validation_context(&self, context: &ValidationContext) -> bool {
        matches!(context, ValidationContext::Schema(_))
    }

    fn validate_message(
        &self,
        received: &Message,
        _control: &Message,
        _context: &TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let schemas: Vec<&Value> = validation_contexts
            .iter()
            .filter_map(|context| match context {
                ValidationContext::Schema(settings) => Some(&settings.schema),
                _ => None,
            })
            .collect();
        if schemas.is_empty() {
            return Ok(());
        }
        let instance: Value = serde_json::from_str(received.payload()).map_err(|error| {
            ValidationError::single(format!("failed to parse json payload: {error}"))
        })?;
        let mut failures = Vec::new();
        for schema in schemas {
            let validator = match compile_schema(schema) {
                Ok(validator) => validator,
                Err(error) => {
                    failures.push(error);
                    continue;
                }
            };
            for violation in validator.iter_errors(&instance) {
                let pointer = violation.instance_path.to_string();
                let location = if pointer.is_empty() {
                    "$".to_string()
                } else {
                    pointer
                };
                failures.push(format!("schema violation at '{location}': {violation}"));
            }
        }
        if failures.is_empty() {
            log::debug!("json schema validation successful: all values ok");
            Ok(())
        } else {
            Err(ValidationError::from_failures(failures))
        }
    }
}
