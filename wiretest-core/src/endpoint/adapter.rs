//! Request handling decoupled from transports: static, empty and
//! key-dispatching adapters.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::TestContext;
use crate::error::WiretestError;
use crate::jsonpath;
use crate::message::builder::MessageBuilder;
use crate::message::{Message, MessageType};
use crate::xml::{parse_document, xpath};

/// Handles one inbound request message, optionally producing a response.
pub trait EndpointAdapter: Send + Sync {
    fn handle(
        &self,
        request: &Message,
        context: &TestContext,
    ) -> Result<Option<Message>, WiretestError>;
}

/// Replies to every request with a templated control message, resolved
/// against the context at request time.
pub struct StaticResponseEndpointAdapter {
    builder: MessageBuilder,
    message_type: MessageType,
}

impl StaticResponseEndpointAdapter {
    pub fn new(builder: MessageBuilder) -> Self {
        StaticResponseEndpointAdapter {
            builder,
            message_type: MessageType::default(),
        }
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }
}

impl EndpointAdapter for StaticResponseEndpointAdapter {
    fn handle(
        &self,
        _request: &Message,
        context: &TestContext,
    ) -> Result<Option<Message>, WiretestError> {
        let response = self.builder.build(context, self.message_type)?;
        Ok(Some(response))
    }
}

/// Swallows every request without responding.
pub struct EmptyResponseEndpointAdapter;

impl EndpointAdapter for EmptyResponseEndpointAdapter {
    fn handle(
        &self,
        request: &Message,
        _context: &TestContext,
    ) -> Result<Option<Message>, WiretestError> {
        log::debug!("discarding request message '{}' without response", request.id());
        Ok(None)
    }
}

/// Pulls the dispatch key out of a request message.
#[derive(Clone, Debug)]
pub enum MappingKeyExtractor {
    /// Value of the named header.
    Header(String),
    /// String value of an XPath expression over the payload.
    Xpath(String),
    /// String value of a JsonPath expression over the payload.
    JsonPath(String),
}

impl MappingKeyExtractor {
    pub fn extract(&self, request: &Message) -> Result<String, WiretestError> {
        match self {
            MappingKeyExtractor::Header(name) => {
                request.header(name).map(str::to_string).ok_or_else(|| {
                    WiretestError::dispatch(format!(
                        "failed to extract mapping key: no header '{name}' in request"
                    ))
                })
            }
            MappingKeyExtractor::Xpath(expression) => {
                let root = parse_document(request.payload())
                    .map_err(|error| mapping_key_error(&error))?;
                let value = xpath::evaluate(&root, expression)
                    .map_err(|error| mapping_key_error(&error))?;
                Ok(value.to_string())
            }
            MappingKeyExtractor::JsonPath(expression) => {
                let document: serde_json::Value = serde_json::from_str(request.payload())
                    .map_err(|error| mapping_key_error(&error.to_string()))?;
                let value = jsonpath::evaluate(&document, expression)
                    .map_err(|error| mapping_key_error(&error))?;
                Ok(jsonpath::render_value(&value))
            }
        }
    }
}

fn mapping_key_error(reason: &str) -> WiretestError {
    WiretestError::dispatch(format!("failed to extract mapping key: {reason}"))
}

/// Routes requests to delegate adapters keyed by an extracted mapping key.
///
/// Delegates are adapters themselves, so dispatchers nest.
pub struct DispatchingEndpointAdapter {
    extractor: MappingKeyExtractor,
    mappings: IndexMap<String, Arc<dyn EndpointAdapter>>,
}

impl DispatchingEndpointAdapter {
    pub fn new(extractor: MappingKeyExtractor) -> Self {
        DispatchingEndpointAdapter {
            extractor,
            mappings: IndexMap::new(),
        }
    }

    pub fn with_mapping(mut self, key: impl Into<String>, adapter: Arc<dyn EndpointAdapter>) -> Self {
        self.mappings.insert(key.into(), adapter);
        self
    }
}

impl EndpointAdapter for DispatchingEndpointAdapter {
    fn handle(
        &self,
        request: &Message,
        context: &TestContext,
    ) -> Result<Option<Message>, WiretestError> {
        let key = self.extractor.extract(request)?;
        let adapter = self.mappings.get(&key).ok_or_else(|| {
            WiretestError::configuration(format!(
                "no endpoint adapter mapping found for key '{key}'"
            ))
        })?;
        log::debug!("dispatching request with mapping key '{key}'");
        adapter.handle(request, context)
    }
}
