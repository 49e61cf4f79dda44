//! Control and outbound message construction.

use std::fs;
use std::path::PathBuf;

use crate::context::TestContext;
use crate::error::WiretestError;
use crate::message::{Message, MessageType};

/// Payload source resolved when the message is built.
#[derive(Clone, Debug)]
pub enum MessagePayload {
    /// Inline payload text.
    Literal(String),
    /// Payload read from a file at build time.
    Resource(PathBuf),
    /// Structured payload marshalled according to the target message type.
    Structured(serde_json::Value),
}

impl Default for MessagePayload {
    fn default() -> Self {
        MessagePayload::Literal(String::new())
    }
}

/// Assembles a [`Message`] from payload and header parts.
///
/// Every part passes through dynamic-content replacement against the test
/// context when [`MessageBuilder::build`] runs. Any failure aborts the build;
/// partial messages are never produced.
#[derive(Clone, Debug, Default)]
pub struct MessageBuilder {
    name: Option<String>,
    payload: MessagePayload,
    headers: Vec<(String, String)>,
    header_data: Vec<String>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = MessagePayload::Literal(payload.into());
        self
    }

    pub fn with_payload_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.payload = MessagePayload::Resource(path.into());
        self
    }

    pub fn with_structured_payload(mut self, value: serde_json::Value) -> Self {
        self.payload = MessagePayload::Structured(value);
        self
    }

    /// Registers a header value. Later registrations overwrite earlier ones
    /// with the same resolved name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers<N, V>(mut self, headers: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers.push((name.into(), value.into()));
        }
        self
    }

    pub fn with_header_data(mut self, fragment: impl Into<String>) -> Self {
        self.header_data.push(fragment.into());
        self
    }

    /// Builds the message, resolving all dynamic content against `context`.
    pub fn build(
        &self,
        context: &TestContext,
        message_type: MessageType,
    ) -> Result<Message, WiretestError> {
        let payload = self.resolve_payload(message_type)?;
        let payload = context.replace_dynamic_content(&payload)?;
        let mut message = Message::new(payload);
        if let Some(name) = &self.name {
            message = message.with_name(name.clone());
        }
        for (name, value) in &self.headers {
            let name = context.replace_dynamic_content(name)?;
            let value = context.replace_dynamic_content(value)?;
            message.set_header(name, value);
        }
        for fragment in &self.header_data {
            message = message.with_header_data(context.replace_dynamic_content(fragment)?);
        }
        Ok(message)
    }

    fn resolve_payload(&self, message_type: MessageType) -> Result<String, WiretestError> {
        match &self.payload {
            MessagePayload::Literal(text) => Ok(text.clone()),
            MessagePayload::Resource(path) => fs::read_to_string(path).map_err(|error| {
                WiretestError::construction(format!(
                    "failed to read payload resource '{}': {error}",
                    path.display()
                ))
            }),
            MessagePayload::Structured(value) => match message_type {
                MessageType::Json => serde_json::to_string(value).map_err(|error| {
                    WiretestError::construction(format!("failed to marshal json payload: {error}"))
                }),
                MessageType::Yaml => serde_yaml::to_string(value).map_err(|error| {
                    WiretestError::construction(format!("failed to marshal yaml payload: {error}"))
                }),
                other => Err(WiretestError::construction(format!(
                    "structured payloads cannot be marshalled to message type '{other}'"
                ))),
            },
        }
    }
}
