//! Message model: payload, ordered headers and raw header-data blobs.

pub mod builder;

pub use builder::MessageBuilder;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::WiretestError;

/// Framework-reserved header names attached to every message.
pub mod headers {
    /// Unique id generated when the message is created.
    pub const MESSAGE_ID: &str = "wiretest_message_id";
    /// Creation timestamp in epoch milliseconds.
    pub const TIMESTAMP: &str = "wiretest_message_timestamp";

    /// True for headers the framework manages itself; header validation skips these.
    pub fn is_internal(name: &str) -> bool {
        name == MESSAGE_ID || name == TIMESTAMP
    }
}

/// Payload format a test step declares for validator selection.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// XML payloads, the default.
    #[default]
    Xml,
    /// JSON payloads.
    Json,
    /// YAML payloads.
    Yaml,
    /// Anything compared as plain text.
    Plaintext,
}

impl MessageType {
    /// Parses a message type name, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, WiretestError> {
        match value.to_ascii_lowercase().as_str() {
            "xml" => Ok(MessageType::Xml),
            "json" => Ok(MessageType::Json),
            "yaml" => Ok(MessageType::Yaml),
            "plaintext" => Ok(MessageType::Plaintext),
            other => Err(WiretestError::configuration(format!(
                "unknown message type '{other}', expected xml, json, yaml, or plaintext"
            ))),
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Xml => "xml",
            MessageType::Json => "json",
            MessageType::Yaml => "yaml",
            MessageType::Plaintext => "plaintext",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A single message exchanged with an endpoint.
///
/// Headers keep insertion order. The payload is an opaque string; validators
/// decide how to interpret it. Header-data blobs carry raw fragments (for
/// example envelope headers) that travel beside the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    name: Option<String>,
    payload: String,
    headers: IndexMap<String, String>,
    header_data: Vec<String>,
}

impl Message {
    /// Creates a message with the given payload and generated id/timestamp headers.
    pub fn new(payload: impl Into<String>) -> Self {
        let mut headers = IndexMap::new();
        headers.insert(
            headers::MESSAGE_ID.to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        headers.insert(
            headers::TIMESTAMP.to_string(),
            chrono::Utc::now().timestamp_millis().to_string(),
        );
        Message {
            name: None,
            payload: payload.into(),
            headers,
            header_data: Vec::new(),
        }
    }

    /// Names the message for the per-context message store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a header, replacing any previous value of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Appends a raw header-data blob.
    pub fn with_header_data(mut self, blob: impl Into<String>) -> Self {
        self.header_data.push(blob.into());
        self
    }

    /// Optional store name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Generated message id.
    pub fn id(&self) -> &str {
        self.headers
            .get(headers::MESSAGE_ID)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Message payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// All headers in insertion order.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Looks up a header value by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Looks up a header value ignoring ASCII case of the name.
    pub fn header_ignore_case(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Raw header-data blobs in attachment order.
    pub fn header_data(&self) -> &[String] {
        &self.header_data
    }
}

/// True when the trimmed payload starts like an XML document.
pub fn has_xml_payload(message: &Message) -> bool {
    message.payload().trim_start().starts_with('<')
}

/// True when the trimmed payload starts like a JSON object or array.
pub fn has_json_payload(message: &Message) -> bool {
    let trimmed = message.payload().trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}
