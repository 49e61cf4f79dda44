//! Endpoints: the transport seams actions send through and receive from.

pub mod adapter;
mod direct;
mod http;

pub use adapter::{
    DispatchingEndpointAdapter, EmptyResponseEndpointAdapter, EndpointAdapter,
    MappingKeyExtractor, StaticResponseEndpointAdapter,
};
pub use direct::{DirectEndpoint, RespondingEndpoint};
pub use http::{
    HttpClientEndpoint, HttpServerEndpoint, HTTP_METHOD, HTTP_REQUEST_URI, HTTP_STATUS_CODE,
};

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::context::TestContext;
use crate::error::WiretestError;
use crate::message::Message;

/// Wait applied to blocking receives when neither the endpoint nor the
/// receive action configures one.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// A named transport that exchanges messages with the system under test.
pub trait Endpoint: Send + Sync {
    /// Endpoint name used in diagnostics and timeout errors.
    fn name(&self) -> &str;

    /// Receive wait used when the receive action does not set its own.
    fn receive_timeout(&self) -> Duration {
        DEFAULT_RECEIVE_TIMEOUT
    }

    /// Sends a message through the transport.
    fn send(&self, message: Message, context: &TestContext) -> Result<(), WiretestError>;

    /// Blocks until any message arrives or the timeout elapses.
    fn receive(&self, timeout: Duration, context: &TestContext) -> Result<Message, WiretestError> {
        self.receive_selected(&MessageSelector::default(), timeout, context)
    }

    /// Blocks until a message matching the selector arrives or the timeout
    /// elapses, surfacing the timeout error with this endpoint's name.
    fn receive_selected(
        &self,
        selector: &MessageSelector,
        timeout: Duration,
        context: &TestContext,
    ) -> Result<Message, WiretestError>;
}

impl std::fmt::Debug for dyn Endpoint {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Endpoint")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Header-equality filter a receive action applies to queued messages.
///
/// An empty selector matches every message.
#[derive(Clone, Debug, Default)]
pub struct MessageSelector {
    headers: IndexMap<String, String>,
}

impl MessageSelector {
    /// Requires an exact header value; chainable.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.headers
            .iter()
            .all(|(name, value)| message.header(name) == Some(value.as_str()))
    }
}

/// Named endpoints available to a test run.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    endpoints: IndexMap<String, Arc<dyn Endpoint>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        EndpointRegistry::default()
    }

    /// Registers an endpoint under its own name, replacing a previous entry.
    pub fn register(&mut self, endpoint: Arc<dyn Endpoint>) {
        self.endpoints.insert(endpoint.name().to_string(), endpoint);
    }

    /// Resolves an endpoint by name.
    pub fn find(&self, name: &str) -> Result<Arc<dyn Endpoint>, WiretestError> {
        self.endpoints.get(name).cloned().ok_or_else(|| {
            WiretestError::configuration(format!("no endpoint registered for name '{name}'"))
        })
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.endpoints.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &self.names())
            .finish()
    }
}
