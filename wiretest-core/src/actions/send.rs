use std::sync::Arc;

use crate::context::TestContext;
use crate::endpoint::Endpoint;
use crate::error::WiretestError;
use crate::message::{MessageBuilder, MessageType};

use super::TestAction;

/// Builds a message against the current context and hands it to an endpoint.
///
/// Forked sends run on their own thread; their failures surface through the
/// context's collected exceptions when the test case finishes.
pub struct SendAction {
    name: String,
    endpoint: Arc<dyn Endpoint>,
    builder: MessageBuilder,
    message_type: MessageType,
    fork: bool,
}

impl SendAction {
    pub fn new(
        name: impl Into<String>,
        endpoint: Arc<dyn Endpoint>,
        builder: MessageBuilder,
    ) -> Self {
        SendAction {
            name: name.into(),
            endpoint,
            builder,
            message_type: MessageType::default(),
            fork: false,
        }
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Sends on a separate thread instead of blocking the action sequence.
    pub fn forked(mut self) -> Self {
        self.fork = true;
        self
    }
}

impl TestAction for SendAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        let message = self.builder.build(context, self.message_type)?;
        context.store_message(self.name.clone(), message.clone());
        log::debug!(
            "send action '{}' dispatching message to endpoint '{}'",
            self.name,
            self.endpoint.name()
        );
        if self.fork {
            let endpoint = Arc::clone(&self.endpoint);
            let name = self.name.clone();
            let forked = context.clone();
            std::thread::spawn(move || {
                if let Err(error) = endpoint.send(message, &forked) {
                    forked.add_exception(format!("forked send '{name}' failed: {error}"));
                }
            });
            return Ok(());
        }
        self.endpoint.send(message, context)
    }
}
