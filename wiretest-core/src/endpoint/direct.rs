use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::context::TestContext;
use crate::error::WiretestError;
use crate::message::Message;

use super::{Endpoint, EndpointAdapter, MessageSelector, DEFAULT_RECEIVE_TIMEOUT};

/// In-memory queue endpoint: producers push, consumers block-pop.
///
/// Clones share the same queue, so one clone can feed another across
/// threads.
#[derive(Clone)]
pub struct DirectEndpoint {
    inner: Arc<DirectInner>,
}

struct DirectInner {
    name: String,
    receive_timeout: Duration,
    queue: Mutex<VecDeque<Message>>,
    available: Condvar,
}

impl DirectEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        DirectEndpoint::with_receive_timeout(name, DEFAULT_RECEIVE_TIMEOUT)
    }

    pub fn with_receive_timeout(name: impl Into<String>, receive_timeout: Duration) -> Self {
        DirectEndpoint {
            inner: Arc::new(DirectInner {
                name: name.into(),
                receive_timeout,
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
            }),
        }
    }

    /// Number of queued messages, for diagnostics.
    pub fn queued(&self) -> usize {
        self.lock_queue().len()
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Message>> {
        match self.inner.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Endpoint for DirectEndpoint {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn receive_timeout(&self) -> Duration {
        self.inner.receive_timeout
    }

    fn send(&self, message: Message, context: &TestContext) -> Result<(), WiretestError> {
        log::debug!(
            "sending message on direct endpoint '{}': {}",
            self.inner.name,
            context.mask(message.payload())
        );
        self.lock_queue().push_back(message);
        self.inner.available.notify_all();
        Ok(())
    }

    fn receive_selected(
        &self,
        selector: &MessageSelector,
        timeout: Duration,
        context: &TestContext,
    ) -> Result<Message, WiretestError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock_queue();
        loop {
            if let Some(position) = queue.iter().position(|message| selector.matches(message)) {
                if let Some(message) = queue.remove(position) {
                    log::debug!(
                        "received message on direct endpoint '{}': {}",
                        self.inner.name,
                        context.mask(message.payload())
                    );
                    return Ok(message);
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WiretestError::Timeout {
                    endpoint: self.inner.name.clone(),
                    timeout,
                });
            }
            queue = match self.inner.available.wait_timeout(queue, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl std::fmt::Debug for DirectEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectEndpoint")
            .field("name", &self.inner.name)
            .field("queued", &self.queued())
            .finish()
    }
}

/// Endpoint that hands every sent message to an adapter and queues the
/// adapter's response for the next receive.
pub struct RespondingEndpoint {
    adapter: Arc<dyn EndpointAdapter>,
    replies: DirectEndpoint,
}

impl RespondingEndpoint {
    pub fn new(name: impl Into<String>, adapter: Arc<dyn EndpointAdapter>) -> Self {
        RespondingEndpoint {
            adapter,
            replies: DirectEndpoint::new(name),
        }
    }
}

impl Endpoint for RespondingEndpoint {
    fn name(&self) -> &str {
        self.replies.name()
    }

    fn receive_timeout(&self) -> Duration {
        self.replies.receive_timeout()
    }

    fn send(&self, message: Message, context: &TestContext) -> Result<(), WiretestError> {
        if let Some(response) = self.adapter.handle(&message, context)? {
            self.replies.send(response, context)?;
        }
        Ok(())
    }

    fn receive_selected(
        &self,
        selector: &MessageSelector,
        timeout: Duration,
        context: &TestContext,
    ) -> Result<Message, WiretestError> {
        self.replies.receive_selected(selector, timeout, context)
    }
}
