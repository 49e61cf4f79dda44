use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ctor::ctor;

use wiretest_core::endpoint::MessageSelector;
use wiretest_core::{Endpoint, Message, TestAction, TestContext, WiretestError};

#[ctor]
fn init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

/// JSON order message used across workspace tests.
pub fn order_message(id: &str, status: &str) -> Message {
    let payload = serde_json::json!({"order": {"id": id, "status": status}});
    Message::new(payload.to_string()).with_header("operation", "create")
}

/// XML booking message used across workspace tests.
pub fn booking_message(reference: &str) -> Message {
    Message::new(format!(
        "<booking><reference>{reference}</reference><state>held</state></booking>"
    ))
    .with_header("operation", "book")
}

/// Endpoint that replays scripted replies and records everything sent
/// through it. Replies are handed out in script order, honoring selectors.
pub struct ScriptedEndpoint {
    name: String,
    receive_timeout: Duration,
    replies: Mutex<VecDeque<Message>>,
    sent: Arc<Mutex<Vec<Message>>>,
}

impl ScriptedEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        ScriptedEndpoint {
            name: name.into(),
            receive_timeout: Duration::from_millis(100),
            replies: Mutex::new(VecDeque::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(self, message: Message) -> Self {
        self.replies.lock().expect("script replies").push_back(message);
        self
    }

    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }

    /// Messages sent through this endpoint, in send order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().expect("sent messages").clone()
    }

    /// Replies still queued in the script.
    pub fn remaining_replies(&self) -> usize {
        self.replies.lock().expect("script replies").len()
    }
}

impl Endpoint for ScriptedEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    fn send(&self, message: Message, _context: &TestContext) -> Result<(), WiretestError> {
        self.sent.lock().expect("sent messages").push(message);
        Ok(())
    }

    fn receive_selected(
        &self,
        selector: &MessageSelector,
        timeout: Duration,
        _context: &TestContext,
    ) -> Result<Message, WiretestError> {
        let mut replies = self.replies.lock().expect("script replies");
        let position = replies.iter().position(|message| selector.matches(message));
        match position.and_then(|index| replies.remove(index)) {
            Some(message) => Ok(message),
            None => Err(WiretestError::Timeout {
                endpoint: self.name.clone(),
                timeout,
            }),
        }
    }
}

/// Endpoint whose operations always fail with the configured reason.
pub struct FailingEndpoint {
    name: String,
    reason: String,
}

impl FailingEndpoint {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        FailingEndpoint {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl Endpoint for FailingEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, _message: Message, _context: &TestContext) -> Result<(), WiretestError> {
        Err(WiretestError::dispatch(self.reason.clone()))
    }

    fn receive_selected(
        &self,
        _selector: &MessageSelector,
        _timeout: Duration,
        _context: &TestContext,
    ) -> Result<Message, WiretestError> {
        Err(WiretestError::dispatch(self.reason.clone()))
    }
}

/// Action that appends its name to a shared log on every execution and
/// optionally fails afterwards.
pub struct RecordingAction {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    failure: Option<String>,
}

impl RecordingAction {
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        RecordingAction {
            name: name.into(),
            log,
            failure: None,
        }
    }

    pub fn failing(
        name: impl Into<String>,
        log: Arc<Mutex<Vec<String>>>,
        reason: impl Into<String>,
    ) -> Self {
        RecordingAction {
            name: name.into(),
            log,
            failure: Some(reason.into()),
        }
    }
}

impl TestAction for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, _context: &mut TestContext) -> Result<(), WiretestError> {
        self.log.lock().expect("action log").push(self.name.clone());
        match &self.failure {
            Some(reason) => Err(WiretestError::dispatch(reason.clone())),
            None => Ok(()),
        }
    }
}
