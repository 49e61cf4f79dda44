use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde::Serialize;

use wiretest_core::{TestContext, TestResult, TestStatus};

/// JSON-lines event sink for `--trace`: a header record, then per case its
/// exchanged messages and outcome. Payloads and header values pass through
/// the context's masking before they are written.
#[derive(Clone, Debug)]
pub(super) struct TraceFileSink {
    path: String,
    file: Arc<Mutex<fs::File>>,
    write_failed: Arc<AtomicBool>,
}

#[derive(Serialize)]
struct MessageRecord<'a> {
    case: &'a str,
    event: &'static str,
    action: &'a str,
    payload: String,
    headers: IndexMap<String, String>,
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    case: &'a str,
    event: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    duration_ms: u64,
}

impl TraceFileSink {
    pub(super) fn new(path: &str) -> Result<Self, String> {
        let path = path.to_string();
        let mut file = match fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(error) => return Err(format!("failed to write trace file '{path}': {error}")),
        };
        use std::io::Write;
        let header = serde_json::json!({ "format": "wiretest_trace_v1" });
        let header_line = format!("{header}\n");
        if let Err(error) = file.write_all(header_line.as_bytes()) {
            return Err(format!("failed to write trace file '{path}': {error}"));
        }
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
            write_failed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Appends one message record per stored message, then the case result.
    pub(super) fn record_case(&self, result: &TestResult, context: &TestContext) {
        for (action, message) in context.stored_messages() {
            let headers = message
                .headers()
                .iter()
                .map(|(name, value)| (name.clone(), context.mask(value)))
                .collect();
            let record = MessageRecord {
                case: &result.name,
                event: "message",
                action: &action,
                payload: context.mask(message.payload()),
                headers,
            };
            if let Ok(line) = serde_json::to_string(&record) {
                self.write_line(&line);
            }
        }
        let (status, reason) = match &result.status {
            TestStatus::Success => ("passed", None),
            TestStatus::Failure { reason } => ("failed", Some(reason.as_str())),
        };
        let record = ResultRecord {
            case: &result.name,
            event: "result",
            status,
            reason,
            duration_ms: result.duration.as_millis() as u64,
        };
        if let Ok(line) = serde_json::to_string(&record) {
            self.write_line(&line);
        }
    }

    fn write_line(&self, line: &str) {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(_) => return,
        };
        let result = {
            use std::io::Write;
            file.write_all(line.as_bytes())
                .and_then(|()| file.write_all(b"\n"))
        };
        if result.is_err()
            && !self
                .write_failed
                .swap(true, std::sync::atomic::Ordering::Relaxed)
        {
            eprintln!("failed to append trace output to '{}'", self.path);
        }
    }
}
