//! Declarative test definitions: the serde model, file loading and the
//! wiring that turns a parsed definition into live endpoints and a
//! runnable suite.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use wiretest_core::validation::{
    JsonValidationContext, XmlValidationContext, YamlValidationContext,
};
use wiretest_core::{
    CreateVariablesAction, DirectEndpoint, DispatchingEndpointAdapter, EchoAction,
    EmptyResponseEndpointAdapter, Endpoint, EndpointAdapter, EndpointRegistry, FailAction,
    HttpClientEndpoint, HttpServerEndpoint, MappingKeyExtractor, MessageBuilder, MessageSelector,
    MessageType, ParallelContainer, ReceiveAction, RepeatOnErrorContainer, RespondingEndpoint,
    SendAction, SequentialContainer, SleepAction, StaticResponseEndpointAdapter, TestAction,
    TestCase, TestRunner, ValidationContext, VariableExtractor,
};

/// Root of one test definition file.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TestDefinition {
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
    #[serde(default)]
    pub cases: Vec<CaseDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EndpointDef {
    /// In-memory queue, optionally answering through a responder.
    Direct(DirectEndpointDef),
    /// Blocking HTTP client; responses queue up for receive steps.
    HttpClient(HttpClientEndpointDef),
    /// Embedded HTTP server answering through a responder.
    HttpServer(HttpServerEndpointDef),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DirectEndpointDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<ResponderDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HttpClientEndpointDef {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HttpServerEndpointDef {
    pub name: String,
    /// Bind address, for example `127.0.0.1:8080` or `127.0.0.1:0`.
    pub bind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<ResponderDef>,
}

/// How an endpoint answers inbound requests. Dispatch mappings hold
/// responders themselves, so routing trees nest.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponderDef {
    /// The same templated response for every request.
    Static(MessageDef),
    /// Accept requests without replying.
    Empty,
    /// Route on a key extracted from the request.
    Dispatch(DispatchDef),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DispatchDef {
    pub key: MappingKeyDef,
    #[serde(default)]
    pub mappings: IndexMap<String, ResponderDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingKeyDef {
    /// Value of the named request header.
    Header(String),
    /// String value of an XPath expression over the request payload.
    Xpath(String),
    /// String value of a JsonPath expression over the request payload.
    JsonPath(String),
}

impl MappingKeyDef {
    fn extractor(&self) -> MappingKeyExtractor {
        match self {
            MappingKeyDef::Header(name) => MappingKeyExtractor::Header(name.clone()),
            MappingKeyDef::Xpath(expression) => MappingKeyExtractor::Xpath(expression.clone()),
            MappingKeyDef::JsonPath(expression) => {
                MappingKeyExtractor::JsonPath(expression.clone())
            }
        }
    }
}

/// Message template shared by send steps, receive control messages and
/// static responders.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MessageDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Path of a file the payload is read from when the message is built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_file: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
}

impl MessageDef {
    fn builder(&self) -> Result<MessageBuilder, String> {
        if self.payload.is_some() && self.payload_file.is_some() {
            return Err("message sets both payload and payload_file".to_string());
        }
        let mut builder = MessageBuilder::new();
        if let Some(payload) = &self.payload {
            builder = builder.with_payload(payload.clone());
        }
        if let Some(path) = &self.payload_file {
            builder = builder.with_payload_resource(path.clone());
        }
        Ok(builder.with_headers(self.headers.clone()))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CaseDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finally: Vec<ActionDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionDef {
    Send(SendDef),
    Receive(ReceiveDef),
    /// Logs the resolved text.
    Echo(String),
    Sleep(SleepDef),
    /// Creates variables in order; later entries may use earlier ones.
    CreateVariables(IndexMap<String, String>),
    /// Fails the case with the resolved text.
    Fail(String),
    Sequential(ContainerDef),
    Parallel(ContainerDef),
    RepeatOnError(RepeatDef),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SendDef {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub message: MessageDef,
    /// Send on a separate thread instead of blocking the sequence.
    #[serde(default)]
    pub fork: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReceiveDef {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub message: MessageDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Header equalities a queued message must satisfy to be consumed.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub selector: IndexMap<String, String>,
    /// Require the same entry count on both sides (json and yaml only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// Path expressions exempt from payload comparison.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extract: Vec<ExtractorDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorDef {
    Header { name: String, variable: String },
    Xpath { expression: String, variable: String },
    JsonPath { expression: String, variable: String },
}

impl ExtractorDef {
    fn extractor(&self) -> VariableExtractor {
        match self {
            ExtractorDef::Header { name, variable } => {
                VariableExtractor::header(name.clone(), variable.clone())
            }
            ExtractorDef::Xpath {
                expression,
                variable,
            } => VariableExtractor::xpath(expression.clone(), variable.clone()),
            ExtractorDef::JsonPath {
                expression,
                variable,
            } => VariableExtractor::json_path(expression.clone(), variable.clone()),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SleepDef {
    pub ms: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContainerDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepeatDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_ms: Option<u64>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

/// Reads and parses one definition file, choosing the format by extension:
/// `.yaml`/`.yml` parse as YAML, everything else as JSON.
pub fn load_definition(path: &Path) -> Result<TestDefinition, String> {
    let payload = fs::read_to_string(path)
        .map_err(|error| format!("failed to read test definition '{}': {error}", path.display()))?;
    let yaml = matches!(
        path.extension().and_then(|extension| extension.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if yaml {
        serde_yaml::from_str(&payload).map_err(|error| error.to_string())
    } else {
        serde_json::from_str(&payload).map_err(|error| error.to_string())
    };
    parsed.map_err(|error| format!("invalid test definition '{}': {error}", path.display()))
}

/// Parses `--var KEY=VALUE` overrides.
pub fn parse_variables(entries: &[String]) -> Result<IndexMap<String, String>, String> {
    let mut variables = IndexMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(format!("invalid var entry: '{entry}'"));
        };
        if key.is_empty() {
            return Err(format!("invalid var entry: '{entry}'"));
        }
        let value = if let Some(path) = value.strip_prefix('@') {
            fs::read_to_string(path)
                .map_err(|error| format!("failed to read var '{key}': {error}"))?
        } else {
            value.to_string()
        };
        variables.insert(key.to_string(), value);
    }
    Ok(variables)
}

/// A definition wired into live endpoints and a runnable suite.
///
/// The registry keeps embedded servers alive; dropping it shuts them down.
pub struct BuiltSuite {
    pub endpoints: EndpointRegistry,
    pub runner: TestRunner,
}

impl std::fmt::Debug for BuiltSuite {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("BuiltSuite").finish_non_exhaustive()
    }
}

/// Wires a parsed definition into endpoints, cases and a runner.
/// `default_timeout` applies to endpoints without their own receive
/// timeout; `overrides` seed every case's variables.
pub fn build_suite(
    definition: &TestDefinition,
    default_timeout: Option<Duration>,
    overrides: &IndexMap<String, String>,
) -> Result<BuiltSuite, String> {
    let endpoints = build_endpoints(definition, default_timeout)?;
    let mut runner = TestRunner::new();
    for (name, value) in overrides {
        runner = runner.with_variable(name.clone(), value.clone());
    }
    for case in &definition.cases {
        runner = runner.with_case(build_case(case, &endpoints)?);
    }
    Ok(BuiltSuite { endpoints, runner })
}

fn build_endpoints(
    definition: &TestDefinition,
    default_timeout: Option<Duration>,
) -> Result<EndpointRegistry, String> {
    let mut registry = EndpointRegistry::new();
    for endpoint in &definition.endpoints {
        let built: Arc<dyn Endpoint> = match endpoint {
            EndpointDef::Direct(direct) => {
                let timeout = direct
                    .receive_timeout_ms
                    .map(Duration::from_millis)
                    .or(default_timeout);
                match (&direct.responder, timeout) {
                    (Some(responder), _) => Arc::new(RespondingEndpoint::new(
                        direct.name.clone(),
                        build_responder(responder)?,
                    )),
                    (None, Some(timeout)) => Arc::new(DirectEndpoint::with_receive_timeout(
                        direct.name.clone(),
                        timeout,
                    )),
                    (None, None) => Arc::new(DirectEndpoint::new(direct.name.clone())),
                }
            }
            EndpointDef::HttpClient(client) => {
                let timeout = client
                    .receive_timeout_ms
                    .map(Duration::from_millis)
                    .or(default_timeout);
                match timeout {
                    Some(timeout) => Arc::new(HttpClientEndpoint::with_receive_timeout(
                        client.name.clone(),
                        client.url.clone(),
                        timeout,
                    )),
                    None => Arc::new(HttpClientEndpoint::new(
                        client.name.clone(),
                        client.url.clone(),
                    )),
                }
            }
            EndpointDef::HttpServer(server) => {
                let responder: Arc<dyn EndpointAdapter> = match &server.responder {
                    Some(responder) => build_responder(responder)?,
                    None => Arc::new(EmptyResponseEndpointAdapter),
                };
                Arc::new(
                    HttpServerEndpoint::start(server.name.clone(), &server.bind, responder)
                        .map_err(|error| error.to_string())?,
                )
            }
        };
        registry.register(built);
    }
    Ok(registry)
}

fn build_responder(responder: &ResponderDef) -> Result<Arc<dyn EndpointAdapter>, String> {
    match responder {
        ResponderDef::Static(message) => {
            let mut adapter = StaticResponseEndpointAdapter::new(message.builder()?);
            if let Some(message_type) = message.message_type {
                adapter = adapter.with_message_type(message_type);
            }
            Ok(Arc::new(adapter))
        }
        ResponderDef::Empty => Ok(Arc::new(EmptyResponseEndpointAdapter)),
        ResponderDef::Dispatch(dispatch) => {
            let mut adapter = DispatchingEndpointAdapter::new(dispatch.key.extractor());
            for (key, mapped) in &dispatch.mappings {
                adapter = adapter.with_mapping(key.clone(), build_responder(mapped)?);
            }
            Ok(Arc::new(adapter))
        }
    }
}

fn build_case(case: &CaseDef, endpoints: &EndpointRegistry) -> Result<TestCase, String> {
    let mut built = TestCase::new(case.name.clone());
    for (name, value) in &case.variables {
        built = built.with_variable(name.clone(), value.clone());
    }
    for action in &case.actions {
        built = built.with_action(build_action(action, endpoints)?);
    }
    for action in &case.finally {
        built = built.with_finally(build_action(action, endpoints)?);
    }
    Ok(built)
}

fn build_action(
    action: &ActionDef,
    endpoints: &EndpointRegistry,
) -> Result<Box<dyn TestAction>, String> {
    match action {
        ActionDef::Send(send) => {
            let endpoint = endpoints
                .find(&send.endpoint)
                .map_err(|error| error.to_string())?;
            let name = send.name.clone().unwrap_or_else(|| "send".to_string());
            let mut built = SendAction::new(name, endpoint, send.message.builder()?);
            if let Some(message_type) = send.message.message_type {
                built = built.with_message_type(message_type);
            }
            if send.fork {
                built = built.forked();
            }
            Ok(Box::new(built))
        }
        ActionDef::Receive(receive) => {
            let endpoint = endpoints
                .find(&receive.endpoint)
                .map_err(|error| error.to_string())?;
            let name = receive.name.clone().unwrap_or_else(|| "receive".to_string());
            let mut built = ReceiveAction::new(name, endpoint, receive.message.builder()?);
            let message_type = receive.message.message_type.unwrap_or_default();
            if let Some(message_type) = receive.message.message_type {
                built = built.with_message_type(message_type);
            }
            if let Some(timeout) = receive.timeout_ms {
                built = built.with_timeout(Duration::from_millis(timeout));
            }
            if !receive.selector.is_empty() {
                let mut selector = MessageSelector::default();
                for (header, value) in &receive.selector {
                    selector = selector.with_header(header.clone(), value.clone());
                }
                built = built.with_selector(selector);
            }
            if let Some(context) =
                comparison_context(message_type, receive.strict, &receive.ignore)?
            {
                built = built.with_validation_context(context);
            }
            for extractor in &receive.extract {
                built = built.with_extractor(extractor.extractor());
            }
            Ok(Box::new(built))
        }
        ActionDef::Echo(message) => Ok(Box::new(EchoAction::new(message.clone()))),
        ActionDef::Sleep(sleep) => Ok(Box::new(SleepAction::new(Duration::from_millis(sleep.ms)))),
        ActionDef::CreateVariables(variables) => {
            let mut built = CreateVariablesAction::new();
            for (name, value) in variables {
                built = built.with_variable(name.clone(), value.clone());
            }
            Ok(Box::new(built))
        }
        ActionDef::Fail(message) => Ok(Box::new(FailAction::new(message.clone()))),
        ActionDef::Sequential(container) => {
            let mut built = SequentialContainer::new(container_name(&container.name, "sequential"));
            for child in &container.actions {
                built = built.with_action(build_action(child, endpoints)?);
            }
            Ok(Box::new(built))
        }
        ActionDef::Parallel(container) => {
            let mut built = ParallelContainer::new(container_name(&container.name, "parallel"));
            for child in &container.actions {
                built = built.with_action(build_action(child, endpoints)?);
            }
            Ok(Box::new(built))
        }
        ActionDef::RepeatOnError(repeat) => {
            let mut built = RepeatOnErrorContainer::new(
                container_name(&repeat.name, "repeat-on-error"),
                repeat.attempts,
            );
            if let Some(pause) = repeat.pause_ms {
                built = built.with_pause(Duration::from_millis(pause));
            }
            for child in &repeat.actions {
                built = built.with_action(build_action(child, endpoints)?);
            }
            Ok(Box::new(built))
        }
    }
}

fn container_name(name: &Option<String>, default: &str) -> String {
    name.clone().unwrap_or_else(|| default.to_string())
}

/// Explicit payload-comparison context when the step customizes strictness
/// or ignore expressions; validator reconciliation supplies defaults
/// otherwise.
fn comparison_context(
    message_type: MessageType,
    strict: Option<bool>,
    ignore: &[String],
) -> Result<Option<ValidationContext>, String> {
    if strict.is_none() && ignore.is_empty() {
        return Ok(None);
    }
    let context = match message_type {
        MessageType::Json => ValidationContext::Json(JsonValidationContext {
            strict: strict.unwrap_or(true),
            ignore_expressions: ignore.to_vec(),
        }),
        MessageType::Yaml => ValidationContext::Yaml(YamlValidationContext {
            strict: strict.unwrap_or(true),
            ignore_expressions: ignore.to_vec(),
        }),
        MessageType::Xml => {
            if strict.is_some() {
                return Err("strict only applies to json and yaml receives".to_string());
            }
            ValidationContext::Xml(XmlValidationContext {
                ignore_expressions: ignore.to_vec(),
                namespaces: IndexMap::new(),
            })
        }
        MessageType::Plaintext => {
            return Err("ignore and strict do not apply to plaintext receives".to_string());
        }
    };
    Ok(Some(context))
}
