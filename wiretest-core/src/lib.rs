//! Core building blocks for wire-level integration tests: messages and
//! their builders, validation, endpoints, actions, containers and the
//! suite runner.

pub mod actions;
pub mod container;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod functions;
pub mod jsonpath;
pub mod masking;
pub mod matcher;
pub mod message;
pub mod runner;
pub mod validation;
pub mod xml;

pub use actions::{
    CreateVariablesAction, EchoAction, FailAction, ReceiveAction, SendAction, SleepAction,
    TestAction, VariableExtractor,
};
pub use container::{ParallelContainer, RepeatOnErrorContainer, SequentialContainer};
pub use context::TestContext;
pub use endpoint::{
    DirectEndpoint, DispatchingEndpointAdapter, EmptyResponseEndpointAdapter, Endpoint,
    EndpointAdapter, EndpointRegistry, HttpClientEndpoint, HttpServerEndpoint,
    MappingKeyExtractor, MessageSelector, RespondingEndpoint, StaticResponseEndpointAdapter,
};
pub use error::{ParallelError, ValidationError, WiretestError};
pub use functions::FunctionRegistry;
pub use masking::LogModifier;
pub use message::{Message, MessageBuilder, MessageType};
pub use runner::{SuiteReport, TestCase, TestResult, TestRunner, TestStatus};
pub use validation::{MessageValidatorRegistry, ValidationContext};
