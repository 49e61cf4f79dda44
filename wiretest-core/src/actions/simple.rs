use std::time::Duration;

use indexmap::IndexMap;

use crate::context::TestContext;
use crate::error::{ValidationError, WiretestError};

use super::TestAction;

/// Logs a resolved message at info level.
pub struct EchoAction {
    message: String,
}

impl EchoAction {
    pub fn new(message: impl Into<String>) -> Self {
        EchoAction {
            message: message.into(),
        }
    }
}

impl TestAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        let resolved = context.replace_dynamic_content(&self.message)?;
        log::info!("{}", context.mask(&resolved));
        Ok(())
    }
}

/// Pauses the action sequence for a fixed duration.
pub struct SleepAction {
    duration: Duration,
}

impl SleepAction {
    pub fn new(duration: Duration) -> Self {
        SleepAction { duration }
    }
}

impl TestAction for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    fn execute(&self, _context: &mut TestContext) -> Result<(), WiretestError> {
        log::debug!("sleeping for {:?}", self.duration);
        std::thread::sleep(self.duration);
        Ok(())
    }
}

/// Sets test variables, resolving dynamic content in each value first.
///
/// Values may reference variables created by earlier entries of the same
/// action.
pub struct CreateVariablesAction {
    variables: IndexMap<String, String>,
}

impl CreateVariablesAction {
    pub fn new() -> Self {
        CreateVariablesAction {
            variables: IndexMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl Default for CreateVariablesAction {
    fn default() -> Self {
        CreateVariablesAction::new()
    }
}

impl TestAction for CreateVariablesAction {
    fn name(&self) -> &str {
        "create-variables"
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        for (name, value) in &self.variables {
            let resolved = context.replace_dynamic_content(value)?;
            log::debug!("creating variable '{name}' = '{}'", context.mask(&resolved));
            context.set_variable(name.clone(), resolved)?;
        }
        Ok(())
    }
}

/// Deliberately fails the test case with a resolved message.
pub struct FailAction {
    message: String,
}

impl FailAction {
    pub fn new(message: impl Into<String>) -> Self {
        FailAction {
            message: message.into(),
        }
    }
}

impl TestAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        let resolved = context.replace_dynamic_content(&self.message)?;
        Err(WiretestError::Validation(ValidationError::single(resolved)))
    }
}
