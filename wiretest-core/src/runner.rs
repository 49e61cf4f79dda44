//! Test case model and the suite runner collecting per-case results.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::actions::TestAction;
use crate::context::TestContext;
use crate::error::WiretestError;

/// One named test case: an action list, initial variables and optional
/// finally-actions that run regardless of the outcome.
pub struct TestCase {
    name: String,
    variables: IndexMap<String, String>,
    actions: Vec<Box<dyn TestAction>>,
    finally_actions: Vec<Box<dyn TestAction>>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        TestCase {
            name: name.into(),
            variables: IndexMap::new(),
            actions: Vec::new(),
            finally_actions: Vec::new(),
        }
    }

    /// Seeds a test variable; values may use dynamic expressions and are
    /// resolved when the case starts.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Appends an action that runs after the main actions, pass or fail.
    pub fn with_finally(mut self, action: impl TestAction + 'static) -> Self {
        self.finally_actions.push(Box::new(action));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the case to completion against `context`.
    ///
    /// The first failing action aborts the main sequence; finally-actions
    /// still run. Exceptions collected by forked actions fail an otherwise
    /// passing case.
    pub fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        log::info!("running test case '{}'", self.name);
        let mut result = self.apply_variables(context);
        if result.is_ok() {
            for action in &self.actions {
                log::debug!(
                    "test case '{}' running action '{}'",
                    self.name,
                    action.name()
                );
                if let Err(error) = action.execute(context) {
                    result = Err(error);
                    break;
                }
            }
        }
        for action in &self.finally_actions {
            if let Err(error) = action.execute(context) {
                match &result {
                    Ok(()) => result = Err(error),
                    Err(_) => log::warn!(
                        "finally action '{}' of test case '{}' failed: {error}",
                        action.name(),
                        self.name
                    ),
                }
            }
        }
        let exceptions = context.take_exceptions();
        if result.is_ok() && !exceptions.is_empty() {
            result = Err(WiretestError::dispatch(format!(
                "test case '{}' collected {} exception(s): {}",
                self.name,
                exceptions.len(),
                exceptions.join("; ")
            )));
        }
        result
    }

    fn apply_variables(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        for (name, value) in &self.variables {
            let resolved = context.replace_dynamic_content(value)?;
            context.set_variable(name.clone(), resolved)?;
        }
        Ok(())
    }
}

/// Status of one executed test case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestStatus {
    /// Every action completed and no exceptions were collected.
    Success,
    /// The case aborted with the given error rendering.
    Failure { reason: String },
}

/// Outcome of one test case run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    #[serde(flatten)]
    pub status: TestStatus,
    pub duration: Duration,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Success
    }
}

/// Aggregated outcome of a suite run, one entry per case in run order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteReport {
    pub results: Vec<TestResult>,
}

impl SuiteReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|result| result.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// Executes test cases in order against a fresh context per case.
pub struct TestRunner {
    cases: Vec<TestCase>,
    variables: IndexMap<String, String>,
}

impl TestRunner {
    pub fn new() -> Self {
        TestRunner {
            cases: Vec::new(),
            variables: IndexMap::new(),
        }
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Seeds a variable into every case, before the case's own variables.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Runs every case against a default context.
    pub fn run(&self) -> SuiteReport {
        self.run_with(TestContext::new)
    }

    /// Runs every case, building each case's context through `factory`.
    pub fn run_with(&self, factory: impl Fn() -> TestContext) -> SuiteReport {
        self.run_observed(factory, |_, _| {})
    }

    /// Like [`run_with`](Self::run_with), but calls `observer` after each
    /// case with its result and the context the case ran in.
    pub fn run_observed(
        &self,
        factory: impl Fn() -> TestContext,
        observer: impl Fn(&TestResult, &TestContext),
    ) -> SuiteReport {
        let mut results = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            let mut context = factory();
            let start = Instant::now();
            let outcome = self.seed_variables(&mut context).and_then(|()| case.execute(&mut context));
            let duration = start.elapsed();
            let status = match outcome {
                Ok(()) => {
                    log::info!("test case '{}' passed in {duration:?}", case.name());
                    TestStatus::Success
                }
                Err(error) => {
                    log::warn!("test case '{}' failed in {duration:?}: {error}", case.name());
                    TestStatus::Failure {
                        reason: error.to_string(),
                    }
                }
            };
            let result = TestResult {
                name: case.name().to_string(),
                status,
                duration,
            };
            observer(&result, &context);
            results.push(result);
        }
        let report = SuiteReport { results };
        log::info!(
            "suite finished: {} passed, {} failed",
            report.passed(),
            report.failed()
        );
        report
    }

    fn seed_variables(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        for (name, value) in &self.variables {
            context.set_variable(name.clone(), value.clone())?;
        }
        Ok(())
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        TestRunner::new()
    }
}
