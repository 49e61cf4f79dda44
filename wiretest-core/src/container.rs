//! Container actions: sequential, parallel and repeat-on-error grouping.

use std::time::Duration;

use crate::actions::TestAction;
use crate::context::TestContext;
use crate::error::{ParallelError, WiretestError};

/// Runs child actions in order; the first error aborts the container.
pub struct SequentialContainer {
    name: String,
    actions: Vec<Box<dyn TestAction>>,
}

impl SequentialContainer {
    pub fn new(name: impl Into<String>) -> Self {
        SequentialContainer {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }
}

impl TestAction for SequentialContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        for action in &self.actions {
            log::debug!("container '{}' running action '{}'", self.name, action.name());
            action.execute(context)?;
        }
        Ok(())
    }
}

/// Forks one thread per child action and joins them all.
///
/// Every branch runs to completion regardless of the others; branch errors
/// aggregate into one [`ParallelError`]. Each branch works on a cloned
/// context; branch variables merge back in branch order, last writer wins.
pub struct ParallelContainer {
    name: String,
    actions: Vec<Box<dyn TestAction>>,
}

impl ParallelContainer {
    pub fn new(name: impl Into<String>) -> Self {
        ParallelContainer {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }
}

impl TestAction for ParallelContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        let mut branches: Vec<TestContext> =
            (0..self.actions.len()).map(|_| context.clone()).collect();
        let mut failures = Vec::new();
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.actions.len());
            for (action, branch) in self.actions.iter().zip(branches.iter_mut()) {
                log::debug!("container '{}' forking action '{}'", self.name, action.name());
                handles.push(scope.spawn(move || action.execute(branch)));
            }
            for (action, handle) in self.actions.iter().zip(handles) {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        failures.push(format!("action '{}' failed: {error}", action.name()));
                    }
                    Err(_) => {
                        failures.push(format!("action '{}' panicked", action.name()));
                    }
                }
            }
        });
        for branch in branches {
            let variables = branch.variables().clone();
            context.merge_variables(variables);
        }
        if failures.is_empty() {
            return Ok(());
        }
        Err(WiretestError::Parallel(ParallelError {
            container: self.name.clone(),
            failures,
        }))
    }
}

/// Retries its child actions up to a configured attempt count, pausing
/// between attempts. The only retry mechanism in the framework.
pub struct RepeatOnErrorContainer {
    name: String,
    actions: Vec<Box<dyn TestAction>>,
    attempts: u32,
    pause: Duration,
}

impl RepeatOnErrorContainer {
    /// `attempts` counts total runs, not retries; zero is treated as one.
    pub fn new(name: impl Into<String>, attempts: u32) -> Self {
        RepeatOnErrorContainer {
            name: name.into(),
            actions: Vec::new(),
            attempts: attempts.max(1),
            pause: Duration::from_millis(1000),
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    fn run_children(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        for action in &self.actions {
            action.execute(context)?;
        }
        Ok(())
    }
}

impl TestAction for RepeatOnErrorContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run_children(context) {
                Ok(()) => return Ok(()),
                Err(error) if attempt < self.attempts => {
                    log::warn!(
                        "container '{}' attempt {attempt}/{} failed, retrying after {:?}: {error}",
                        self.name,
                        self.attempts,
                        self.pause
                    );
                    std::thread::sleep(self.pause);
                }
                Err(error) => return Err(error),
            }
        }
    }
}
