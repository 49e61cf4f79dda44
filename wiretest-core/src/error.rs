//! Error taxonomy shared by the whole framework.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while configuring, building, exchanging or validating messages.
///
/// Every variant aborts the current test case; the only retry mechanism is the
/// explicit repeat-on-error container.
#[derive(Debug, Error)]
pub enum WiretestError {
    /// Missing or inconsistent wiring: unknown endpoint, validator, function,
    /// variable name rules, or an unmapped dispatch key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A message could not be built: unresolved variable, unreadable payload
    /// resource, marshalling failure or malformed dynamic expression.
    #[error("construction error: {0}")]
    Construction(String),

    /// Content validation found mismatches; all of them are listed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No message arrived on the endpoint within the configured wait.
    #[error("timeout after {timeout:?} waiting for message on endpoint '{endpoint}'")]
    Timeout {
        /// Endpoint that was polled.
        endpoint: String,
        /// Configured receive timeout.
        timeout: Duration,
    },

    /// An endpoint adapter failed while producing a response.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// One or more parallel branches failed; every branch error is listed.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}

impl WiretestError {
    /// Shorthand for a [`WiretestError::Configuration`] with a formatted message.
    pub fn configuration(message: impl Into<String>) -> Self {
        WiretestError::Configuration(message.into())
    }

    /// Shorthand for a [`WiretestError::Construction`] with a formatted message.
    pub fn construction(message: impl Into<String>) -> Self {
        WiretestError::Construction(message.into())
    }

    /// Shorthand for a [`WiretestError::Dispatch`] with a formatted message.
    pub fn dispatch(message: impl Into<String>) -> Self {
        WiretestError::Dispatch(message.into())
    }
}

/// Aggregate of every mismatch one validation run produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    /// Individual mismatch descriptions in discovery order.
    pub failures: Vec<String>,
}

impl ValidationError {
    /// Wraps a single mismatch.
    pub fn single(failure: impl Into<String>) -> Self {
        ValidationError {
            failures: vec![failure.into()],
        }
    }

    /// Wraps a list of mismatches; callers must pass at least one.
    pub fn from_failures(failures: Vec<String>) -> Self {
        ValidationError { failures }
    }

    /// Merges another aggregate into this one, preserving order.
    pub fn merge(&mut self, other: ValidationError) {
        self.failures.extend(other.failures);
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.failures.len() == 1 {
            return write!(formatter, "validation failed: {}", self.failures[0]);
        }
        writeln!(
            formatter,
            "validation failed with {} mismatches:",
            self.failures.len()
        )?;
        for (index, failure) in self.failures.iter().enumerate() {
            if index > 0 {
                writeln!(formatter)?;
            }
            write!(formatter, "  - {failure}")?;
        }
        Ok(())
    }
}

/// Aggregate of the failures collected from parallel container branches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParallelError {
    /// Name of the parallel container that forked the branches.
    pub container: String,
    /// One entry per failed branch, in branch order.
    pub failures: Vec<String>,
}

impl std::fmt::Display for ParallelError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            formatter,
            "parallel container '{}' failed in {} branch(es):",
            self.container,
            self.failures.len()
        )?;
        for (index, failure) in self.failures.iter().enumerate() {
            if index > 0 {
                writeln!(formatter)?;
            }
            write!(formatter, "  - {failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mismatch_renders_inline() {
        let error = ValidationError::single("values not equal for entry 'id'");
        assert_eq!(
            error.to_string(),
            "validation failed: values not equal for entry 'id'"
        );
    }

    #[test]
    fn multiple_mismatches_render_as_list() {
        let error = ValidationError::from_failures(vec![
            "missing entry 'name'".to_string(),
            "values not equal for entry 'id'".to_string(),
        ]);
        let rendered = error.to_string();
        assert!(rendered.starts_with("validation failed with 2 mismatches:"));
        assert!(rendered.contains("  - missing entry 'name'"));
        assert!(rendered.contains("  - values not equal for entry 'id'"));
    }

    #[test]
    fn merge_preserves_discovery_order() {
        let mut error = ValidationError::single("first");
        error.merge(ValidationError::single("second"));
        assert_eq!(error.failures, vec!["first", "second"]);
    }

    #[test]
    fn timeout_names_the_endpoint() {
        let error = WiretestError::Timeout {
            endpoint: "orders".to_string(),
            timeout: Duration::from_millis(250),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("orders"));
        assert!(rendered.contains("250ms"));
    }

    #[test]
    fn parallel_error_lists_every_branch() {
        let error = ParallelError {
            container: "fanout".to_string(),
            failures: vec!["branch one".to_string(), "branch two".to_string()],
        };
        let rendered = error.to_string();
        assert!(rendered.contains("'fanout'"));
        assert!(rendered.contains("2 branch(es)"));
        assert!(rendered.contains("branch two"));
    }
}
