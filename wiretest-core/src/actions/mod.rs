//! Executable test steps: message exchange actions and small utility actions.

mod receive;
mod send;
mod simple;

pub use receive::{ReceiveAction, VariableExtractor};
pub use send::SendAction;
pub use simple::{CreateVariablesAction, EchoAction, FailAction, SleepAction};

use crate::context::TestContext;
use crate::error::WiretestError;

/// One executable step of a test case.
///
/// Containers implement this trait too, so action trees nest arbitrarily.
pub trait TestAction: Send + Sync {
    /// Diagnostic name; send and receive actions also store their messages
    /// under it.
    fn name(&self) -> &str;

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError>;
}

impl<T: TestAction + ?Sized> TestAction for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self, context: &mut TestContext) -> Result<(), WiretestError> {
        (**self).execute(context)
    }
}
