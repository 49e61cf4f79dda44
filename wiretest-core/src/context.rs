//! Per-test state: variables, functions, message store and validator wiring.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::error::WiretestError;
use crate::functions::{FunctionRegistry, FUNCTION_PREFIX};
use crate::masking::LogModifier;
use crate::message::Message;
use crate::validation::MessageValidatorRegistry;

/// Opening token of a variable expression.
pub const VARIABLE_PREFIX: &str = "${";
/// Closing token of a variable expression.
pub const VARIABLE_SUFFIX: char = '}';
/// Escape marker: `${//name//}` renders the literal `${name}`.
pub const VARIABLE_ESCAPE: &str = "//";

/// State carried through one test case execution.
///
/// Cloning produces a branch context for parallel execution: variables are
/// snapshotted, while the message store, validator registry and collected
/// exceptions stay shared.
#[derive(Clone, Debug)]
pub struct TestContext {
    variables: IndexMap<String, String>,
    functions: FunctionRegistry,
    validators: Arc<MessageValidatorRegistry>,
    message_store: Arc<Mutex<IndexMap<String, Message>>>,
    exceptions: Arc<Mutex<Vec<String>>>,
    log_modifier: LogModifier,
}

impl Default for TestContext {
    fn default() -> Self {
        TestContext {
            variables: IndexMap::new(),
            functions: FunctionRegistry::default(),
            validators: Arc::new(MessageValidatorRegistry::default()),
            message_store: Arc::new(Mutex::new(IndexMap::new())),
            exceptions: Arc::new(Mutex::new(Vec::new())),
            log_modifier: LogModifier::default(),
        }
    }
}

impl TestContext {
    /// Creates a context with default registries and no variables.
    pub fn new() -> Self {
        TestContext::default()
    }

    /// Replaces the validator registry.
    pub fn with_validators(mut self, validators: MessageValidatorRegistry) -> Self {
        self.validators = Arc::new(validators);
        self
    }

    /// Replaces the masking modifier.
    pub fn with_log_modifier(mut self, modifier: LogModifier) -> Self {
        self.log_modifier = modifier;
        self
    }

    /// Validator registry consulted by receive actions.
    pub fn validators(&self) -> &MessageValidatorRegistry {
        &self.validators
    }

    /// Function registry for dynamic expressions.
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Sets a test variable. Blank names are configuration errors.
    pub fn set_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), WiretestError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WiretestError::configuration(
                "variable name must not be blank",
            ));
        }
        self.variables.insert(name, value.into());
        Ok(())
    }

    /// Looks up a variable by bare name or `${name}` expression.
    pub fn variable(&self, name: &str) -> Option<&str> {
        let bare = name
            .strip_prefix(VARIABLE_PREFIX)
            .and_then(|rest| rest.strip_suffix(VARIABLE_SUFFIX))
            .unwrap_or(name);
        self.variables.get(bare).map(String::as_str)
    }

    /// Looks up a variable, raising a construction error when undefined.
    pub fn require_variable(&self, name: &str) -> Result<&str, WiretestError> {
        self.variable(name).ok_or_else(|| {
            WiretestError::construction(format!("unknown variable '{name}'"))
        })
    }

    /// All variables in insertion order.
    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    /// Overwrites variables from a parallel branch, last writer per key wins.
    pub fn merge_variables(&mut self, branch: IndexMap<String, String>) {
        for (name, value) in branch {
            self.variables.insert(name, value);
        }
    }

    /// Resolves `${variable}` and `wiretest:function(...)` expressions.
    pub fn replace_dynamic_content(&self, text: &str) -> Result<String, WiretestError> {
        let replaced = self.replace_variables(text)?;
        self.replace_functions(&replaced)
    }

    fn replace_variables(&self, text: &str) -> Result<String, WiretestError> {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(VARIABLE_PREFIX) {
            output.push_str(&rest[..start]);
            let after = &rest[start + VARIABLE_PREFIX.len()..];
            let Some(end) = after.find(VARIABLE_SUFFIX) else {
                return Err(WiretestError::construction(format!(
                    "unterminated variable expression in '{text}'"
                )));
            };
            let name = &after[..end];
            if let Some(literal) = name
                .strip_prefix(VARIABLE_ESCAPE)
                .and_then(|inner| inner.strip_suffix(VARIABLE_ESCAPE))
            {
                output.push_str(VARIABLE_PREFIX);
                output.push_str(literal);
                output.push(VARIABLE_SUFFIX);
            } else {
                output.push_str(self.require_variable(name)?);
            }
            rest = &after[end + 1..];
        }
        output.push_str(rest);
        Ok(output)
    }

    fn replace_functions(&self, text: &str) -> Result<String, WiretestError> {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(FUNCTION_PREFIX) {
            output.push_str(&rest[..start]);
            let after = &rest[start + FUNCTION_PREFIX.len()..];
            let Some(open) = after.find('(') else {
                return Err(WiretestError::construction(format!(
                    "malformed function expression in '{text}', expected 'wiretest:name(...)'"
                )));
            };
            let name = after[..open].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(WiretestError::construction(format!(
                    "malformed function name '{name}' in '{text}'"
                )));
            }
            let arguments_input = &after[open + 1..];
            let (raw_arguments, consumed) = scan_arguments(arguments_input).ok_or_else(|| {
                WiretestError::construction(format!(
                    "unterminated function expression in '{text}'"
                ))
            })?;
            let arguments = split_arguments(raw_arguments);
            output.push_str(&self.functions.invoke(name, &arguments)?);
            rest = &arguments_input[consumed..];
        }
        output.push_str(rest);
        Ok(output)
    }

    /// Records an exception raised on a forked thread; checked when the case finishes.
    pub fn add_exception(&self, message: impl Into<String>) {
        if let Ok(mut exceptions) = self.exceptions.lock() {
            exceptions.push(message.into());
        }
    }

    /// Drains every exception recorded so far.
    pub fn take_exceptions(&self) -> Vec<String> {
        match self.exceptions.lock() {
            Ok(mut exceptions) => std::mem::take(&mut *exceptions),
            Err(_) => Vec::new(),
        }
    }

    /// Stores a message under a name for later inspection.
    pub fn store_message(&self, name: impl Into<String>, message: Message) {
        if let Ok(mut store) = self.message_store.lock() {
            store.insert(name.into(), message);
        }
    }

    /// Fetches a previously stored message by name.
    pub fn stored_message(&self, name: &str) -> Option<Message> {
        self.message_store
            .lock()
            .ok()
            .and_then(|store| store.get(name).cloned())
    }

    /// Snapshot of every stored message, in storage order.
    pub fn stored_messages(&self) -> Vec<(String, Message)> {
        match self.message_store.lock() {
            Ok(store) => store
                .iter()
                .map(|(name, message)| (name.clone(), message.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Masks secrets in text bound for the logs.
    pub fn mask(&self, text: &str) -> String {
        self.log_modifier.mask(text)
    }
}

/// Scans up to the closing parenthesis, honoring single quotes.
/// Returns the argument text and the index just past the closing parenthesis.
fn scan_arguments(input: &str) -> Option<(&str, usize)> {
    let mut in_quote = false;
    for (index, character) in input.char_indices() {
        match character {
            '\'' => in_quote = !in_quote,
            ')' if !in_quote => return Some((&input[..index], index + 1)),
            _ => {}
        }
    }
    None
}

/// Splits expression arguments on top-level commas, trimming and unquoting each.
pub(crate) fn split_arguments(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for character in input.chars() {
        match character {
            '\'' => {
                in_quote = !in_quote;
                current.push(character);
            }
            ',' if !in_quote => {
                arguments.push(unquote(current.trim()));
                current.clear();
            }
            _ => current.push(character),
        }
    }
    arguments.push(unquote(current.trim()));
    arguments
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(value)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_resolve_inside_text() {
        let mut context = TestContext::new();
        context.set_variable("user", "jane").unwrap();
        let resolved = context
            .replace_dynamic_content("hello ${user}!")
            .unwrap();
        assert_eq!(resolved, "hello jane!");
    }

    #[test]
    fn unknown_variable_is_a_construction_error() {
        let context = TestContext::new();
        let error = context.replace_dynamic_content("${missing}").unwrap_err();
        assert!(matches!(error, WiretestError::Construction(_)));
        assert!(error.to_string().contains("unknown variable 'missing'"));
    }

    #[test]
    fn escaped_expression_renders_literally() {
        let context = TestContext::new();
        let resolved = context
            .replace_dynamic_content("keep ${//user//} as-is")
            .unwrap();
        assert_eq!(resolved, "keep ${user} as-is");
    }

    #[test]
    fn unterminated_variable_is_rejected() {
        let context = TestContext::new();
        let error = context.replace_dynamic_content("${broken").unwrap_err();
        assert!(error.to_string().contains("unterminated variable"));
    }

    #[test]
    fn blank_variable_name_is_a_configuration_error() {
        let mut context = TestContext::new();
        let error = context.set_variable("  ", "x").unwrap_err();
        assert!(matches!(error, WiretestError::Configuration(_)));
    }

    #[test]
    fn variable_lookup_accepts_wrapped_names() {
        let mut context = TestContext::new();
        context.set_variable("id", "42").unwrap();
        assert_eq!(context.variable("id"), Some("42"));
        assert_eq!(context.variable("${id}"), Some("42"));
    }

    #[test]
    fn functions_resolve_after_variables() {
        let mut context = TestContext::new();
        context.set_variable("name", "jane").unwrap();
        let resolved = context
            .replace_dynamic_content("wiretest:upperCase(${name})")
            .unwrap();
        assert_eq!(resolved, "JANE");
    }

    #[test]
    fn quoted_function_arguments_keep_commas() {
        let context = TestContext::new();
        let resolved = context
            .replace_dynamic_content("wiretest:concat('a,b', 'c')")
            .unwrap();
        assert_eq!(resolved, "a,bc");
    }

    #[test]
    fn unknown_function_aborts_resolution() {
        let context = TestContext::new();
        let error = context
            .replace_dynamic_content("wiretest:nope()")
            .unwrap_err();
        assert!(error.to_string().contains("unknown function 'nope'"));
    }

    #[test]
    fn unterminated_function_is_rejected() {
        let context = TestContext::new();
        let error = context
            .replace_dynamic_content("wiretest:concat('a'")
            .unwrap_err();
        assert!(error.to_string().contains("unterminated function"));
    }

    #[test]
    fn plain_text_passes_through_unchanged() {
        let context = TestContext::new();
        let text = "<doc attr=\"value\">no expressions here</doc>";
        assert_eq!(context.replace_dynamic_content(text).unwrap(), text);
    }

    #[test]
    fn message_store_round_trip() {
        let context = TestContext::new();
        context.store_message("request", Message::new("{}"));
        assert!(context.stored_message("request").is_some());
        assert!(context.stored_message("other").is_none());
    }

    #[test]
    fn branch_clone_shares_store_but_snapshots_variables() {
        let mut context = TestContext::new();
        context.set_variable("seed", "1").unwrap();
        let mut branch = context.clone();
        branch.set_variable("seed", "2").unwrap();
        branch.store_message("from-branch", Message::new(""));
        assert_eq!(context.variable("seed"), Some("1"));
        assert!(context.stored_message("from-branch").is_some());
    }

    #[test]
    fn merge_variables_last_writer_wins() {
        let mut context = TestContext::new();
        context.set_variable("key", "old").unwrap();
        let mut branch = IndexMap::new();
        branch.insert("key".to_string(), "new".to_string());
        context.merge_variables(branch);
        assert_eq!(context.variable("key"), Some("new"));
    }

    #[test]
    fn exceptions_collect_until_drained() {
        let context = TestContext::new();
        context.add_exception("fork failed");
        let drained = context.take_exceptions();
        assert_eq!(drained, vec!["fork failed"]);
        assert!(context.take_exceptions().is_empty());
    }
}
