//! Library of functions usable inside dynamic message expressions.

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use rand::Rng;

use crate::error::WiretestError;

/// Prefix that marks a function invocation inside message content.
pub const FUNCTION_PREFIX: &str = "wiretest:";

/// A named function: takes already-resolved arguments, returns replacement text.
pub type MessageFunction = fn(&[String]) -> Result<String, WiretestError>;

/// Insertion point for functions addressable as `wiretest:name(args)`.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, MessageFunction>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = FunctionRegistry {
            functions: BTreeMap::new(),
        };
        registry.register("concat", concat);
        registry.register("upperCase", upper_case);
        registry.register("lowerCase", lower_case);
        registry.register("randomNumber", random_number);
        registry.register("randomString", random_string);
        registry.register("currentDate", current_date);
        registry.register("translate", translate);
        registry
    }
}

impl FunctionRegistry {
    /// Registers a function under the given name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, function: MessageFunction) {
        self.functions.insert(name.into(), function);
    }

    /// Invokes a registered function; unknown names are construction errors.
    pub fn invoke(&self, name: &str, arguments: &[String]) -> Result<String, WiretestError> {
        let Some(function) = self.functions.get(name) else {
            return Err(WiretestError::construction(format!(
                "unknown function '{name}'"
            )));
        };
        function(arguments)
    }

    /// True when a function of this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn require_arguments(
    name: &str,
    arguments: &[String],
    expected: std::ops::RangeInclusive<usize>,
) -> Result<(), WiretestError> {
    if expected.contains(&arguments.len()) {
        return Ok(());
    }
    Err(WiretestError::construction(format!(
        "function '{name}' called with {} argument(s), expected {} to {}",
        arguments.len(),
        expected.start(),
        expected.end()
    )))
}

fn concat(arguments: &[String]) -> Result<String, WiretestError> {
    Ok(arguments.concat())
}

fn upper_case(arguments: &[String]) -> Result<String, WiretestError> {
    require_arguments("upperCase", arguments, 1..=1)?;
    Ok(arguments[0].to_uppercase())
}

fn lower_case(arguments: &[String]) -> Result<String, WiretestError> {
    require_arguments("lowerCase", arguments, 1..=1)?;
    Ok(arguments[0].to_lowercase())
}

fn random_number(arguments: &[String]) -> Result<String, WiretestError> {
    require_arguments("randomNumber", arguments, 1..=1)?;
    let digits: usize = arguments[0].trim().parse().map_err(|_| {
        WiretestError::construction(format!(
            "function 'randomNumber' expects a digit count, got '{}'",
            arguments[0]
        ))
    })?;
    if digits == 0 || digits > 32 {
        return Err(WiretestError::construction(
            "function 'randomNumber' digit count must be between 1 and 32",
        ));
    }
    let mut rng = rand::thread_rng();
    let mut value = String::with_capacity(digits);
    for _ in 0..digits {
        value.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    Ok(value)
}

fn random_string(arguments: &[String]) -> Result<String, WiretestError> {
    require_arguments("randomString", arguments, 1..=1)?;
    let length: usize = arguments[0].trim().parse().map_err(|_| {
        WiretestError::construction(format!(
            "function 'randomString' expects a length, got '{}'",
            arguments[0]
        ))
    })?;
    if length == 0 || length > 1024 {
        return Err(WiretestError::construction(
            "function 'randomString' length must be between 1 and 1024",
        ));
    }
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::thread_rng();
    let value = (0..length)
        .map(|_| char::from(LETTERS[rng.gen_range(0..LETTERS.len())]))
        .collect();
    Ok(value)
}

fn current_date(arguments: &[String]) -> Result<String, WiretestError> {
    require_arguments("currentDate", arguments, 0..=1)?;
    let format = arguments.first().map(String::as_str).unwrap_or("%Y-%m-%d");
    let has_invalid_item = StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
    if has_invalid_item {
        return Err(WiretestError::construction(format!(
            "function 'currentDate' received invalid format '{format}'"
        )));
    }
    Ok(Utc::now().format(format).to_string())
}

fn translate(arguments: &[String]) -> Result<String, WiretestError> {
    require_arguments("translate", arguments, 3..=3)?;
    Ok(arguments[0].replace(&arguments[1], &arguments[2]))
}
