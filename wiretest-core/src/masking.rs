//! Masks secret values in logged message content.

use regex::Regex;

/// Replacement written over masked values.
pub const MASKED_VALUE: &str = "****";

/// Keywords masked when no custom set is configured.
pub const DEFAULT_KEYWORDS: [&str; 3] = ["password", "secret", "secretKey"];

/// Rewrites key/value, XML, JSON and YAML shaped text so that values of the
/// configured keywords never reach the logs.
#[derive(Clone, Debug)]
pub struct LogModifier {
    key_value: Regex,
    xml: Regex,
    json: Regex,
    yaml: Regex,
}

impl Default for LogModifier {
    fn default() -> Self {
        LogModifier::new(&DEFAULT_KEYWORDS)
    }
}

impl LogModifier {
    /// Builds a modifier for the given keywords. Keywords are matched
    /// case-sensitively, the way they were configured.
    pub fn new(keywords: &[&str]) -> Self {
        let group = keywords
            .iter()
            .map(|keyword| regex::escape(keyword))
            .collect::<Vec<_>>()
            .join("|");
        // Patterns are assembled from escaped literals, so they always compile.
        let compile = |pattern: String| {
            Regex::new(&pattern).expect("pattern built from escaped literals should always compile")
        };
        LogModifier {
            key_value: compile(format!(r"\b({group})\s*=\s*[^\s,&]*")),
            xml: compile(format!(r"<({group})>[^<]*</({group})>")),
            json: compile(format!(r#""({group})"\s*:\s*"[^"]*""#)),
            yaml: compile(format!(r"(?m)^(\s*)({group})(\s*):(\s*)\S[^\n]*$")),
        }
    }

    /// Masks every occurrence of a configured keyword's value.
    pub fn mask(&self, text: &str) -> String {
        let masked = self
            .key_value
            .replace_all(text, format!("$1={MASKED_VALUE}"));
        let masked = self
            .xml
            .replace_all(&masked, format!("<$1>{MASKED_VALUE}</$2>"));
        let masked = self
            .json
            .replace_all(&masked, format!(r#""$1": "{MASKED_VALUE}""#));
        let masked = self
            .yaml
            .replace_all(&masked, format!("$1$2$3:$4{MASKED_VALUE}"));
        masked.into_owned()
    }
}
