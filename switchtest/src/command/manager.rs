//! Command execution: parameter binding, response verification, and
//! field extraction.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::{debug, trace};
use regex::Regex;

use super::template::{CommandTemplate, TemplateStore};
use crate::connection::ConnectionManager;
use crate::error::{CommandError, Result};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Outcome of one executed command.
///
/// A response that does not contain the expected text is *not* an
/// error: probing for a VLAN that must not exist is a legitimate
/// command whose expected outcome is a mismatch. Callers decide what
/// `matched_expected` means for their test.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Everything the device printed, prompt included.
    pub raw_output: String,

    /// Whether the expected-response text occurred in the output.
    pub matched_expected: bool,

    /// Named capture groups from the template's parse pattern. Empty
    /// when the template has no pattern or the pattern did not match —
    /// absence of data is a valid outcome for "not found" commands.
    pub fields: HashMap<String, String>,
}

impl ExecutionResult {
    /// Convenience accessor for one extracted field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Binds parameters into templates and executes them through a
/// [`ConnectionManager`].
///
/// Holds the loaded-once [`TemplateStore`]; the store is never mutated
/// after construction, so a `&CommandManager` can be handed to every
/// suite without synchronization.
pub struct CommandManager {
    store: TemplateStore,
}

impl CommandManager {
    /// Create a manager over a loaded template store.
    pub fn new(store: TemplateStore) -> Self {
        Self { store }
    }

    /// The underlying template store.
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Resolve a template's command string with `params`.
    ///
    /// Every `{param}` placeholder must be covered or the command is
    /// rejected with [`CommandError::MissingParameter`] — a partially
    /// substituted string is never sent to the device. Extra params are
    /// ignored.
    pub fn format_command(
        &self,
        category: &str,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<String> {
        let template = self.store.lookup(category, name)?;
        Ok(substitute(&template.command, params)?)
    }

    /// Execute a template: bind parameters, send, verify, extract.
    pub async fn execute(
        &self,
        conn: &mut ConnectionManager,
        category: &str,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<ExecutionResult> {
        let template = self.store.lookup(category, name)?;
        self.execute_template(conn, template, params).await
    }

    /// Execute a nested template addressed by `path` (the same way as
    /// [`execute`](Self::execute), descending `subcommands`).
    pub async fn execute_path(
        &self,
        conn: &mut ConnectionManager,
        category: &str,
        path: &[&str],
        params: &HashMap<String, String>,
    ) -> Result<ExecutionResult> {
        let template = self.store.lookup_path(category, path)?;
        self.execute_template(conn, template, params).await
    }

    async fn execute_template(
        &self,
        conn: &mut ConnectionManager,
        template: &CommandTemplate,
        params: &HashMap<String, String>,
    ) -> Result<ExecutionResult> {
        let command = substitute(&template.command, params)?;

        debug!("executing: {command}");
        let raw_output = conn.send_command(&command).await?;
        trace!("raw output: {raw_output:?}");

        let matched_expected = self.verify_response(template, &raw_output, params)?;
        let fields = self.parse_response(template, &raw_output)?;

        Ok(ExecutionResult {
            raw_output,
            matched_expected,
            fields,
        })
    }

    /// Check the expected-response text against the raw output.
    ///
    /// An empty expectation always matches. Otherwise the substituted
    /// expectation is checked as a case-sensitive substring; when that
    /// fails and the expectation compiles as a regex, a regex search is
    /// tried, since the template document mixes plain strings and
    /// patterns.
    pub fn verify_response(
        &self,
        template: &CommandTemplate,
        output: &str,
        params: &HashMap<String, String>,
    ) -> Result<bool> {
        if template.expected_response.is_empty() {
            return Ok(true);
        }

        let expected = substitute(&template.expected_response, params)?;
        if output.contains(&expected) {
            return Ok(true);
        }
        if let Ok(re) = Regex::new(&expected) {
            return Ok(re.is_match(output));
        }
        Ok(false)
    }

    /// Apply the template's parse pattern, mapping named capture groups
    /// to fields. No pattern or no match yields an empty map.
    pub fn parse_response(
        &self,
        template: &CommandTemplate,
        output: &str,
    ) -> Result<HashMap<String, String>> {
        let Some(pattern) = template.parse_pattern.as_deref() else {
            return Ok(HashMap::new());
        };

        let re = Regex::new(pattern).map_err(CommandError::InvalidPattern)?;
        let mut fields = HashMap::new();

        if let Some(captures) = re.captures(output) {
            for group in re.capture_names().flatten() {
                if let Some(value) = captures.name(group) {
                    fields.insert(group.to_string(), value.as_str().to_string());
                }
            }
        }
        Ok(fields)
    }
}

/// Substitute every `{param}` placeholder from `params`.
fn substitute(
    pattern: &str,
    params: &HashMap<String, String>,
) -> std::result::Result<String, CommandError> {
    let mut result = String::with_capacity(pattern.len());
    let mut last = 0;

    for captures in placeholder_pattern().captures_iter(pattern) {
        let whole = captures.get(0).expect("capture 0 always present");
        let name = &captures[1];

        let value = params.get(name).ok_or_else(|| CommandError::MissingParameter {
            name: name.to_string(),
        })?;

        result.push_str(&pattern[last..whole.start()]);
        result.push_str(value);
        last = whole.end();
    }
    result.push_str(&pattern[last..]);
    Ok(result)
}
