//! Command template definitions and the immutable template store.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{CommandError, ConfigError};

/// One command definition from the template document.
///
/// `command` carries `{param}` placeholders resolved at execution time.
/// `expected_response` is the text whose presence in the output marks
/// the command as acknowledged. `parse_pattern` is an optional regex
/// whose named capture groups become the extracted fields.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandTemplate {
    /// Command string with `{param}` placeholders.
    pub command: String,

    /// Expected substring (or regex) in the device's response. May
    /// itself contain `{param}` placeholders.
    #[serde(default)]
    pub expected_response: String,

    /// Extraction regex applied to the raw output; named capture groups
    /// map to result fields.
    #[serde(default)]
    pub parse_pattern: Option<String>,

    /// CLI modes this command is valid in (informational, enforced by
    /// test bodies).
    #[serde(default)]
    pub valid_modes: Vec<String>,

    /// Nested templates, e.g. spanning-tree priority under
    /// spanning-tree mode.
    #[serde(default)]
    pub subcommands: IndexMap<String, CommandTemplate>,
}

/// Immutable registry of command templates: category name to template
/// name to definition.
///
/// Loaded once at startup and shared by reference for the lifetime of a
/// run — read-only after load, so suites need no synchronization.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct TemplateStore {
    categories: IndexMap<String, IndexMap<String, CommandTemplate>>,
}

impl TemplateStore {
    /// Parse the template document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the template document from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Look up a template, failing fast when the category or name is
    /// absent.
    pub fn lookup(&self, category: &str, name: &str) -> Result<&CommandTemplate, CommandError> {
        self.categories
            .get(category)
            .and_then(|templates| templates.get(name))
            .ok_or_else(|| CommandError::UnknownCommand {
                category: category.to_string(),
                name: name.to_string(),
            })
    }

    /// Look up a nested template by walking `subcommands`: the first
    /// path element names the top-level template, the rest descend.
    pub fn lookup_path(
        &self,
        category: &str,
        path: &[&str],
    ) -> Result<&CommandTemplate, CommandError> {
        let (first, rest) = path.split_first().ok_or_else(|| CommandError::UnknownCommand {
            category: category.to_string(),
            name: String::new(),
        })?;

        let mut template = self.lookup(category, first)?;
        for name in rest {
            template = template
                .subcommands
                .get(*name)
                .ok_or_else(|| CommandError::UnknownCommand {
                    category: category.to_string(),
                    name: path.join("."),
                })?;
        }
        Ok(template)
    }

    /// Category names in document order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Template names in a category, in document order.
    pub fn templates_in(&self, category: &str) -> impl Iterator<Item = &str> {
        self.categories
            .get(category)
            .into_iter()
            .flat_map(|templates| templates.keys().map(String::as_str))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_TEMPLATES: &str = r#"{
        "vlan_commands": {
            "create_vlan": {
                "command": "vlan {vlan_id}",
                "expected_response": "",
                "valid_modes": ["config"]
            },
            "show_vlan_id": {
                "command": "show vlan id {vlan}",
                "expected_response": "{vlan}",
                "parse_pattern": "^(?P<vlan>\\d+)\\s+(?P<name>\\S+)\\s+(?P<status>\\S+)"
            }
        },
        "show_commands": {
            "show_mac_table": {
                "command": "show mac address-table interface {interface}",
                "expected_response": "Mac Address Table",
                "parse_pattern": "(?P<vlan>\\d+)\\s+(?P<mac>(?:[0-9a-f]{4}\\.){2}[0-9a-f]{4})\\s+\\S+\\s+(?P<port>\\S+)"
            }
        },
        "spanning_tree_commands": {
            "spanning_tree_mode": {
                "command": "spanning-tree mode {mode}",
                "expected_response": "",
                "valid_modes": ["config"],
                "subcommands": {
                    "set_priority": {
                        "command": "spanning-tree vlan {vlan_id} priority {priority}",
                        "expected_response": ""
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_lookup_known_template() {
        let store = TemplateStore::from_json(SAMPLE_TEMPLATES).unwrap();
        let template = store.lookup("vlan_commands", "create_vlan").unwrap();
        assert_eq!(template.command, "vlan {vlan_id}");
        assert_eq!(template.valid_modes, vec!["config"]);
    }

    #[test]
    fn test_lookup_unknown_fails_fast() {
        let store = TemplateStore::from_json(SAMPLE_TEMPLATES).unwrap();
        match store.lookup("vlan_commands", "delete_universe") {
            Err(CommandError::UnknownCommand { category, name }) => {
                assert_eq!(category, "vlan_commands");
                assert_eq!(name, "delete_universe");
            }
            other => panic!("expected UnknownCommand, got {other:?}"),
        }
        assert!(store.lookup("no_such_category", "create_vlan").is_err());
    }

    #[test]
    fn test_lookup_path_descends_subcommands() {
        let store = TemplateStore::from_json(SAMPLE_TEMPLATES).unwrap();
        let template = store
            .lookup_path("spanning_tree_commands", &["spanning_tree_mode", "set_priority"])
            .unwrap();
        assert_eq!(
            template.command,
            "spanning-tree vlan {vlan_id} priority {priority}"
        );
    }

    #[test]
    fn test_lookup_path_unknown_subcommand() {
        let store = TemplateStore::from_json(SAMPLE_TEMPLATES).unwrap();
        assert!(store
            .lookup_path("spanning_tree_commands", &["spanning_tree_mode", "nope"])
            .is_err());
    }

    #[test]
    fn test_invalid_document_is_config_error() {
        assert!(matches!(
            TemplateStore::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_iteration_order_is_document_order() {
        let store = TemplateStore::from_json(SAMPLE_TEMPLATES).unwrap();
        let categories: Vec<_> = store.categories().collect();
        assert_eq!(
            categories,
            vec!["vlan_commands", "show_commands", "spanning_tree_commands"]
        );
    }
}
