//! Option records and the three-tier merge (spec §3 `Option`, §4.2).

use std::collections::HashMap;

/// Declares one option an extension recognizes, with its default and
/// optional enumerated choices.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: String,
    pub description: String,
    pub default_value: String,
    pub choices: Option<Vec<String>>,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, default_value: impl Into<String>) -> Self {
        OptionSpec {
            name: name.into(),
            description: description.into(),
            default_value: default_value.into(),
            choices: None,
        }
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = Some(choices);
        self
    }
}

/// `effective = extensionDefaults (+) connectionProperties (+) blockOptions`,
/// each tier overriding the previous by exact key (spec §4.2).
pub fn merge_options(
    extension_defaults: &[OptionSpec],
    connection_properties: &HashMap<String, String>,
    block_options: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut effective: HashMap<String, String> = extension_defaults
        .iter()
        .map(|o| (o.name.clone(), o.default_value.clone()))
        .collect();
    for (k, v) in connection_properties {
        effective.insert(k.clone(), v.clone());
    }
    for (k, v) in block_options {
        effective.insert(k.clone(), v.clone());
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_tiers_override_by_exact_key() {
        let defaults = vec![
            OptionSpec::new("exec.timeout", "", "30000"),
            OptionSpec::new("exec.error", "", "throw"),
        ];
        let mut conn = HashMap::new();
        conn.insert("exec.timeout".to_string(), "5000".to_string());
        let mut block = HashMap::new();
        block.insert("exec.error".to_string(), "ignore".to_string());

        let effective = merge_options(&defaults, &conn, &block);
        assert_eq!(effective.get("exec.timeout").unwrap(), "5000");
        assert_eq!(effective.get("exec.error").unwrap(), "ignore");
    }
}
