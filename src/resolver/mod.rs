//! C2: Variable & Option Resolver.

mod options;
mod placeholder;
mod scope;

pub use options::{merge_options, OptionSpec};
pub use placeholder::expand;
pub use scope::{GlobalScope, QueryScope, ScopeName, Scopes};

use crate::parser::VariableTag;
use std::collections::HashMap;

/// Merge the three option tiers, then placeholder-expand every resulting
/// value string exactly once against the same scope chain (spec §4.2:
/// "Value strings are themselves placeholder-expanded once with the same
/// scope chain, after merging").
pub fn resolve_options(
    extension_defaults: &[OptionSpec],
    connection_properties: &HashMap<String, String>,
    block_options: &HashMap<String, String>,
    tag: VariableTag,
    scopes: &Scopes,
    query: Option<&QueryScope>,
) -> HashMap<String, String> {
    let merged = merge_options(extension_defaults, connection_properties, block_options);
    merged
        .into_iter()
        .map(|(k, v)| {
            let expanded = placeholder::expand(&v, tag, scopes, query, &HashMap::new());
            (k, expanded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_expanded_once_after_merge() {
        let scopes = Scopes::new(GlobalScope::new());
        scopes.global.set("host", "db.example.com");
        let defaults = vec![OptionSpec::new("url", "", "jdbc://${host}/default")];
        let block = HashMap::new();
        let conn = HashMap::new();
        let resolved = resolve_options(
            &defaults,
            &conn,
            &block,
            VariableTag::Brace,
            &scopes,
            None,
        );
        assert_eq!(resolved.get("url").unwrap(), "jdbc://db.example.com/default");
    }
}
