//! `${name}` / `$<name>` / `$[name]` placeholder expansion (spec §4.2).

use super::scope::{QueryScope, Scopes};
use crate::parser::VariableTag;
use std::collections::HashMap;

/// Expand every placeholder for the active `tag` in `text`. Lookup order:
/// query scope -> thread scope -> global scope -> `options` -> `defaults`.
/// Unresolved with no inline default: left verbatim. Unresolved with an
/// inline default (`name:default`): substituted with the default.
pub fn expand(
    text: &str,
    tag: VariableTag,
    scopes: &Scopes,
    query: Option<&QueryScope>,
    options: &HashMap<String, String>,
) -> String {
    let (open, close) = tag.delimiters();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    loop {
        match rest.find(open) {
            None => {
                out.push_str(rest);
                break;
            }
            Some(pos) => {
                out.push_str(&rest[..pos]);
                let after_open = &rest[pos + open.len()..];
                match after_open.find(close) {
                    None => {
                        // No matching close: treat the opener as literal.
                        out.push_str(open);
                        rest = after_open;
                    }
                    Some(end) => {
                        let body = &after_open[..end];
                        let (name, default) = match body.split_once(':') {
                            Some((n, d)) => (n, Some(d)),
                            None => (body, None),
                        };
                        let resolved = scopes
                            .lookup(name, query)
                            .or_else(|| options.get(name).cloned());
                        match resolved {
                            Some(v) => out.push_str(&v),
                            None => match default {
                                Some(d) => out.push_str(d),
                                None => {
                                    out.push_str(open);
                                    out.push_str(body);
                                    out.push_str(close);
                                }
                            },
                        }
                        rest = &after_open[end + close.len()..];
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::scope::GlobalScope;

    fn scopes_with(name: &str, value: &str) -> Scopes {
        let s = Scopes::new(GlobalScope::new());
        s.global.set(name, value);
        s
    }

    #[test]
    fn resolves_from_global_scope() {
        let scopes = scopes_with("user", "alice");
        let out = expand("hi ${user}", VariableTag::Brace, &scopes, None, &HashMap::new());
        assert_eq!(out, "hi alice");
    }

    #[test]
    fn missing_without_default_is_left_verbatim() {
        let scopes = Scopes::new(GlobalScope::new());
        let out = expand("hi ${nope}", VariableTag::Brace, &scopes, None, &HashMap::new());
        assert_eq!(out, "hi ${nope}");
    }

    #[test]
    fn missing_with_default_substitutes_default() {
        let scopes = Scopes::new(GlobalScope::new());
        let out = expand("hi ${nope:world}", VariableTag::Brace, &scopes, None, &HashMap::new());
        assert_eq!(out, "hi world");
    }

    #[test]
    fn angle_tag_uses_angle_delimiters_only() {
        let scopes = scopes_with("x", "1");
        let out = expand("a $<x> ${x}", VariableTag::Angle, &scopes, None, &HashMap::new());
        assert_eq!(out, "a 1 ${x}");
    }

    #[test]
    fn falls_back_to_options_map() {
        let scopes = Scopes::new(GlobalScope::new());
        let mut opts = HashMap::new();
        opts.insert("db.result".to_string(), "first".to_string());
        let out = expand("${db.result}", VariableTag::Brace, &scopes, None, &opts);
        assert_eq!(out, "first");
    }
}
