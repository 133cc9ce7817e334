//! The driver-call data flow (spec §2): `parse -> {resolve, execute} per
//! block -> splice results back into literal chunks -> final Result`.
//!
//! Not itself a named component (C1–C6 cover parsing, resolution,
//! execution, serialization, the bridge server and the cache); this is
//! the thin sequencer spec §2's data-flow diagram describes tying them
//! together for a single driver invocation.

use crate::error::Result;
use crate::extension::{ExecutorContext, Registry};
use crate::parser::{self, VariableTag};
use crate::resolver::resolve_options;
use crate::result::{QueryResult, ResultBody};
use crate::serialize::{serializer_for, Format};
use std::collections::HashMap;

/// Run `source` end to end: parse, execute every block against `registry`
/// in source order, and splice the textual rendering of each `{{...}}`
/// block back into the surrounding literal text (spec §3 `ParsedQuery`,
/// §8 scenario S1).
pub async fn run(
    source: &str,
    tag: VariableTag,
    escape: char,
    registry: &Registry,
    ctx: &ExecutorContext,
    connection_properties: &HashMap<String, String>,
) -> Result<QueryResult> {
    let parsed = parser::parse(source, escape);
    if parsed.blocks.is_empty() {
        return Ok(QueryResult::scalar_str(parsed.render_blank()));
    }

    let mut rendered_blocks = Vec::with_capacity(parsed.blocks.len());
    for block in &parsed.blocks {
        let block_options: HashMap<String, String> =
            block.options.iter().map(|o| (o.name.clone(), o.value.clone())).collect();
        let extension_defaults = registry.get(&block.extension).map(|e| e.default_options()).unwrap_or_default();
        let resolved = resolve_options(
            &extension_defaults,
            connection_properties,
            &block_options,
            tag,
            &ctx.scopes,
            Some(&ctx.query.lock()),
        );
        let body = {
            let query = ctx.query.lock();
            crate::resolver::expand(&block.body, tag, &ctx.scopes, Some(&query), &resolved)
        };

        let mut result = registry.execute(&block.extension, ctx, &body, &resolved).await?;
        let text = render_as_text(&mut result)?;
        result.close()?;
        rendered_blocks.push(text);
    }

    let final_text = parsed.render(|block| rendered_blocks[block.index].clone());
    Ok(QueryResult::scalar_str(final_text))
}

/// Splice-back representation of one block's `Result` (spec §3: "the
/// *rendered* form of `blocks[i]`"). Scalars render as their string form
/// directly; row/update results render through the CSV serializer
/// (header-less) since the source's own block splicing flattens a result
/// set to its textual table form.
fn render_as_text(result: &mut QueryResult) -> Result<String> {
    if let ResultBody::Scalar(value) = &result.body {
        return Ok(value.as_string().unwrap_or_default());
    }
    let (fields, rows) = result.as_fields_and_rows()?;
    let mut options = HashMap::new();
    options.insert("header".to_string(), "false".to_string());
    let bytes = serializer_for(Format::Csv).encode(&fields, &rows, &options)?;
    Ok(String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Registry;
    use crate::resolver::{GlobalScope, Scopes};

    fn ctx() -> ExecutorContext {
        ExecutorContext::new(Scopes::new(GlobalScope::new()))
    }

    #[tokio::test]
    async fn s1_scenario_splices_script_block_into_literal_text() {
        let registry = Registry::with_builtins();
        let mut result = run(
            "select '{{ script: 10 + 2 }}'",
            VariableTag::Brace,
            '\\',
            &registry,
            &ctx(),
            &HashMap::new(),
        )
        .await
        .unwrap();
        let (_, rows) = result.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], crate::value::Value::Str("select '12'".to_string()));
    }

    #[tokio::test]
    async fn empty_query_yields_empty_result() {
        let registry = Registry::with_builtins();
        let mut result = run("", VariableTag::Brace, '\\', &registry, &ctx(), &HashMap::new())
            .await
            .unwrap();
        let (_, rows) = result.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], crate::value::Value::Str("".to_string()));
    }

    #[tokio::test]
    async fn silent_block_runs_but_its_text_is_dropped() {
        let registry = Registry::with_builtins();
        let mut result = run(
            "before {% var: global.flag=1 %}after",
            VariableTag::Brace,
            '\\',
            &registry,
            &ctx(),
            &HashMap::new(),
        )
        .await
        .unwrap();
        let (_, rows) = result.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], crate::value::Value::Str("before after".to_string()));
    }
}
