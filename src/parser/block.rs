//! Parsed-query data model (spec §3): `VariableTag`, `ExecutableBlock`,
//! `ParsedQuery`.

/// Active placeholder syntax. Exactly one is active per invocation; the
/// other two delimiter pairs are literal text when not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableTag {
    Brace, // ${x}
    Angle, // $<x>
    Square, // $[x]
}

impl VariableTag {
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            VariableTag::Brace => ("${", "}"),
            VariableTag::Angle => ("$<", ">"),
            VariableTag::Square => ("$[", "]"),
        }
    }
}

/// A single `name=value` option parsed out of a block header.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOption {
    pub name: String,
    pub value: String,
}

/// Immutable record describing one `{{ ... }}` or `{% ... %}` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableBlock {
    /// 0-based position within the parsed query's block list.
    pub index: usize,
    /// Extension name (may be empty, meaning "default extension").
    pub extension: String,
    /// Block-local options from the header, in header order.
    pub options: Vec<RawOption>,
    /// Body text verbatim, exactly as it appeared between delimiters.
    pub body: String,
    /// `true` for `{{...}}` (its rendered text is spliced back in),
    /// `false` for `{%...%}` (rendered text is dropped; side effects and
    /// row output still flow).
    pub emits_output: bool,
}

impl ExecutableBlock {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.as_str())
    }
}

/// Ordered literal chunks interleaved with executable blocks.
///
/// Invariant (spec §3): reconstructing with `chunks[i]` then, if present,
/// `render(blocks[i])` for `i in 0..chunks.len()` yields the original
/// query when `render` returns each block's original delimited text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedQuery {
    pub chunks: Vec<String>,
    pub blocks: Vec<ExecutableBlock>,
}

impl ParsedQuery {
    /// Reassemble the query, substituting `rendered(block)` for each block
    /// (empty string when `emits_output` is false, matching spec §3).
    pub fn render(&self, mut rendered: impl FnMut(&ExecutableBlock) -> String) -> String {
        let mut out = String::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            out.push_str(chunk);
            if let Some(block) = self.blocks.get(i) {
                if block.emits_output {
                    out.push_str(&rendered(block));
                }
            }
        }
        out
    }

    /// The reassembly with every block substituted by the empty string —
    /// used by the property test for spec invariant 1.
    pub fn render_blank(&self) -> String {
        self.render(|_| String::new())
    }
}
