//! C1: Query Parser.
//!
//! Tokenizes a source query into literal chunks and executable blocks
//! (spec §4.1). A single left-to-right scan, no parser-combinator crate —
//! grounded on the teacher's own hand-written `Peekable<Chars>` scanners in
//! `sql/expr.rs`.

mod block;
mod lexer;

pub use block::{ExecutableBlock, ParsedQuery, RawOption, VariableTag};

/// `parse(source, escape) -> ParsedQuery` (spec §4.1 contract). `escape`
/// defaults to `\\` at call sites that don't override it.
pub fn parse(source: &str, escape: char) -> ParsedQuery {
    lexer::parse(source, escape)
}

pub const DEFAULT_ESCAPE: char = '\\';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_escape_constant_round_trips_s1_scenario() {
        let pq = parse("select '{{ script: 10 + 2 }}'", DEFAULT_ESCAPE);
        assert_eq!(pq.blocks[0].extension, "script");
    }
}
