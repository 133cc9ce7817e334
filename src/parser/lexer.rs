//! Single left-to-right scan implementing the parser contract of spec §4.1.

use super::block::{ExecutableBlock, ParsedQuery, RawOption};

/// `parse(source, tag, escape) -> ParsedQuery`.
///
/// Recognizes exactly two block delimiters: `{{ ... }}` (output) and
/// `{% ... %}` (silent). Any character preceded by `escape` is emitted
/// literally, including `{`, `}`, `%`, and `escape` itself. An opened but
/// never-closed block is emitted as literal text with a DEBUG log event.
/// Nested blocks are not supported: an inner `{{`/`{%` inside a body is
/// literal.
pub fn parse(source: &str, escape: char) -> ParsedQuery {
    let chars: Vec<char> = source.chars().collect();
    let n = chars.len();
    let mut chunks: Vec<String> = Vec::new();
    let mut blocks: Vec<ExecutableBlock> = Vec::new();
    let mut current = String::new();
    let mut i = 0usize;

    while i < n {
        let c = chars[i];
        if c == escape && i + 1 < n {
            current.push(chars[i + 1]);
            i += 2;
            continue;
        }
        // `{{` wins over `{%` because a single-char lookahead matches `{`
        // followed by `{` first (spec §4.1 tie-break note).
        if c == '{' && i + 1 < n && chars[i + 1] == '{' {
            if let Some((block, next_i)) = try_consume_block(&chars, i, escape, true) {
                chunks.push(std::mem::take(&mut current));
                blocks.push(ExecutableBlock {
                    index: blocks.len(),
                    ..block
                });
                i = next_i;
                continue;
            } else {
                tracing::debug!(position = i, "unterminated {{ block; emitted as literal text");
                current.push_str(&chars[i..n].iter().collect::<String>());
                i = n;
                continue;
            }
        }
        if c == '{' && i + 1 < n && chars[i + 1] == '%' {
            if let Some((block, next_i)) = try_consume_block(&chars, i, escape, false) {
                chunks.push(std::mem::take(&mut current));
                blocks.push(ExecutableBlock {
                    index: blocks.len(),
                    ..block
                });
                i = next_i;
                continue;
            } else {
                tracing::debug!(position = i, "unterminated {{% block; emitted as literal text");
                current.push_str(&chars[i..n].iter().collect::<String>());
                i = n;
                continue;
            }
        }
        current.push(c);
        i += 1;
    }
    chunks.push(current);

    ParsedQuery { chunks, blocks }
}

/// Attempt to consume a full `{{ ... }}` / `{% ... %}` block starting at
/// `start` (pointing at the opening `{`). Returns the parsed block (with a
/// placeholder `index`, fixed up by the caller) and the index just past the
/// closing delimiter, or `None` if no matching close was found.
fn try_consume_block(
    chars: &[char],
    start: usize,
    escape: char,
    output: bool,
) -> Option<(ExecutableBlock, usize)> {
    let n = chars.len();
    let body_start = start + 2;
    let close = if output { ['}', '}'] } else { ['%', '}'] };

    let mut i = body_start;
    let mut inner = String::new();
    while i < n {
        let c = chars[i];
        if c == escape && i + 1 < n {
            inner.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == close[0] && i + 1 < n && chars[i + 1] == close[1] {
            let (extension, options, body) = parse_header(&inner);
            return Some((
                ExecutableBlock {
                    index: 0,
                    extension,
                    options,
                    body,
                    emits_output: output,
                },
                i + 2,
            ));
        }
        inner.push(c);
        i += 1;
    }
    None
}

/// Parse the `extension ( '(' options ')' )? ':'` header grammar out of a
/// block's inner content. If no top-level unescaped colon is found, the
/// whole content is the body and the extension is empty (spec §4.1: "the
/// entire inside is treated as the body and the extension is empty").
fn parse_header(content: &str) -> (String, Vec<RawOption>, String) {
    let chars: Vec<char> = content.chars().collect();
    let n = chars.len();
    let mut i = 0usize;

    // extension identifier: letters, digits, '_', may contain '.'
    let ext_start = i;
    while i < n && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
        i += 1;
    }
    if i == ext_start {
        // No identifier at all at the very start: whole thing is body.
        return (String::new(), Vec::new(), content.to_string());
    }
    let extension: String = chars[ext_start..i].iter().collect();

    let mut options = Vec::new();
    if i < n && chars[i] == '(' {
        match parse_options(&chars, i) {
            Some((opts, next_i)) => {
                options = opts;
                i = next_i;
            }
            None => return (String::new(), Vec::new(), content.to_string()),
        }
    }

    if i < n && chars[i] == ':' {
        let body: String = chars[i + 1..].iter().collect();
        (extension, options, body)
    } else {
        // Header grammar requires the colon; fall back to "no header".
        (String::new(), Vec::new(), content.to_string())
    }
}

/// Parse `'(' option (',' option)* ')'` starting at the `(`. Returns the
/// options and the index just past the closing `)`.
fn parse_options(chars: &[char], open_paren: usize) -> Option<(Vec<RawOption>, usize)> {
    let n = chars.len();
    let mut i = open_paren + 1;
    let mut options = Vec::new();

    loop {
        while i < n && chars[i].is_whitespace() {
            i += 1;
        }
        if i < n && chars[i] == ')' {
            return Some((options, i + 1));
        }
        let (opt, next_i) = parse_one_option(chars, i)?;
        options.push(opt);
        i = next_i;
        while i < n && chars[i].is_whitespace() {
            i += 1;
        }
        if i < n && chars[i] == ',' {
            i += 1;
            continue;
        }
        if i < n && chars[i] == ')' {
            return Some((options, i + 1));
        }
        return None;
    }
}

fn parse_one_option(chars: &[char], start: usize) -> Option<(RawOption, usize)> {
    let n = chars.len();
    let mut i = start;
    let name_start = i;
    while i < n && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name: String = chars[name_start..i].iter().collect();
    while i < n && chars[i].is_whitespace() {
        i += 1;
    }
    if i >= n || chars[i] != '=' {
        return None;
    }
    i += 1;
    while i < n && chars[i].is_whitespace() {
        i += 1;
    }
    let (value, next_i) = parse_value(chars, i)?;
    Some((RawOption { name, value }, next_i))
}

fn parse_value(chars: &[char], start: usize) -> Option<(String, usize)> {
    let n = chars.len();
    if start >= n {
        return Some((String::new(), start));
    }
    let quote = chars[start];
    if quote == '"' || quote == '\'' || quote == '`' {
        let mut i = start + 1;
        let mut value = String::new();
        while i < n {
            if chars[i] == '\\' && i + 1 < n {
                value.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if chars[i] == quote {
                return Some((value, i + 1));
            }
            value.push(chars[i]);
            i += 1;
        }
        None // unterminated quoted value
    } else {
        // Bareword: terminates at unescaped ',' or ')'.
        let mut i = start;
        let mut value = String::new();
        while i < n {
            if chars[i] == '\\' && i + 1 < n {
                value.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if chars[i] == ',' || chars[i] == ')' {
                break;
            }
            value.push(chars[i]);
            i += 1;
        }
        Some((value.trim_end().to_string(), i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_has_zero_chunks_and_blocks() {
        let pq = parse("", '\\');
        assert_eq!(pq.chunks.len(), 1);
        assert_eq!(pq.chunks[0], "");
        assert_eq!(pq.blocks.len(), 0);
    }

    #[test]
    fn plain_text_has_no_blocks() {
        let pq = parse("select 1", '\\');
        assert_eq!(pq.blocks.len(), 0);
        assert_eq!(pq.chunks, vec!["select 1".to_string()]);
    }

    #[test]
    fn inline_output_block_parses_header_and_body() {
        let pq = parse("select '{{ script: 10 + 2 }}'", '\\');
        assert_eq!(pq.blocks.len(), 1);
        let b = &pq.blocks[0];
        assert_eq!(b.extension, "script");
        assert_eq!(b.body.trim(), "10 + 2");
        assert!(b.emits_output);
        assert_eq!(pq.chunks[0], "select '");
        assert_eq!(pq.chunks[1], "'");
    }

    #[test]
    fn silent_block_does_not_emit_output() {
        let pq = parse("{% shell: echo hi %}done", '\\');
        assert!(!pq.blocks[0].emits_output);
    }

    #[test]
    fn header_without_colon_has_empty_extension_and_full_body() {
        let pq = parse("{{ just some body text }}", '\\');
        assert_eq!(pq.blocks[0].extension, "");
        assert_eq!(pq.blocks[0].body, " just some body text ");
    }

    #[test]
    fn options_parse_quoted_and_bareword_values() {
        let pq = parse(
            "{{web(base.url=\"http://x\", request.headers=a=b,c=d, n=1): body}}",
            '\\',
        );
        let b = &pq.blocks[0];
        assert_eq!(b.extension, "web");
        assert_eq!(b.option("base.url"), Some("http://x"));
        assert_eq!(b.option("request.headers"), Some("a=b"));
        assert_eq!(b.option("c"), Some("d"));
        assert_eq!(b.option("n"), Some("1"));
        assert_eq!(b.body, " body");
    }

    #[test]
    fn escape_hides_delimiters() {
        let pq = parse(r"a \{\{ b \}\} c", '\\');
        assert_eq!(pq.blocks.len(), 0);
        assert_eq!(pq.chunks[0], "a {{ b }} c");
    }

    #[test]
    fn unterminated_block_is_literal() {
        let pq = parse("select {{ db: select 1", '\\');
        assert_eq!(pq.blocks.len(), 0);
        assert_eq!(pq.chunks[0], "select {{ db: select 1");
    }

    #[test]
    fn nested_delimiters_are_not_special() {
        let pq = parse("{{script: a {{ b }} c}}", '\\');
        assert_eq!(pq.blocks.len(), 1);
        assert_eq!(pq.blocks[0].body, " a {{ b ");
        assert_eq!(pq.chunks, vec!["".to_string(), " c}}".to_string()]);
    }

    #[test]
    fn reassembly_with_blank_blocks_differs_only_inside_delimiters() {
        let src = "pre {{script: 1+1}} mid {% shell: x %} post";
        let pq = parse(src, '\\');
        let blank = pq.render_blank();
        assert_eq!(blank, "pre  mid  post");
    }
}
