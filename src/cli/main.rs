//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! JDBCX driver-side CLI (spec §6: "Exactly one positional argument —
//! the URL beginning `jdbcx:...`; the second positional argument is the
//! inline query or `@path` to load from disk; `-D` system properties
//! mirror all options. Exit code 0 on success; 1 on any failure.").

use std::collections::HashMap;

use clap::Parser;

use jdbcx::config::parse_overrides;
use jdbcx::driver::DriverUrl;
use jdbcx::extension::{ExecutorContext, Registry};
use jdbcx::parser::{VariableTag, DEFAULT_ESCAPE};
use jdbcx::resolver::{GlobalScope, Scopes};

#[derive(Parser)]
#[command(name = "jdbcx", version, about = "JDBCX query-composition driver CLI")]
struct Args {
    /// Driver URL, e.g. jdbcx:script:jdbc:postgresql://host/db
    url: String,

    /// Inline query text, or @path to load the query from a file
    query: String,

    /// Config/option override, name=value (repeatable)
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    overrides: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let args = Args::parse();

    let driver_url = match DriverUrl::parse(&args.url) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let query_text = match load_query(&args.query) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let overrides = parse_overrides(&args.overrides);
    let connection_properties: HashMap<String, String> = overrides
        .into_iter()
        .filter_map(|(k, v)| k.strip_prefix("jdbcx.").map(|name| (name.to_string(), v)))
        .collect();

    let extension = driver_url.extension.clone().unwrap_or_default();
    let registry = Registry::with_builtins();
    let ctx = ExecutorContext::new(Scopes::new(GlobalScope::new()));

    let source = if extension.is_empty() {
        query_text
    } else {
        format!("{{{{ {extension}: {query_text} }}}}")
    };

    match jdbcx::pipeline::run(&source, VariableTag::Brace, DEFAULT_ESCAPE, &registry, &ctx, &connection_properties).await {
        Ok(mut result) => match result.as_fields_and_rows() {
            Ok((_, rows)) => {
                for row in rows {
                    let cells: Vec<String> = row.iter().map(|v| v.as_string().unwrap_or_default()).collect();
                    println!("{}", cells.join("\t"));
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn load_query(arg: &str) -> std::io::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(arg.to_string()),
    }
}
