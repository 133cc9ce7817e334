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

//! JDBCX bridge server binary.
//!
//! Usage:
//!     jdbcx-server [OPTIONS]
//!
//! Options:
//!     --host <HOST>              Listen address (default: 0.0.0.0)
//!     --port <PORT>              Listen port (default: 8080)
//!     --config <PATH>            Config file path (else JDBCX_CONFIG/JDBCX_HOME)
//!     --auth-token <TOKEN>       Require this bearer token on every request
//!     --allow-ip <CIDR>          Allowed client CIDR range (repeatable)
//!     --cache-capacity <N>       Max in-flight + cached queries (default: 10000)
//!     --cache-ttl-secs <N>       Query result TTL (default: 1800)
//!     -D <NAME=VALUE>            Config override (repeatable)
//!     --verbose                  Enable verbose logging

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use jdbcx::acl::ServerAcl;
use jdbcx::cache::QueryCache;
use jdbcx::config::{parse_overrides, ConfigManager};
use jdbcx::extension::Registry;
use jdbcx::server::{router, AppState};

#[derive(Parser)]
#[command(name = "jdbcx-server", version, about = "HTTP bridge server for JDBCX query composition")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[arg(long)]
    config: Option<String>,

    #[arg(long = "auth-token")]
    auth_token: Option<String>,

    #[arg(long = "allow-ip", value_name = "CIDR")]
    allow_ip: Vec<String>,

    #[arg(long = "cache-capacity", default_value_t = 10_000)]
    cache_capacity: u64,

    #[arg(long = "cache-ttl-secs", default_value_t = 1800)]
    cache_ttl_secs: u64,

    #[arg(short = 'D', value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    let config_path = args.config.clone().map(std::path::PathBuf::from).or_else(jdbcx::config::default_config_path);
    let overrides = parse_overrides(&args.overrides);
    let config = match ConfigManager::load(config_path, overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let acl = ServerAcl::new().with_cidr_ranges(&args.allow_ip);
    let cache = QueryCache::new(args.cache_capacity, Duration::from_secs(args.cache_ttl_secs));
    let registry = Registry::with_builtins();

    let mut state = AppState::new(registry, cache, acl, config);
    if let Some(token) = args.auth_token.clone() {
        state = state.with_auth_token(token);
    }

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = format!("{}:{}", args.host, args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error: failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    eprintln!("JDBCX bridge server listening on {addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        eprintln!("Error: server exited with error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("\nShutting down...");
    }
}
