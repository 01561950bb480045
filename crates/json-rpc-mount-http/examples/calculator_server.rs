//! Calculator JSON-RPC server over HTTP
//!
//! ```text
//! cargo run -p json-rpc-mount-http --example calculator_server -- --port 8641
//! curl -s -X POST http://127.0.0.1:8641/rpc \
//!   -H 'Content-Type: application/json' \
//!   -d '{"jsonrpc":"2.0","method":"factorial","params":{"n":30},"id":1}'
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use json_rpc_mount::prelude::*;
use json_rpc_mount_http::HttpJsonRpcServer;
use num_bigint::BigUint;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "calculator-server", about = "Calculator JSON-RPC server over HTTP")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8641)]
    port: u16,

    /// Path the endpoint is mounted on
    #[arg(long, default_value = "/rpc")]
    path: String,

    /// Per-call handler timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Default)]
struct Stats {
    calls: AtomicU64,
}

fn integer(params: &ExtValue, name: &str) -> HandlerResult<BigUint> {
    params.get(name).and_then(ExtValue::to_bigint).ok_or_else(|| {
        HandlerError::with_code(
            INVALID_PARAMS,
            format!("Parameter '{}' must be a non-negative integer", name),
        )
    })
}

fn add(_req: &RequestContext, stats: &Stats, params: ExtValue) -> HandlerResult<BigUint> {
    stats.calls.fetch_add(1, Ordering::Relaxed);
    Ok(integer(&params, "a")? + integer(&params, "b")?)
}

fn factorial(_req: &RequestContext, stats: &Stats, params: ExtValue) -> HandlerResult<BigUint> {
    stats.calls.fetch_add(1, Ordering::Relaxed);
    let n = params
        .get("n")
        .and_then(ExtValue::as_u64)
        .filter(|n| *n <= 1000)
        .ok_or_else(|| HandlerError::with_code(INVALID_PARAMS, "'n' must be an integer up to 1000"))?;
    Ok((1..=n).map(BigUint::from).product())
}

fn stats(req: &RequestContext, stats: &Stats, _params: ExtValue) -> HandlerResult {
    let calls = stats.calls.load(Ordering::Relaxed);
    Ok([
        ("calls", ExtValue::from(calls)),
        ("now", ExtValue::from(Utc::now())),
        ("received", ExtValue::from(req.received_at)),
    ]
    .into_iter()
    .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let bind_address: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let mut builder = JsonRpcEndpoint::builder(Stats::default())
        .method_sync("add", add)
        .method_sync("factorial", factorial)
        .method_sync("stats", stats);
    if let Some(ms) = args.timeout_ms {
        builder = builder.handler_timeout(Duration::from_millis(ms));
    }
    let endpoint = builder.build();
    info!("Registered methods: {:?}", endpoint.registry().method_names());

    let server = HttpJsonRpcServer::builder(endpoint)
        .bind_address(bind_address)
        .rpc_path(args.path)
        .build();

    server.run().await?;
    Ok(())
}
