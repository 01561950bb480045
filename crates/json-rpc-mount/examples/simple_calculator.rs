//! Simple Calculator JSON-RPC Example
//!
//! Runs a handful of requests through an in-process endpoint: arithmetic on
//! plain numbers, arithmetic on big integers carried as strings, a method
//! that does not exist and a handler failure.

use std::sync::atomic::{AtomicU64, Ordering};

use json_rpc_mount::prelude::*;
use num_bigint::BigUint;
use tracing::info;

#[derive(Default)]
struct CalculatorState {
    operations: AtomicU64,
}

fn operand(params: &ExtValue, name: &str) -> HandlerResult<f64> {
    params
        .get(name)
        .and_then(ExtValue::as_f64)
        .ok_or_else(|| {
            HandlerError::with_code(
                INVALID_PARAMS,
                format!("Parameter '{}' is required and must be a number", name),
            )
        })
}

fn add(_req: &RequestContext, state: &CalculatorState, params: ExtValue) -> HandlerResult<f64> {
    state.operations.fetch_add(1, Ordering::Relaxed);
    Ok(operand(&params, "a")? + operand(&params, "b")?)
}

fn subtract(
    _req: &RequestContext,
    state: &CalculatorState,
    params: ExtValue,
) -> HandlerResult<f64> {
    state.operations.fetch_add(1, Ordering::Relaxed);
    Ok(operand(&params, "a")? - operand(&params, "b")?)
}

fn big_multiply(
    _req: &RequestContext,
    state: &CalculatorState,
    params: ExtValue,
) -> HandlerResult<BigUint> {
    state.operations.fetch_add(1, Ordering::Relaxed);
    let factor = |name: &str| {
        params.get(name).and_then(ExtValue::to_bigint).ok_or_else(|| {
            HandlerError::with_code(
                INVALID_PARAMS,
                format!("Parameter '{}' must be a non-negative integer", name),
            )
        })
    };
    Ok(factor("a")? * factor("b")?)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let endpoint = JsonRpcEndpoint::builder(CalculatorState::default())
        .method_sync("add", add)
        .method_sync("subtract", subtract)
        .method_sync("big_multiply", big_multiply)
        .build();

    let test_requests = [
        r#"{"jsonrpc": "2.0", "method": "add", "params": {"a": 5, "b": 3}, "id": 1}"#,
        r#"{"jsonrpc": "2.0", "method": "subtract", "params": {"a": 10, "b": 4}, "id": 2}"#,
        r#"{"jsonrpc": "2.0", "method": "big_multiply", "params": {"a": "123456789012345678901234567890", "b": "1000n"}, "id": 3}"#,
        r#"{"jsonrpc": "2.0", "method": "multiply", "params": {"a": 2, "b": 3}, "id": 4}"#,
        r#"{"jsonrpc": "2.0", "method": "add", "params": {"a": "invalid", "b": 5}, "id": 5}"#,
        r#"{"jsonrpc": "2.0", "method": "add", "params": "#,
    ];

    for request_json in test_requests {
        info!("Request: {}", request_json);
        let response = endpoint
            .handle_str(RequestContext::new().with_method("LOCAL"), request_json)
            .await;
        match response.to_json_string() {
            Ok(response_json) => info!("Response: {}", response_json),
            Err(e) => info!("Failed to serialize response: {}", e),
        }
    }

    info!(
        "Completed {} operations",
        endpoint.context().operations.load(Ordering::Relaxed)
    );
}
