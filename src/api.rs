//! REST API for the ETH Minter
//!
//! Endpoints:
//! - GET  /api/health                     - Health check
//! - GET  /api/minter_address             - Address holding the deposits
//! - GET  /api/balance/:identity          - Host ledger balance
//! - POST /api/withdraw                   - Submit a withdrawal
//! - GET  /api/withdrawal/:sequence       - Withdrawal status
//! - GET  /api/logs?from=&to=&address=    - Minted deposits in a block range
//! - GET  /api/price/eip1559              - Current EIP-1559 price
//! - GET  /api/price/eip2930              - Current EIP-2930 price
//! - GET  /api/debug/state                - State dump
//! - POST /api/test/transfer              - Diagnostic transfer (when enabled)
//! - GET  /api/test/transaction/:hash     - Transaction lookup
//!
//! Wei amounts in request bodies are decimal strings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::common::{MinterError, ValidationError};
use crate::minter::Minter;
use crate::types::{parse_wei, Address, Hash, HostIdentity, RetrieveEthStatus, Wei};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Hex-encoded host identity of the caller
    pub caller: String,
    pub amount: String,
    pub destination: String,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub from: u64,
    pub to: u64,
    /// Source address filter
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestTransferRequest {
    pub destination: String,
    pub amount: String,
    pub nonce: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub identity: String,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct MinterAddressResponse {
    pub address: Address,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

// =============================================================================
// Application State
// =============================================================================

pub type AppState = Arc<Minter>;

/// Map a minter error to an HTTP response
fn error_response(err: MinterError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, MinterError::Disabled(_)) {
        StatusCode::FORBIDDEN
    } else if err.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status.is_server_error() {
        tracing::warn!(code = err.error_code(), error = %err, "request failed");
    }

    let response = ErrorResponse {
        error: err.error_code().to_string(),
        details: Some(err.to_string()),
    };
    (status, Json(response)).into_response()
}

fn parse_amount(raw: &str) -> Result<Wei, MinterError> {
    parse_wei(raw).ok_or_else(|| MinterError::invalid_parameter(format!("invalid amount: {}", raw)))
}

fn parse_identity(raw: &str) -> Result<HostIdentity, MinterError> {
    raw.parse::<HostIdentity>()
        .map_err(|e| MinterError::from(ValidationError::InvalidIdentity(e.to_string())))
}

// =============================================================================
// API Handlers
// =============================================================================

/// GET /api/health
async fn handle_health(State(minter): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "eth-minter",
        "version": env!("CARGO_PKG_VERSION"),
        "running": minter.is_running().await,
    }))
}

/// GET /api/minter_address
async fn handle_minter_address(State(minter): State<AppState>) -> Response {
    match minter.minter_address().await {
        Ok(address) => Json(MinterAddressResponse { address }).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/balance/:identity
async fn handle_balance(
    State(minter): State<AppState>,
    Path(identity): Path<String>,
) -> Response {
    let identity = match parse_identity(&identity) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    let balance = minter.balance_of(&identity).await;
    Json(BalanceResponse {
        identity: identity.to_string(),
        balance: balance.to_string(),
    })
    .into_response()
}

/// POST /api/withdraw
///
/// Debits the caller and queues a withdrawal. Returns the sequence number
/// used to poll its status.
async fn handle_withdraw(
    State(minter): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Response {
    let request = parse_identity(&req.caller)
        .and_then(|caller| parse_amount(&req.amount).map(|amount| (caller, amount)));
    let (caller, amount) = match request {
        Ok(parsed) => parsed,
        Err(e) => return error_response(e),
    };

    match minter.withdraw(caller, amount, &req.destination).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/withdrawal/:sequence_number
async fn handle_withdrawal_status(
    State(minter): State<AppState>,
    Path(sequence_number): Path<u64>,
) -> Response {
    let status = minter.retrieve_eth_status(sequence_number).await;
    let code = match status {
        RetrieveEthStatus::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (code, Json(status)).into_response()
}

/// GET /api/logs
async fn handle_logs(State(minter): State<AppState>, Query(query): Query<LogsQuery>) -> Response {
    let source = match query.address.as_deref().map(str::parse::<Address>) {
        None => None,
        Some(Ok(address)) => Some(address),
        Some(Err(e)) => {
            return error_response(MinterError::invalid_parameter(format!(
                "invalid source address: {}",
                e
            )))
        }
    };

    match minter.display_logs(query.from, query.to, source).await {
        Ok(deposits) => Json(deposits).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/price/eip1559
async fn handle_eip1559_price(State(minter): State<AppState>) -> Response {
    match minter.eip_1559_transaction_price().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/price/eip2930
async fn handle_eip2930_price(State(minter): State<AppState>) -> Response {
    match minter.eip_2930_transaction_price().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/debug/state
async fn handle_debug_state(State(minter): State<AppState>) -> impl IntoResponse {
    Json(minter.dump_state_for_debugging().await)
}

/// POST /api/test/transfer
async fn handle_test_transfer(
    State(minter): State<AppState>,
    Json(req): Json<TestTransferRequest>,
) -> Response {
    let amount = match parse_amount(&req.amount) {
        Ok(amount) => amount,
        Err(e) => return error_response(e),
    };

    match minter.test_transfer(&req.destination, amount, req.nonce).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/test/transaction/:hash
async fn handle_test_transaction(
    State(minter): State<AppState>,
    Path(hash): Path<String>,
) -> Response {
    let hash: Hash = match hash.parse() {
        Ok(hash) => hash,
        Err(e) => {
            return error_response(MinterError::invalid_parameter(format!(
                "invalid transaction hash: {}",
                e
            )))
        }
    };

    match minter.test_get_transaction_by_hash(&hash).await {
        Ok(Some(transaction)) => Json(transaction).into_response(),
        Ok(None) => {
            let response = ErrorResponse {
                error: "Not found".to_string(),
                details: Some(format!("Transaction {} not found", hash)),
            };
            (StatusCode::NOT_FOUND, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Router Setup
// =============================================================================

/// Create the API router with all endpoints
pub fn create_router(minter: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let test_transfer_enabled = minter.settings().test_transfer_enabled;

    let mut router = Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/minter_address", get(handle_minter_address))
        .route("/api/balance/:identity", get(handle_balance))
        .route("/api/withdraw", post(handle_withdraw))
        .route("/api/withdrawal/:sequence_number", get(handle_withdrawal_status))
        .route("/api/logs", get(handle_logs))
        .route("/api/price/eip1559", get(handle_eip1559_price))
        .route("/api/price/eip2930", get(handle_eip2930_price))
        .route("/api/debug/state", get(handle_debug_state))
        .route("/api/test/transaction/:hash", get(handle_test_transaction));
    if test_transfer_enabled {
        router = router.route("/api/test/transfer", post(handle_test_transfer));
    }

    router.layer(cors).with_state(minter)
}

/// Start the API server
pub async fn start_server(minter: AppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(minter);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    println!("=== ETH Minter API ===");
    println!("Listening on http://{}", addr);
    println!();
    println!("Endpoints:");
    println!("  GET  /api/minter_address          - Deposit address");
    println!("  GET  /api/balance/:identity       - Host ledger balance");
    println!("  POST /api/withdraw                - Submit withdrawal");
    println!("  GET  /api/withdrawal/:sequence    - Withdrawal status");
    println!("  GET  /api/logs?from=&to=          - Minted deposits");
    println!("  GET  /api/price/eip1559           - EIP-1559 price");
    println!("  GET  /api/price/eip2930           - EIP-2930 price");
    println!("  GET  /api/debug/state             - State dump");
    println!("  GET  /api/health                  - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

// =============================================================================
// Tests
// =============================================================================
