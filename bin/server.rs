// Bank Ledger - Web Server
// JSON API over the ledger service (axum)

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bank_ledger::{
    Account, AccountNumber, AuditSink, Bank, FanoutAuditSink, LedgerConfig, LedgerError,
    LedgerService, SqliteStore, TracingAuditSink,
};

type Ledger = LedgerService<Arc<SqliteStore>>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    ledger: Arc<Ledger>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Ledger error carried out of a handler
struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::DuplicateName(_) | LedgerError::DuplicateAccount { .. } => {
                StatusCode::CONFLICT
            }
            LedgerError::AllocationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            LedgerError::Storage(e) => {
                tracing::error!(
                    operation = e.operation,
                    key = %e.key,
                    error = %e.message,
                    "storage failure"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
struct CreateBankRequest {
    name: String,
    lot_id: i64,
}

#[derive(Deserialize)]
struct CreateAccountRequest {
    player: String,
    #[serde(default)]
    starting_balance: i64,
}

#[derive(Deserialize)]
struct AmountRequest {
    amount: i64,
}

#[derive(Deserialize)]
struct PinRequest {
    pin: String,
}

/// Account as shown over the API (PIN never leaves the server)
#[derive(Serialize)]
struct AccountResponse {
    player: String,
    account_number: AccountNumber,
    balance: i64,
    has_pin: bool,
}

#[derive(Serialize)]
struct BankResponse {
    id: i64,
    name: String,
    lot_id: i64,
    accounts: Vec<AccountResponse>,
}

#[derive(Serialize)]
struct WithdrawResponse {
    applied: bool,
    balance: i64,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            has_pin: account.has_pin(),
            player: account.player,
            account_number: account.account_number,
            balance: account.balance,
        }
    }
}

impl From<Bank> for BankResponse {
    fn from(bank: Bank) -> Self {
        Self {
            id: bank.id,
            name: bank.name,
            lot_id: bank.lot_id,
            accounts: bank.accounts.into_iter().map(|a| a.into()).collect(),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/banks - Create a bank
async fn create_bank(
    State(state): State<AppState>,
    Json(req): Json<CreateBankRequest>,
) -> ApiResult<BankResponse> {
    let bank = state.ledger.create_bank(&req.name, req.lot_id)?;
    Ok(Json(ApiResponse::ok(bank.into())))
}

/// GET /api/banks/:name - Bank with accounts
async fn get_bank(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<BankResponse> {
    let bank = state.ledger.get_bank(&name)?;
    Ok(Json(ApiResponse::ok(bank.into())))
}

/// DELETE /api/banks/:name - Delete a bank and its accounts
async fn delete_bank(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<String> {
    let bank = state.ledger.get_bank(&name)?;
    state.ledger.delete_bank(&bank)?;
    Ok(Json(ApiResponse::ok(name)))
}

/// POST /api/banks/:name/accounts - Open an account
async fn create_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<AccountResponse> {
    let bank = state.ledger.get_bank(&name)?;
    let account = state
        .ledger
        .create_account(&bank, &req.player, req.starting_balance)?;
    Ok(Json(ApiResponse::ok(account.into())))
}

/// GET /api/banks/:name/accounts/:number - One account
async fn get_account(
    State(state): State<AppState>,
    Path((name, number)): Path<(String, AccountNumber)>,
) -> ApiResult<AccountResponse> {
    let bank = state.ledger.get_bank(&name)?;
    let account = state.ledger.get_account_by_number(&bank, number)?;
    Ok(Json(ApiResponse::ok(account.into())))
}

/// POST /api/banks/:name/accounts/:number/deposit
async fn deposit(
    State(state): State<AppState>,
    Path((name, number)): Path<(String, AccountNumber)>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<AccountResponse> {
    let bank = state.ledger.get_bank(&name)?;
    let account = state.ledger.get_account_by_number(&bank, number)?;
    let account = state.ledger.deposit(&bank, &account, req.amount)?;
    Ok(Json(ApiResponse::ok(account.into())))
}

/// POST /api/banks/:name/accounts/:number/withdraw
///
/// Insufficient funds is a normal 200 response with `applied: false`.
async fn withdraw(
    State(state): State<AppState>,
    Path((name, number)): Path<(String, AccountNumber)>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<WithdrawResponse> {
    let bank = state.ledger.get_bank(&name)?;
    let account = state.ledger.get_account_by_number(&bank, number)?;
    let applied = state.ledger.withdraw(&bank, &account, req.amount)?;
    let balance = state.ledger.get_account_by_number(&bank, number)?.balance;
    Ok(Json(ApiResponse::ok(WithdrawResponse { applied, balance })))
}

/// POST /api/banks/:name/accounts/:number/pin
async fn set_pin(
    State(state): State<AppState>,
    Path((name, number)): Path<(String, AccountNumber)>,
    Json(req): Json<PinRequest>,
) -> ApiResult<AccountResponse> {
    let bank = state.ledger.get_bank(&name)?;
    let account = state.ledger.get_account_by_number(&bank, number)?;
    state.ledger.set_pin(&account, &req.pin)?;
    let account = state.ledger.get_account_by_number(&bank, number)?;
    Ok(Json(ApiResponse::ok(account.into())))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = LedgerConfig::load(config_path.as_deref())?;

    let store = Arc::new(
        SqliteStore::open(&config.database_path)
            .with_context(|| format!("Failed to open {}", config.database_path.display()))?,
    );
    tracing::info!(db = %config.database_path.display(), "database opened");

    let sinks: Vec<Arc<dyn AuditSink>> = vec![store.clone(), Arc::new(TracingAuditSink)];
    let ledger = LedgerService::from_config(store, &config)
        .with_audit(Arc::new(FanoutAuditSink::new(sinks)));

    let state = AppState {
        ledger: Arc::new(ledger),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/banks", post(create_bank))
        .route("/banks/:name", get(get_bank).delete(delete_bank))
        .route("/banks/:name/accounts", post(create_account))
        .route("/banks/:name/accounts/:number", get(get_account))
        .route("/banks/:name/accounts/:number/deposit", post(deposit))
        .route("/banks/:name/accounts/:number/withdraw", post(withdraw))
        .route("/banks/:name/accounts/:number/pin", post(set_pin))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    tracing::info!(addr = %config.server_addr, "bank server listening");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
