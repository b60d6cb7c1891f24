//! REST API server for Rustorium
//!
//! Exposes the ledger over HTTP: block, transaction and account explorers,
//! transaction submission with optional auto-mining, account creation and
//! network statistics. Balances are rendered as JSON numbers.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::account::Account;
use crate::amount::{amount_from_f64, Amount, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::blockchain::{Block, NetworkStats};
use crate::crypto::Signature;
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::transaction::{Transaction, TransferRequest, TxKind, TxStatus};

pub const MAX_PAGE_LIMIT: usize = 100;
const DEFAULT_PAGE_LIMIT: usize = 10;

/// Shared state handed to every handler.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    /// Mine a block right after each accepted submission, rewarding the sender.
    pub auto_mine: bool,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, auto_mine: bool) -> Self {
        Self { ledger, auto_mine }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Ledger(#[from] ChainError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Ledger(ChainError::MiningFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ledger(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Validated pagination: 1-based `page`, `limit` within 1..=100.
#[derive(Debug, Clone, Copy)]
struct Page {
    page: usize,
    limit: usize,
}

impl Page {
    fn from_query(query: &PaginationQuery) -> Result<Self, ApiError> {
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page < 1 {
            return Err(ApiError::InvalidInput("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ApiError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        Ok(Page { page, limit })
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitTransactionRequest {
    pub from: String,
    pub to: String,
    pub amount: f64,
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub signature: Option<SignatureBody>,
}

/// Hex-encoded detached signature.
#[derive(Debug, Deserialize)]
pub struct SignatureBody {
    pub public_key: String,
    pub signature: String,
}

fn default_gas_price() -> u64 {
    DEFAULT_GAS_PRICE
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

impl SubmitTransactionRequest {
    fn into_transfer(self) -> Result<TransferRequest, ApiError> {
        let amount = amount_from_f64(self.amount)
            .ok_or_else(|| ApiError::InvalidInput(format!("Invalid amount: {}", self.amount)))?;
        let mut request = TransferRequest::new(self.from, self.to, amount)
            .with_data(self.data.unwrap_or_default())
            .with_gas(self.gas_price, self.gas_limit);
        request.nonce = self.nonce;

        if let Some(sig) = self.signature {
            let decode = |field: &str, value: &str| {
                hex::decode(value.trim_start_matches("0x"))
                    .map_err(|e| ApiError::InvalidInput(format!("Invalid {} hex: {}", field, e)))
            };
            request.signature = Some(Signature {
                public_key: decode("public_key", &sig.public_key)?,
                bytes: decode("signature", &sig.signature)?,
            });
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: String,
    pub hash: String,
    pub kind: TxKind,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub fee: f64,
    pub data: String,
    pub nonce: u64,
    pub timestamp: u64,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        TransactionView {
            id: tx.id.clone(),
            hash: tx.hash_str(),
            kind: tx.kind,
            from: tx.sender.clone(),
            to: tx.recipient.clone(),
            amount: to_f64(tx.amount),
            fee: to_f64(tx.fee),
            data: tx.data.clone(),
            nonce: tx.nonce,
            timestamp: tx.timestamp,
            status: tx.status,
            block_number: tx.block_number,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            gas_used: tx.gas_used,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlockView {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
    /// Ids of the embedded transactions, in block order.
    pub transactions: Vec<String>,
    pub size: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub difficulty: u32,
    pub validator: String,
    pub nonce: u64,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        BlockView {
            number: block.index,
            hash: block.hash_str(),
            parent_hash: hex::encode(block.previous_hash),
            timestamp: block.timestamp,
            transactions: block.transactions.iter().map(|tx| tx.id.clone()).collect(),
            size: block.size,
            gas_used: block.gas_used,
            gas_limit: block.gas_limit,
            difficulty: block.difficulty,
            validator: block.validator.clone(),
            nonce: block.nonce,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub address: String,
    pub balance: f64,
    pub nonce: u64,
    pub is_contract: bool,
    pub transaction_count: u64,
    pub last_activity: u64,
    pub tokens: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl AccountView {
    fn public(account: &Account) -> Self {
        AccountView {
            address: account.address.clone(),
            balance: to_f64(account.balance),
            nonce: account.nonce,
            is_contract: account.is_contract,
            transaction_count: account.transaction_count,
            last_activity: account.last_activity,
            tokens: account
                .tokens
                .iter()
                .map(|(symbol, amount)| (symbol.clone(), to_f64(*amount)))
                .collect(),
            private_key: None,
        }
    }

    fn with_private_key(account: &Account) -> Self {
        AccountView {
            private_key: account.private_key.clone(),
            ..Self::public(account)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkStatusView {
    pub block_count: usize,
    pub latest_block: Option<BlockView>,
    pub pending_transactions: usize,
    pub average_block_time: f64,
    pub tps: f64,
    pub account_count: usize,
    pub difficulty: u32,
}

impl From<&NetworkStats> for NetworkStatusView {
    fn from(stats: &NetworkStats) -> Self {
        NetworkStatusView {
            block_count: stats.block_count,
            latest_block: stats.latest_block.as_ref().map(BlockView::from),
            pending_transactions: stats.pending_count,
            average_block_time: stats.avg_block_time,
            tps: stats.tps,
            account_count: stats.account_count,
            difficulty: stats.difficulty,
        }
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

fn to_f64(amount: Amount) -> f64 {
    amount.to_num::<f64>()
}

/// Resolves a block by number when `id` is all digits, otherwise by hash.
fn find_block(ledger: &Ledger, id: &str) -> Result<Block, ApiError> {
    let block = if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        id.parse::<u64>()
            .ok()
            .and_then(|number| ledger.get_block_by_number(number))
    } else {
        ledger.get_block_by_hash(id)
    };
    block.ok_or_else(|| ApiError::NotFound(format!("Block {} not found", id)))
}

fn find_account(ledger: &Ledger, address: &str) -> Result<Account, ApiError> {
    ledger
        .get_account(address)
        .ok_or_else(|| ApiError::NotFound(format!("Account {} not found", address)))
}

/// Runs a ledger write off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ChainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Ledger task failed: {}", e)))?
        .map_err(ApiError::from)
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/blocks", get(get_blocks))
        .route("/blocks/:id", get(get_block))
        .route("/blocks/:id/transactions", get(get_block_transactions))
        .route(
            "/transactions",
            get(get_transactions).post(submit_transaction),
        )
        .route("/transactions/:id", get(get_transaction))
        .route("/accounts", get(get_accounts).post(create_account))
        .route("/accounts/:address", get(get_account))
        .route(
            "/accounts/:address/transactions",
            get(get_account_transactions),
        )
        .route("/accounts/:address/balance", get(get_account_balance))
        .route("/network/status", get(get_network_status))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
        .with_state(state)
}

/// Bind `host:port` and serve until the process exits.
pub async fn run_api_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let app = build_api_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Rustorium API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn get_blocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::from_query(&query)?;
    let blocks: Vec<BlockView> = state
        .ledger
        .blocks_page(page.offset(), page.limit)
        .iter()
        .map(BlockView::from)
        .collect();

    Ok(Json(json!({
        "blocks": blocks,
        "total": state.ledger.block_count(),
        "page": page.page,
        "limit": page.limit
    })))
}

async fn get_block(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let block = find_block(&state.ledger, &id)?;
    Ok(Json(json!({ "block": BlockView::from(&block) })))
}

async fn get_block_transactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::from_query(&query)?;
    let block = find_block(&state.ledger, &id)?;
    let transactions: Vec<TransactionView> = page
        .slice(&block.transactions)
        .iter()
        .map(TransactionView::from)
        .collect();

    Ok(Json(json!({
        "transactions": transactions,
        "total": block.transactions.len(),
        "page": page.page,
        "limit": page.limit
    })))
}

async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::from_query(&query)?;
    let all = state.ledger.all_transactions();
    let transactions: Vec<TransactionView> =
        page.slice(&all).iter().map(TransactionView::from).collect();

    Ok(Json(json!({
        "transactions": transactions,
        "total": all.len(),
        "page": page.page,
        "limit": page.limit
    })))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state
        .ledger
        .get_transaction(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", id)))?;
    Ok(Json(json!({ "transaction": TransactionView::from(&tx) })))
}

async fn submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.into_transfer()?;
    let sender = request.sender.clone();

    let ledger = Arc::clone(&state.ledger);
    let id = blocking(move || ledger.stage_transaction(request)).await?;

    let mut block_number = None;
    if state.auto_mine {
        let ledger = Arc::clone(&state.ledger);
        let mined = blocking(move || ledger.mine_pending(&sender)).await?;
        block_number = mined.map(|block| block.index);
    }

    Ok(Json(json!({
        "success": true,
        "transaction_hash": id,
        "block_number": block_number
    })))
}

async fn get_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::from_query(&query)?;
    let accounts = state.ledger.accounts_by_balance();
    let views: Vec<AccountView> = page
        .slice(&accounts)
        .iter()
        .map(AccountView::public)
        .collect();

    Ok(Json(json!({
        "accounts": views,
        "total": accounts.len(),
        "page": page.page,
        "limit": page.limit
    })))
}

async fn create_account(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let account = blocking(move || ledger.create_account()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "account": AccountView::with_private_key(&account)
        })),
    ))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = find_account(&state.ledger, &address)?;
    Ok(Json(json!({ "account": AccountView::public(&account) })))
}

async fn get_account_transactions(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Page::from_query(&query)?;
    find_account(&state.ledger, &address)?;
    let history = state.ledger.get_account_transactions(&address);
    let transactions: Vec<TransactionView> = page
        .slice(&history)
        .iter()
        .map(TransactionView::from)
        .collect();

    Ok(Json(json!({
        "transactions": transactions,
        "total": history.len(),
        "page": page.page,
        "limit": page.limit
    })))
}

async fn get_account_balance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = find_account(&state.ledger, &address)?;
    Ok(Json(json!({
        "address": address,
        "balance": to_f64(account.balance)
    })))
}

async fn get_network_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(NetworkStatusView::from(&state.ledger.network_stats()))
}
