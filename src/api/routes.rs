//! API route handlers.
//!
//! All endpoints speak JSON. State is shared via `Arc<WalletService>`;
//! wallet endpoints require a token resolved by the `AuthUser` extractor.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::{header, request::Parts, StatusCode};
use axum::Json;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::extract_token;
use crate::conversion::parse_amount;
use crate::rates::RateTable;
use crate::types::{Currency, KantorError};
use crate::wallet::{Dashboard, WalletService};

pub type AppState = Arc<WalletService>;

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// Id of the caller, taken from the `Authorization` header.
///
/// Missing header → 401, bad token → 403.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = KantorError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(KantorError::MissingToken)?
            .to_str()
            .map_err(|_| KantorError::InvalidToken)?;

        let token = extract_token(value).ok_or(KantorError::MissingToken)?;
        state.authenticate(token).map(AuthUser)
    }
}

/// `Json<T>` whose rejections go through `KantorError`, so a broken
/// body gets the usual `{ "error": ... }` 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = KantorError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Amounts are kept as raw JSON so numeric strings can be rejected.
#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub amount: Value,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub success: bool,
    pub converted: Decimal,
    pub rate: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /register
pub async fn register(
    State(svc): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Json<MessageResponse>, KantorError> {
    svc.register(&req.email, &req.password).await?;
    Ok(Json(MessageResponse { message: "registered".into() }))
}

/// POST /login
pub async fn login(
    State(svc): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Json<TokenResponse>, KantorError> {
    let token = svc.login(&req.email, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}

/// GET /dashboard
pub async fn dashboard(
    State(svc): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Dashboard>, KantorError> {
    Ok(Json(svc.dashboard(user_id).await?))
}

/// POST /exchange
pub async fn exchange(
    State(svc): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(req): JsonBody<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>, KantorError> {
    let from: Currency = req.from.parse()?;
    let to: Currency = req.to.parse()?;
    let amount = parse_amount(&req.amount)?;

    let receipt = svc.exchange(user_id, from, to, amount).await?;
    Ok(Json(ExchangeResponse {
        success: true,
        converted: receipt.converted,
        rate: receipt.rate,
    }))
}

/// POST /topup
pub async fn top_up(
    State(svc): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(req): JsonBody<TopUpRequest>,
) -> Result<Json<SuccessResponse>, KantorError> {
    let amount = parse_amount(&req.amount)?;
    let currency: Currency = req.currency.parse()?;

    svc.top_up(user_id, currency, amount).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /rates/:base
pub async fn rates(
    State(svc): State<AppState>,
    Path(base): Path<String>,
) -> Result<Json<RateTable>, KantorError> {
    let base: Currency = base.parse()?;
    Ok(Json(svc.rates(base).await?))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
