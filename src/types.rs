//! Shared types for the KANTOR service.
//!
//! These types form the data model used across all modules.
//! Storage, rate providers, the wallet service and the HTTP layer
//! all depend on them, never on each other's internals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// A currency every user holds a wallet in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Pln,
    Usd,
    Eur,
    Jpy,
    Cny,
    Chf,
    Gbp,
}

impl Currency {
    /// All supported currencies, in wallet display order.
    pub const ALL: &'static [Currency] = &[
        Currency::Pln,
        Currency::Usd,
        Currency::Eur,
        Currency::Jpy,
        Currency::Cny,
        Currency::Chf,
        Currency::Gbp,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Pln => "PLN",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Jpy => "JPY",
            Currency::Cny => "CNY",
            Currency::Chf => "CHF",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parse an ISO code (case-insensitive, surrounding whitespace ignored).
impl std::str::FromStr for Currency {
    type Err = KantorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or_else(|| KantorError::UnknownCurrency(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Users and wallets
// ---------------------------------------------------------------------------

/// A registered account. The password is only ever held as a bcrypt hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub password_hash: String,
}

/// Balance of one currency for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    pub currency: Currency,
    pub amount: Decimal,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Kind of wallet mutation recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryKind {
    Exchange,
    Topup,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Exchange => "EXCHANGE",
            HistoryKind::Topup => "TOPUP",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = KantorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXCHANGE" => Ok(HistoryKind::Exchange),
            "TOPUP" => Ok(HistoryKind::Topup),
            other => Err(KantorError::Storage(format!("unknown history type: {other}"))),
        }
    }
}

/// One append-only history line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// RFC 3339 UTC timestamp.
    pub date: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub details: String,
}

impl HistoryEntry {
    /// Details line for an exchange: `-100 PLN -> +25.00 USD`.
    pub fn exchange_details(amount: Decimal, from: Currency, converted: Decimal, to: Currency) -> String {
        format!("-{} {from} -> +{converted:.2} {to}", amount.normalize())
    }

    /// Details line for a top-up: `+50 EUR`.
    pub fn topup_details(amount: Decimal, currency: Currency) -> String {
        format!("+{} {currency}", amount.normalize())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for KANTOR.
#[derive(Debug, thiserror::Error)]
pub enum KantorError {
    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("unsupported currency: {0}")]
    UnknownCurrency(String),

    #[error("source and target currency must differ")]
    SameCurrency,

    #[error("insufficient funds: need {needed} {currency}")]
    InsufficientFunds { currency: Currency, needed: Decimal },

    #[error("balance limit exceeded for {currency}")]
    BalanceLimit { currency: Currency },

    #[error("rate unavailable for {from} -> {to}")]
    RateUnavailable { from: Currency, to: Currency },

    #[error("rate provider error: {0}")]
    RateProvider(String),

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("missing authorization token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for KantorError {
    fn from(err: sqlx::Error) -> Self {
        KantorError::Storage(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
