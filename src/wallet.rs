//! Wallet service — registration, login, balances, exchange and top-up.
//!
//! Sits between the HTTP layer and storage. Every operation takes
//! already-typed input (a `Currency`, a rounded `Decimal`), so request
//! parsing stays in the API module.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{self, TokenKeys};
use crate::conversion::calculate_exchange;
use crate::rates::{RateProvider, RateTable};
use crate::storage::{Leg, Store};
use crate::types::{Currency, HistoryEntry, HistoryKind, KantorError, Wallet};

/// Snapshot returned by the dashboard endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub wallets: Vec<Wallet>,
    pub history: Vec<HistoryEntry>,
}

/// Outcome of a successful exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeReceipt {
    pub converted: Decimal,
    pub rate: Decimal,
}

pub struct WalletService {
    store: Store,
    rates: Arc<dyn RateProvider>,
    tokens: TokenKeys,
    bcrypt_cost: u32,
}

impl WalletService {
    pub fn new(store: Store, rates: Arc<dyn RateProvider>, tokens: TokenKeys, bcrypt_cost: u32) -> Self {
        Self { store, rates, tokens, bcrypt_cost }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // -- Auth ------------------------------------------------------------

    /// Create an account with empty wallets in every supported currency.
    pub async fn register(&self, email: &str, password: &str) -> Result<i64, KantorError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(KantorError::InvalidRegistration("email and password are required".into()));
        }

        let cost = self.bcrypt_cost;
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
            .await
            .map_err(|e| KantorError::Internal(format!("hashing task failed: {e}")))??;

        let user_id = self.store.create_user(email, &hash).await?;
        info!(user_id, "User registered");
        Ok(user_id)
    }

    /// Check credentials and issue a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, KantorError> {
        let user = self
            .store
            .find_user_by_email(email.trim())
            .await?
            .ok_or(KantorError::InvalidCredentials)?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
            .await
            .map_err(|e| KantorError::Internal(format!("verification task failed: {e}")))?;

        if !valid {
            warn!(user_id = user.id, "Failed login attempt");
            return Err(KantorError::InvalidCredentials);
        }

        info!(user_id = user.id, "User logged in");
        self.tokens.issue(user.id)
    }

    /// Resolve a bearer token to a user id.
    pub fn authenticate(&self, token: &str) -> Result<i64, KantorError> {
        self.tokens.verify(token)
    }

    // -- Wallets ---------------------------------------------------------

    pub async fn dashboard(&self, user_id: i64) -> Result<Dashboard, KantorError> {
        let wallets = self.store.wallets(user_id).await?;
        let history = self.store.history(user_id).await?;
        Ok(Dashboard { wallets, history })
    }

    /// Convert `amount` of `from` into `to` at the provider's current rate.
    ///
    /// Debit, credit and history are applied atomically; on any error no
    /// wallet changes.
    pub async fn exchange(
        &self,
        user_id: i64,
        from: Currency,
        to: Currency,
        amount: Decimal,
    ) -> Result<ExchangeReceipt, KantorError> {
        if from == to {
            return Err(KantorError::SameCurrency);
        }
        if amount <= Decimal::ZERO {
            return Err(KantorError::InvalidAmount);
        }

        let table = self.rates.latest(from).await?;
        let rate = table.rate_for(to).ok_or(KantorError::RateUnavailable { from, to })?;

        let converted = calculate_exchange(amount, rate);
        if converted <= Decimal::ZERO {
            return Err(KantorError::InvalidAmount);
        }

        let details = HistoryEntry::exchange_details(amount, from, converted, to);
        self.store
            .transfer(
                user_id,
                Leg { currency: from, amount },
                Leg { currency: to, amount: converted },
                HistoryKind::Exchange,
                &details,
            )
            .await?;

        info!(user_id, %from, %to, %amount, %converted, %rate, "Exchange executed");
        Ok(ExchangeReceipt { converted, rate })
    }

    /// Credit `amount` of `currency`.
    pub async fn top_up(&self, user_id: i64, currency: Currency, amount: Decimal) -> Result<(), KantorError> {
        if amount <= Decimal::ZERO {
            return Err(KantorError::InvalidAmount);
        }

        let details = HistoryEntry::topup_details(amount, currency);
        self.store
            .credit(user_id, Leg { currency, amount }, HistoryKind::Topup, &details)
            .await?;

        info!(user_id, %currency, %amount, "Wallet topped up");
        Ok(())
    }

    /// Current rate table for `base`, straight from the provider.
    pub async fn rates(&self, base: Currency) -> Result<RateTable, KantorError> {
        self.rates.latest(base).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::MockRateProvider;
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use std::collections::BTreeMap;
    use tokio_test::{assert_err, assert_ok};

    fn pln_table() -> RateTable {
        let mut rates = BTreeMap::new();
        rates.insert("PLN".to_string(), dec!(1));
        rates.insert("USD".to_string(), dec!(0.25));
        rates.insert("EUR".to_string(), dec!(0.2345));
        RateTable { base: Currency::Pln, rates }
    }

    async fn service(rates: MockRateProvider) -> WalletService {
        let store = Store::in_memory().await.unwrap();
        let tokens = TokenKeys::new(&SecretString::new("wallet-test".to_string()), 3600);
        WalletService::new(store, Arc::new(rates), tokens, 4)
    }

    fn pln_rates() -> MockRateProvider {
        let mut mock = MockRateProvider::new();
        mock.expect_latest().returning(|_| Ok(pln_table()));
        mock
    }

    async fn funded_user(svc: &WalletService, pln: Decimal) -> i64 {
        let id = svc.register("jan@example.com", "password123").await.unwrap();
        svc.top_up(id, Currency::Pln, pln).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_register_once() {
        let svc = service(MockRateProvider::new()).await;
        assert_ok!(svc.register("new@example.com", "password123").await);
        let err = svc.register("new@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, KantorError::EmailTaken));
    }

    #[tokio::test]
    async fn test_register_requires_credentials() {
        let svc = service(MockRateProvider::new()).await;
        assert!(matches!(
            svc.register("  ", "password123").await,
            Err(KantorError::InvalidRegistration(_))
        ));
        assert!(matches!(
            svc.register("a@example.com", "").await,
            Err(KantorError::InvalidRegistration(_))
        ));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let svc = service(MockRateProvider::new()).await;
        let id = svc.register("jan@example.com", "password123").await.unwrap();
        let token = svc.login("jan@example.com", "password123").await.unwrap();
        assert_eq!(svc.authenticate(&token).unwrap(), id);
    }

    #[tokio::test]
    async fn test_login_wrong_password_or_unknown_email() {
        let svc = service(MockRateProvider::new()).await;
        svc.register("jan@example.com", "password123").await.unwrap();
        assert!(matches!(
            svc.login("jan@example.com", "nope").await,
            Err(KantorError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("ghost@example.com", "password123").await,
            Err(KantorError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_exchange_moves_funds_at_rate() {
        let svc = service(pln_rates()).await;
        let id = funded_user(&svc, dec!(100)).await;

        let receipt = svc.exchange(id, Currency::Pln, Currency::Usd, dec!(40)).await.unwrap();
        assert_eq!(receipt.converted, dec!(10));
        assert_eq!(receipt.rate, dec!(0.25));

        let store = svc.store();
        assert_eq!(store.balance(id, Currency::Pln).await.unwrap(), dec!(60));
        assert_eq!(store.balance(id, Currency::Usd).await.unwrap(), dec!(10));

        let dash = svc.dashboard(id).await.unwrap();
        assert_eq!(dash.history.len(), 2);
        assert_eq!(dash.history[0].kind, HistoryKind::Exchange);
        assert_eq!(dash.history[0].details, "-40 PLN -> +10.00 USD");
    }

    #[tokio::test]
    async fn test_exchange_rounds_converted_amount() {
        let svc = service(pln_rates()).await;
        let id = funded_user(&svc, dec!(100)).await;

        let receipt = svc.exchange(id, Currency::Pln, Currency::Eur, dec!(10)).await.unwrap();
        assert_eq!(receipt.converted, dec!(2.35));
    }

    #[tokio::test]
    async fn test_exchange_insufficient_funds_leaves_wallets() {
        let svc = service(pln_rates()).await;
        let id = funded_user(&svc, dec!(50)).await;

        let err = svc.exchange(id, Currency::Pln, Currency::Usd, dec!(50.01)).await.unwrap_err();
        assert!(matches!(err, KantorError::InsufficientFunds { .. }));

        let store = svc.store();
        assert_eq!(store.balance(id, Currency::Pln).await.unwrap(), dec!(50));
        assert_eq!(store.balance(id, Currency::Usd).await.unwrap(), Decimal::ZERO);
        assert_eq!(store.history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exchange_missing_rate() {
        let svc = service(pln_rates()).await;
        let id = funded_user(&svc, dec!(50)).await;

        let err = svc.exchange(id, Currency::Pln, Currency::Jpy, dec!(10)).await.unwrap_err();
        assert!(matches!(err, KantorError::RateUnavailable { from: Currency::Pln, to: Currency::Jpy }));
    }

    #[tokio::test]
    async fn test_exchange_provider_failure() {
        let mut mock = MockRateProvider::new();
        mock.expect_latest()
            .returning(|_| Err(KantorError::RateProvider("connection refused".into())));
        let svc = service(mock).await;
        let id = funded_user(&svc, dec!(50)).await;

        let err = svc.exchange(id, Currency::Pln, Currency::Usd, dec!(10)).await.unwrap_err();
        assert!(matches!(err, KantorError::RateProvider(_)));
        assert_eq!(svc.store().balance(id, Currency::Pln).await.unwrap(), dec!(50));
    }

    #[tokio::test]
    async fn test_exchange_same_currency_skips_provider() {
        let mut mock = MockRateProvider::new();
        mock.expect_latest().never();
        let svc = service(mock).await;
        let id = funded_user(&svc, dec!(50)).await;

        assert_err!(svc.exchange(id, Currency::Pln, Currency::Pln, dec!(10)).await);
    }

    #[tokio::test]
    async fn test_top_up_rejects_non_positive() {
        let svc = service(MockRateProvider::new()).await;
        let id = svc.register("jan@example.com", "password123").await.unwrap();

        assert!(matches!(svc.top_up(id, Currency::Usd, dec!(0)).await, Err(KantorError::InvalidAmount)));
        assert!(matches!(svc.top_up(id, Currency::Usd, dec!(-5)).await, Err(KantorError::InvalidAmount)));
        assert!(svc.dashboard(id).await.unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn test_top_up_credits_and_logs() {
        let svc = service(MockRateProvider::new()).await;
        let id = svc.register("jan@example.com", "password123").await.unwrap();
        svc.top_up(id, Currency::Chf, dec!(19.99)).await.unwrap();

        let dash = svc.dashboard(id).await.unwrap();
        let chf = dash.wallets.iter().find(|w| w.currency == Currency::Chf).unwrap();
        assert_eq!(chf.amount, dec!(19.99));
        assert_eq!(dash.history[0].details, "+19.99 CHF");
    }

    #[tokio::test]
    async fn test_rates_passthrough() {
        let svc = service(pln_rates()).await;
        let table = svc.rates(Currency::Pln).await.unwrap();
        assert_eq!(table.rate_for(Currency::Usd), Some(dec!(0.25)));
    }
}
