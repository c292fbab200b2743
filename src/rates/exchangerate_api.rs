//! exchangerate-api.com client.
//!
//! API: `GET https://api.exchangerate-api.com/v4/latest/{BASE}`
//! Auth: none for the v4 open endpoint.
//! Response: `{ "base": "PLN", "date": "...", "rates": { "USD": 0.25, ... } }`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RateProvider, RateTable};
use crate::types::{Currency, KantorError};

/// Default endpoint prefix; the base currency code is appended.
pub const DEFAULT_BASE_URL: &str = "https://api.exchangerate-api.com/v4/latest";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: BTreeMap<String, Decimal>,
}

pub struct ExchangeRateApiClient {
    http: Client,
    base_url: String,
}

impl ExchangeRateApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("KANTOR/0.1.0")
            .build()
            .context("Failed to build exchange-rate HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn latest_url(&self, base: Currency) -> String {
        format!("{}/{}", self.base_url, base.code())
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiClient {
    async fn latest(&self, base: Currency) -> Result<RateTable, KantorError> {
        let url = self.latest_url(base);
        debug!(url = %url, "Fetching exchange rates");

        let resp = self.http.get(&url).send().await.map_err(|e| {
            warn!(error = %e, base = %base, "Rate request failed");
            KantorError::RateProvider(e.to_string())
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, base = %base, "Rate API returned an error status");
            return Err(KantorError::RateProvider(format!("upstream status {status}")));
        }

        let body: LatestResponse = resp
            .json()
            .await
            .map_err(|e| KantorError::RateProvider(format!("malformed rate response: {e}")))?;

        debug!(base = %base, quoted = body.rates.len(), "Rates fetched");
        Ok(RateTable { base, rates: body.rates })
    }
}
