//! Exchange-rate providers.
//!
//! Defines the `RateProvider` trait and the exchangerate-api.com
//! implementation. Rates are fetched on every call; nothing is cached.

pub mod exchangerate_api;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{Currency, KantorError};

/// Latest rates quoted against `base`: one unit of `base` buys
/// `rates[code]` units of `code`.
#[derive(Debug, Clone, Serialize)]
pub struct RateTable {
    pub base: Currency,
    pub rates: BTreeMap<String, Decimal>,
}

impl RateTable {
    /// Rate for `target`, if the provider quoted a positive one.
    pub fn rate_for(&self, target: Currency) -> Option<Decimal> {
        self.rates
            .get(target.code())
            .copied()
            .filter(|r| *r > Decimal::ZERO)
    }
}

/// Abstraction over market-rate sources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the current rate table for `base`.
    async fn latest(&self, base: Currency) -> Result<RateTable, KantorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn table() -> RateTable {
        let mut rates = BTreeMap::new();
        rates.insert("USD".to_string(), dec!(0.25));
        rates.insert("EUR".to_string(), dec!(0));
        rates.insert("XAU".to_string(), dec!(0.0001));
        RateTable { base: Currency::Pln, rates }
    }

    #[test]
    fn test_rate_for_present() {
        assert_eq!(table().rate_for(Currency::Usd), Some(dec!(0.25)));
    }

    #[test]
    fn test_rate_for_missing() {
        assert_eq!(table().rate_for(Currency::Gbp), None);
    }

    #[test]
    fn test_rate_for_ignores_non_positive() {
        assert_eq!(table().rate_for(Currency::Eur), None);
    }
}
