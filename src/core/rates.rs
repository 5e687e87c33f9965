//! Rate tables and the abstraction over where they come from

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cancel::CancellationToken;
use super::error::RateError;

/// Units of each currency per one unit of `base`, as published on `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub as_of: String,
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

impl RateTable {
    /// Builds a table, uppercasing the base and every currency code.
    ///
    /// Entries with an empty code or a rate that is not a positive finite
    /// number are dropped.
    pub fn new<I, K>(as_of: impl Into<String>, base: &str, rates: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let rates = rates
            .into_iter()
            .filter_map(|(code, rate)| {
                let code = code.as_ref().trim().to_uppercase();
                (!code.is_empty() && rate.is_finite() && rate > 0.0).then_some((code, rate))
            })
            .collect();

        RateTable {
            as_of: as_of.into(),
            base: base.trim().to_uppercase(),
            rates,
        }
    }

    /// Case-insensitive lookup of the rate for `code`.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.trim().to_uppercase()).copied()
    }

    pub fn as_of_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.as_of, "%Y-%m-%d").ok()
    }
}

/// A currency the user can pick, with its rate relative to the current base.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyOption {
    pub code: String,
    pub name: String,
    pub rate: f64,
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches the rate table for `base`, giving up with `RateError::Cancelled`
    /// once `cancel` fires.
    async fn fetch_rates(
        &self,
        base: &str,
        cancel: &CancellationToken,
    ) -> Result<RateTable, RateError>;
}
