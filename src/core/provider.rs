//! Rate acquisition state: the current table, loading and error flags, and
//! the single request allowed to update them.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::cancel::CancellationToken;
use super::error::RateError;
use super::names::DisplayNameResolver;
use super::rates::{CurrencyOption, RateSource, RateTable};

/// Identifies one issued request. Only the ticket of the latest request can
/// apply its result.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    base: String,
    token: CancellationToken,
}

impl FetchTicket {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct RateProvider {
    names: Arc<dyn DisplayNameResolver>,
    table: Option<RateTable>,
    loading: bool,
    error: Option<String>,
    in_flight: Option<CancellationToken>,
}

impl RateProvider {
    pub fn new(names: Arc<dyn DisplayNameResolver>) -> Self {
        RateProvider {
            names,
            table: None,
            loading: false,
            error: None,
            in_flight: None,
        }
    }

    pub fn table(&self) -> Option<&RateTable> {
        self.table.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Starts a request for `base`, cancelling whichever request was in flight.
    pub fn begin_fetch(&mut self, base: &str) -> FetchTicket {
        if let Some(previous) = self.in_flight.take() {
            debug!("Cancelling in-flight rate request");
            previous.cancel();
        }

        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        self.loading = true;
        self.error = None;

        FetchTicket {
            base: base.trim().to_uppercase(),
            token,
        }
    }

    /// Applies the outcome of the request identified by `ticket`.
    ///
    /// Returns `false` when the result was discarded because the request was
    /// superseded or cancelled; state is left untouched in that case.
    pub fn apply(&mut self, ticket: &FetchTicket, result: Result<RateTable, RateError>) -> bool {
        if ticket.is_stale() {
            warn!(base = %ticket.base, "Discarding result of superseded rate request");
            return false;
        }

        match result {
            Ok(table) => {
                debug!(base = %table.base, count = table.rates.len(), "Rate table updated");
                self.table = Some(table);
                self.error = None;
            }
            Err(e) if e.is_cancelled() => return false,
            Err(e) => {
                debug!(base = %ticket.base, error = %e, "Rate request failed");
                self.table = None;
                self.error = Some(e.to_string());
            }
        }

        self.loading = false;
        self.in_flight = None;
        true
    }

    /// Issues a request for `base` and applies its result.
    #[instrument(name = "RateProviderLoad", skip(self, source))]
    pub async fn load(&mut self, source: &dyn RateSource, base: &str) -> bool {
        let ticket = self.begin_fetch(base);
        let result = source.fetch_rates(ticket.base(), ticket.token()).await;
        self.apply(&ticket, result)
    }

    /// Cancels any in-flight request and forgets the current table.
    pub fn teardown(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.table = None;
        self.loading = false;
    }

    /// All currencies of the current table, sorted by code.
    pub fn currency_options(&self) -> Vec<CurrencyOption> {
        let Some(table) = &self.table else {
            return Vec::new();
        };

        // BTreeMap iteration is already ordered by code.
        table
            .rates
            .iter()
            .map(|(code, rate)| CurrencyOption {
                code: code.clone(),
                name: self.display_name(code),
                rate: *rate,
            })
            .collect()
    }

    /// The current table, if it was fetched for `base`.
    pub fn table_for(&self, base: &str) -> Option<&RateTable> {
        self.table
            .as_ref()
            .filter(|table| table.base.eq_ignore_ascii_case(base.trim()))
    }

    /// Options for picking the base currency; always contains `base` itself.
    /// Rates of a table fetched for another base are not offered.
    pub fn base_options(&self, base: &str) -> Vec<CurrencyOption> {
        let base = base.trim().to_uppercase();
        let mut options = if self.table_for(&base).is_some() {
            self.currency_options()
        } else {
            Vec::new()
        };
        if !options.iter().any(|option| option.code == base) {
            options.insert(
                0,
                CurrencyOption {
                    name: self.display_name(&base),
                    code: base,
                    rate: 1.0,
                },
            );
        }
        options
    }

    pub fn rate_for(&self, code: &str) -> Option<f64> {
        self.table.as_ref().and_then(|table| table.rate(code))
    }

    fn display_name(&self, code: &str) -> String {
        self.names
            .display_name(code)
            .unwrap_or_else(|| code.to_string())
    }
}

impl Drop for RateProvider {
    fn drop(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }
}
