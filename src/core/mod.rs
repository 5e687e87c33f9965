//! Core rate and conversion logic

pub mod cancel;
pub mod config;
pub mod converter;
pub mod error;
pub mod log;
pub mod names;
pub mod provider;
pub mod rates;

// Re-export main types for cleaner imports
pub use cancel::CancellationToken;
pub use converter::{Conversion, ConversionResult, ConversionState, Highlight, compute_conversion};
pub use error::RateError;
pub use names::{CodeOnlyNames, DisplayNameResolver, IsoCurrencyNames};
pub use provider::{FetchTicket, RateProvider};
pub use rates::{CurrencyOption, RateSource, RateTable};
