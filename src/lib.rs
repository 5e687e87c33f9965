pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{ConversionState, DisplayNameResolver, IsoCurrencyNames, RateSource};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands that talk to the rate service. Currency and amount arguments left
/// as `None` fall back to the configured defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert {
        amount: Option<String>,
        from: Option<String>,
        to: Option<String>,
    },
    Rates {
        from: Option<String>,
    },
    Spotlight {
        from: Option<String>,
    },
    Interactive {
        from: Option<String>,
        to: Option<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxconv starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let source: Arc<dyn RateSource> = Arc::new(providers::CurrencyApiProvider::new(
        config.currency_api_url(),
    )?);
    let names: Arc<dyn DisplayNameResolver> = Arc::new(IsoCurrencyNames);

    let base_or_default = |from: &Option<String>| {
        from.clone()
            .unwrap_or_else(|| config.base_currency.clone())
    };

    match command {
        AppCommand::Convert { amount, from, to } => {
            let amount = amount.unwrap_or_else(|| config.amount.clone());
            let to = to.unwrap_or_else(|| config.target_currency.clone());
            cli::convert::run(source.as_ref(), names, &amount, &base_or_default(&from), &to)
                .await
        }
        AppCommand::Rates { from } => {
            cli::rates::run(source.as_ref(), names, &base_or_default(&from)).await
        }
        AppCommand::Spotlight { from } => {
            cli::spotlight::run(source.as_ref(), names, &base_or_default(&from)).await
        }
        AppCommand::Interactive { from, to } => {
            let to = to.unwrap_or_else(|| config.target_currency.clone());
            let state = ConversionState::new(&base_or_default(&from), &to, &config.amount);
            cli::interactive::run(source, names, state).await
        }
    }
}
