//! Line-oriented converter session.
//!
//! A single loop reacts to user commands and to completions of the one rate
//! request allowed in flight. Changing the base cancels the previous request
//! and aborts its task; a completion that still slips through is discarded by
//! [`RateProvider::apply`].

use super::{rates, spotlight, ui};
use crate::core::converter::QUICK_AMOUNTS;
use crate::core::{
    ConversionState, DisplayNameResolver, FetchTicket, RateError, RateProvider, RateSource,
    RateTable,
};
use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const HELP: &str = "\
Commands:
  <number> | amount <number>   set the amount
  preset <50|100|250|500>      use a quick amount
  from <code>                  change the base currency (refetches rates)
  to <code>                    change the target currency
  swap                         swap base and target
  reset                        restore amount 100 and target INR
  convert                      recompute and show the result
  rates                        list every available currency
  spotlight                    show popular rates for the base
  retry                        fetch the rates again
  help                         show this help
  quit                         leave";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Amount(String),
    Preset(String),
    From(String),
    To(String),
    Swap,
    Reset,
    Convert,
    Rates,
    Spotlight,
    Retry,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));

        let require = |what: &str| -> Result<String> {
            if rest.is_empty() {
                Err(anyhow!("Missing {} for `{}`", what, word))
            } else {
                Ok(rest.to_string())
            }
        };

        match word.to_lowercase().as_str() {
            "amount" => Ok(SessionCommand::Amount(rest.to_string())),
            "preset" => Ok(SessionCommand::Preset(require("amount")?)),
            "from" => Ok(SessionCommand::From(require("currency code")?)),
            "to" => Ok(SessionCommand::To(require("currency code")?)),
            "swap" => Ok(SessionCommand::Swap),
            "reset" => Ok(SessionCommand::Reset),
            "convert" => Ok(SessionCommand::Convert),
            "rates" => Ok(SessionCommand::Rates),
            "spotlight" => Ok(SessionCommand::Spotlight),
            "retry" => Ok(SessionCommand::Retry),
            "help" | "?" => Ok(SessionCommand::Help),
            "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
            _ if rest.is_empty() && looks_like_amount(line) => {
                Ok(SessionCommand::Amount(line.to_string()))
            }
            _ => Err(anyhow!("Unknown command: {} (type `help`)", line)),
        }
    }
}

fn looks_like_amount(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
}

/// What the session wants shown after handling an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Show(String),
    Nothing,
    Quit,
}

#[derive(Debug)]
pub struct Completion {
    ticket: FetchTicket,
    result: Result<RateTable, RateError>,
}

pub struct Session {
    source: Arc<dyn RateSource>,
    provider: RateProvider,
    state: ConversionState,
    in_flight: Option<JoinHandle<()>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Session {
    pub fn new(
        source: Arc<dyn RateSource>,
        names: Arc<dyn DisplayNameResolver>,
        state: ConversionState,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Session {
            source,
            provider: RateProvider::new(names),
            state,
            in_flight: None,
            completions_tx,
            completions_rx,
        }
    }

    pub fn state(&self) -> &ConversionState {
        &self.state
    }

    pub fn provider(&self) -> &RateProvider {
        &self.provider
    }

    /// Requests rates for the current base, superseding any outstanding request.
    pub fn fetch(&mut self) {
        let ticket = self.provider.begin_fetch(&self.state.base);
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        debug!(base = %ticket.base(), "Spawning rate request");

        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let result = source.fetch_rates(ticket.base(), ticket.token()).await;
            // The receiver is gone once the session is torn down.
            let _ = tx.send(Completion { ticket, result });
        }));
    }

    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    pub fn on_completion(&mut self, completion: Completion) -> Reply {
        if !self.provider.apply(&completion.ticket, completion.result) {
            return Reply::Nothing;
        }
        self.in_flight = None;

        if let Some(error) = self.provider.error() {
            self.state.convert(None);
            return Reply::Show(ui::error_banner(
                "Error Loading Exchange Rates",
                error,
                "Type `retry` to try again.",
            ));
        }

        self.state.recompute(self.provider.table());
        Reply::Show(self.state.display_as_table())
    }

    pub fn handle(&mut self, command: SessionCommand) -> Reply {
        match command {
            SessionCommand::Amount(text) => {
                self.state.set_amount(&text);
                self.state.recompute(self.provider.table());
                self.view()
            }
            SessionCommand::Preset(preset) => {
                if !self.state.select_preset(&preset) {
                    return Reply::Show(ui::style_text(
                        &format!("Quick amounts: {}", QUICK_AMOUNTS.join(", ")),
                        ui::StyleType::Error,
                    ));
                }
                self.state.recompute(self.provider.table());
                self.view()
            }
            SessionCommand::From(code) => {
                if self.state.set_base(&code) {
                    self.fetch();
                    return self.fetching_notice();
                }
                Reply::Nothing
            }
            SessionCommand::To(code) => {
                self.state.set_target(&code);
                self.state.recompute(self.provider.table());
                self.view()
            }
            SessionCommand::Swap => {
                if self.state.swap() {
                    self.fetch();
                    return self.fetching_notice();
                }
                Reply::Nothing
            }
            SessionCommand::Reset => {
                let before = (self.state.amount_text.clone(), self.state.target.clone());
                self.state.reset();
                if before.0 != self.state.amount_text || before.1 != self.state.target {
                    self.state.recompute(self.provider.table());
                }
                self.view()
            }
            SessionCommand::Convert => {
                if self.provider.is_loading() {
                    return Reply::Show(ui::style_text(
                        "Still fetching exchange rates...",
                        ui::StyleType::Subtle,
                    ));
                }
                self.state.convert(self.provider.table());
                self.view()
            }
            SessionCommand::Rates => {
                let options = self.provider.base_options(&self.state.base);
                Reply::Show(rates::display_options(&self.state.base, &options))
            }
            SessionCommand::Spotlight => Reply::Show(spotlight::display_highlights(
                &self.state.base,
                self.provider.table(),
            )),
            SessionCommand::Retry => {
                self.fetch();
                self.fetching_notice()
            }
            SessionCommand::Help => Reply::Show(HELP.to_string()),
            SessionCommand::Quit => Reply::Quit,
        }
    }

    /// Cancels the outstanding request and drops the rate table.
    pub fn teardown(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        self.provider.teardown();
    }

    fn view(&self) -> Reply {
        match self.provider.error() {
            Some(error) => Reply::Show(format!(
                "{}\n\n{}",
                ui::error_banner(
                    "Error Loading Exchange Rates",
                    error,
                    "Type `retry` to try again."
                ),
                self.state.display_as_table()
            )),
            None => Reply::Show(self.state.display_as_table()),
        }
    }

    fn fetching_notice(&self) -> Reply {
        Reply::Show(ui::style_text(
            &format!(
                "Fetching rates for {} (converting to {})...",
                self.state.base,
                if self.state.target.is_empty() {
                    "N/A"
                } else {
                    self.state.target.as_str()
                }
            ),
            ui::StyleType::Subtle,
        ))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn show(reply: Reply) -> bool {
    match reply {
        Reply::Show(text) => {
            println!("{text}");
            true
        }
        Reply::Nothing => true,
        Reply::Quit => false,
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

pub async fn run(
    source: Arc<dyn RateSource>,
    names: Arc<dyn DisplayNameResolver>,
    state: ConversionState,
) -> Result<()> {
    let mut session = Session::new(source, names, state);

    let pb = ui::new_spinner("Fetching real-time exchange rates...");
    session.fetch();
    let first = session.next_completion().await;
    pb.finish_and_clear();
    if let Some(completion) = first {
        show(session.on_completion(completion));
    }
    println!(
        "{}",
        ui::style_text("Type `help` for commands.", ui::StyleType::Subtle)
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                if !line.trim().is_empty() {
                    let keep_going = match line.parse::<SessionCommand>() {
                        Ok(command) => show(session.handle(command)),
                        Err(e) => {
                            show(Reply::Show(ui::style_text(&e.to_string(), ui::StyleType::Error)))
                        }
                    };
                    if !keep_going {
                        break;
                    }
                }
                prompt()?;
            }
            Some(completion) = session.next_completion() => {
                if let Reply::Show(text) = session.on_completion(completion) {
                    println!("\n{text}");
                    prompt()?;
                }
            }
        }
    }

    session.teardown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationToken, CodeOnlyNames};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Serves canned tables, delaying some bases to simulate slow responses.
    struct FakeSource;

    #[async_trait]
    impl RateSource for FakeSource {
        async fn fetch_rates(
            &self,
            base: &str,
            cancel: &CancellationToken,
        ) -> Result<RateTable, RateError> {
            match base {
                "USD" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    cancel.check_cancelled()?;
                    Ok(RateTable::new("2024-03-01", "USD", [("INR", 83.1), ("EUR", 0.92)]))
                }
                "EUR" => Ok(RateTable::new("2024-03-01", "EUR", [("INR", 90.2), ("USD", 1.08)])),
                "GBP" => Err(RateError::Http { status: 500 }),
                other => Err(RateError::MissingBaseData {
                    base: other.to_string(),
                }),
            }
        }
    }

    fn new_session(base: &str, target: &str) -> Session {
        Session::new(
            Arc::new(FakeSource),
            Arc::new(CodeOnlyNames),
            ConversionState::new(base, target, "100"),
        )
    }

    async fn settle(session: &mut Session) {
        while let Ok(Some(completion)) =
            tokio::time::timeout(Duration::from_millis(400), session.next_completion()).await
        {
            session.on_completion(completion);
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "amount 12.5".parse::<SessionCommand>().unwrap(),
            SessionCommand::Amount("12.5".to_string())
        );
        assert_eq!(
            "250".parse::<SessionCommand>().unwrap(),
            SessionCommand::Amount("250".to_string())
        );
        assert_eq!(
            "amount".parse::<SessionCommand>().unwrap(),
            SessionCommand::Amount(String::new())
        );
        assert_eq!(
            "FROM eur".parse::<SessionCommand>().unwrap(),
            SessionCommand::From("eur".to_string())
        );
        assert_eq!("swap".parse::<SessionCommand>().unwrap(), SessionCommand::Swap);
        assert_eq!("q".parse::<SessionCommand>().unwrap(), SessionCommand::Quit);
        assert!("to".parse::<SessionCommand>().is_err());
        assert!("dance".parse::<SessionCommand>().is_err());
    }

    #[tokio::test]
    async fn test_initial_fetch_converts() {
        let mut session = new_session("USD", "INR");
        session.fetch();
        assert!(session.provider().is_loading());
        settle(&mut session).await;

        assert!(!session.provider().is_loading());
        assert_eq!(session.state().converted_amount, Some(100.0 * 83.1));
        assert_eq!(session.state().effective_rate, Some(83.1));
    }

    #[tokio::test]
    async fn test_base_change_discards_in_flight_result() {
        let mut session = new_session("USD", "INR");
        session.fetch();
        session.handle(SessionCommand::From("EUR".to_string()));
        settle(&mut session).await;

        let table = session.provider().table().expect("rates loaded");
        assert_eq!(table.base, "EUR");
        assert_eq!(session.state().effective_rate, Some(90.2));
        assert!(session.provider().error().is_none());
    }

    #[tokio::test]
    async fn test_swap_refetches_for_new_base() {
        let mut session = new_session("EUR", "USD");
        session.fetch();
        settle(&mut session).await;
        assert_eq!(session.state().effective_rate, Some(1.08));

        session.handle(SessionCommand::Swap);
        assert_eq!(session.state().base, "USD");
        assert_eq!(session.state().target, "EUR");
        assert!(session.provider().is_loading());
        settle(&mut session).await;
        assert_eq!(session.state().effective_rate, Some(0.92));
    }

    #[tokio::test]
    async fn test_fetch_failure_shows_error_and_retry_recovers() {
        let mut session = new_session("GBP", "INR");
        session.fetch();
        let completion = session.next_completion().await.unwrap();
        let reply = session.on_completion(completion);

        let Reply::Show(text) = reply else {
            panic!("expected an error banner");
        };
        assert!(console::strip_ansi_codes(&text).contains("Failed to fetch currency rates (HTTP 500)"));
        assert!(!session.provider().is_loading());
        assert!(session.state().converted_amount.is_none());

        session.handle(SessionCommand::From("EUR".to_string()));
        settle(&mut session).await;
        assert!(session.provider().error().is_none());
        assert_eq!(session.state().effective_rate, Some(90.2));
    }

    #[tokio::test]
    async fn test_amount_and_target_changes_recompute() {
        let mut session = new_session("EUR", "INR");
        session.fetch();
        settle(&mut session).await;

        session.handle(SessionCommand::Amount("2".to_string()));
        assert_eq!(session.state().converted_amount, Some(2.0 * 90.2));

        session.handle(SessionCommand::To("eur".to_string()));
        assert_eq!(session.state().converted_amount, Some(2.0));
        assert_eq!(session.state().effective_rate, Some(1.0));

        session.handle(SessionCommand::Amount("abc".to_string()));
        assert!(session.state().converted_amount.is_none());
        assert!(session.state().amount_error.is_some());

        assert_eq!(
            session.handle(SessionCommand::Preset("500".to_string())),
            session.view()
        );
        assert_eq!(session.state().converted_amount, Some(500.0));
    }

    #[tokio::test]
    async fn test_reset_keeps_base_and_recomputes() {
        let mut session = new_session("EUR", "USD");
        session.fetch();
        settle(&mut session).await;
        session.handle(SessionCommand::Amount("7".to_string()));

        session.handle(SessionCommand::Reset);
        let state = session.state();
        assert_eq!(state.base, "EUR");
        assert_eq!(state.target, "INR");
        assert_eq!(state.amount_text, "100");
        assert_eq!(state.converted_amount, Some(100.0 * 90.2));
        assert_eq!(state.effective_rate, Some(90.2));
        assert!(state.amount_error.is_none());
    }

    #[tokio::test]
    async fn test_reset_without_changes_clears_output() {
        let mut session = new_session("EUR", "INR");
        session.fetch();
        settle(&mut session).await;
        assert!(session.state().converted_amount.is_some());

        session.handle(SessionCommand::Reset);
        assert!(session.state().converted_amount.is_none());
        assert!(session.state().effective_rate.is_none());

        session.handle(SessionCommand::Convert);
        assert_eq!(session.state().converted_amount, Some(100.0 * 90.2));
    }

    #[tokio::test]
    async fn test_panels_hide_previous_base_while_loading() {
        let mut session = new_session("EUR", "INR");
        session.fetch();
        settle(&mut session).await;

        session.handle(SessionCommand::From("USD".to_string()));
        assert!(session.provider().is_loading());

        let Reply::Show(spotlight) = session.handle(SessionCommand::Spotlight) else {
            panic!("expected spotlight output");
        };
        let spotlight = console::strip_ansi_codes(&spotlight).to_string();
        assert!(!spotlight.contains("90.2000"));
        assert!(spotlight.contains("Select currencies to see popular rates"));

        let Reply::Show(rates) = session.handle(SessionCommand::Rates) else {
            panic!("expected rates output");
        };
        let rates = console::strip_ansi_codes(&rates).to_string();
        assert!(!rates.contains("1.0800"));
        assert!(!rates.contains("90.2000"));

        settle(&mut session).await;
        let Reply::Show(spotlight) = session.handle(SessionCommand::Spotlight) else {
            panic!("expected spotlight output");
        };
        assert!(console::strip_ansi_codes(&spotlight).contains("0.9200"));
    }

    #[test]
    fn test_quit() {
        let mut session = new_session("USD", "INR");
        assert_eq!(session.handle(SessionCommand::Quit), Reply::Quit);
    }
}
