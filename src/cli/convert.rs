use super::{spotlight, ui};
use crate::core::converter::parse_amount;
use crate::core::{ConversionState, DisplayNameResolver, RateProvider, RateSource};
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

impl ConversionState {
    /// Renders the result panel: source amount, converted amount and rates.
    pub fn display_as_table(&self) -> String {
        let base = &self.base;
        let target = &self.target;

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Conversion Result"),
            ui::header_cell(""),
        ]);

        let source_amount = match parse_amount(&self.amount_text) {
            Ok(Some(amount)) => format!("{} {base}", ui::format_number(amount, 0, 2)),
            _ => format!("0.00 {base}"),
        };
        table.add_row(vec![Cell::new("You convert"), ui::number_cell(source_amount)]);

        let receive = if target.is_empty() {
            ui::format_optional_cell(None::<f64>, |_| String::new())
        } else {
            ui::format_optional_cell(self.converted_amount, |v| {
                format!("{} {target}", ui::format_number(v, 2, 2))
            })
        };
        table.add_row(vec![Cell::new("You receive"), receive]);

        if let Some(rate) = self.effective_rate {
            table.add_row(vec![
                Cell::new("Exchange Rate"),
                ui::number_cell(format!("1 {base} = {rate:.4} {target}")),
            ]);
        }
        if let Some(reverse) = self.reverse_rate() {
            table.add_row(vec![
                Cell::new("Reverse Rate"),
                ui::number_cell(format!("1 {target} = {reverse:.4} {base}")),
            ]);
        }

        let mut output = table.to_string();
        if let Some(error) = &self.amount_error {
            output.push_str(&format!("\n{}", ui::style_text(error, ui::StyleType::Error)));
        }
        if !self.as_of.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Rates updated on {}", ui::format_long_date(&self.as_of)),
                    ui::StyleType::Subtle
                )
            ));
        }
        output
    }
}

/// Fetches rates for `base` and renders the conversion of `amount` into
/// `target`, followed by the spotlight panel.
pub async fn convert(
    source: &dyn RateSource,
    names: Arc<dyn DisplayNameResolver>,
    amount: &str,
    base: &str,
    target: &str,
) -> Result<String> {
    let mut state = ConversionState::new(base, target, amount);
    let mut provider = RateProvider::new(names);

    let pb = ui::new_spinner("Fetching real-time exchange rates...");
    provider.load(source, &state.base).await;
    pb.finish_and_clear();

    if let Some(error) = provider.error() {
        bail!("Error loading exchange rates: {error}");
    }

    state.convert(provider.table());
    if let Some(error) = &state.amount_error {
        bail!("{error}");
    }

    let mut output = format!(
        "{}\n\n{}",
        ui::style_text(
            &format!("{} → {}", state.base, state.target),
            ui::StyleType::Title
        ),
        state.display_as_table()
    );
    if state.converted_amount.is_none() && !state.amount_text.trim().is_empty() {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!("No rate available for {}", state.target),
                ui::StyleType::Subtle
            )
        ));
    }

    output.push_str(&format!(
        "\n\n{}",
        spotlight::display_highlights(&state.base, provider.table())
    ));
    Ok(output)
}

pub async fn run(
    source: &dyn RateSource,
    names: Arc<dyn DisplayNameResolver>,
    amount: &str,
    base: &str,
    target: &str,
) -> Result<()> {
    println!("{}", convert(source, names, amount, base, target).await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RateTable;

    fn plain(text: &str) -> String {
        console::strip_ansi_codes(text).to_string()
    }

    #[test]
    fn test_display_converted_result() {
        let table = RateTable::new("2024-03-01", "USD", [("INR", 83.1)]);
        let mut state = ConversionState::default();
        state.convert(Some(&table));

        let output = plain(&state.display_as_table());
        assert!(output.contains("100 USD"));
        assert!(output.contains("8,310.00 INR"));
        assert!(output.contains("1 USD = 83.1000 INR"));
        assert!(output.contains("1 INR = 0.0120 USD"));
        assert!(output.contains("Rates updated on Friday, March 1, 2024"));
    }

    #[test]
    fn test_display_without_conversion() {
        let mut state = ConversionState::default();
        state.set_amount("-5");

        let output = plain(&state.display_as_table());
        assert!(output.contains("0.00 USD"));
        assert!(output.contains("N/A"));
        assert!(!output.contains("Exchange Rate"));
        assert!(output.contains("Enter an amount greater than 0"));
    }
}
