use super::ui;
use crate::core::{CurrencyOption, DisplayNameResolver, RateProvider, RateSource};
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

/// Renders the selectable currencies with their rate per unit of `base`.
pub fn display_options(base: &str, options: &[CurrencyOption]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Per 1 {base}")),
    ]);

    for option in options {
        table.add_row(vec![
            Cell::new(&option.code),
            Cell::new(&option.name),
            ui::number_cell(format!("{:.4}", option.rate)),
        ]);
    }

    table.to_string()
}

pub async fn run(
    source: &dyn RateSource,
    names: Arc<dyn DisplayNameResolver>,
    base: &str,
) -> Result<()> {
    let mut provider = RateProvider::new(names);

    let pb = ui::new_spinner("Fetching real-time exchange rates...");
    provider.load(source, base).await;
    pb.finish_and_clear();

    if let Some(error) = provider.error() {
        bail!("Error loading exchange rates: {error}");
    }

    let base = base.trim().to_uppercase();
    let options = provider.currency_options();
    println!("{}", display_options(&base, &options));
    if let Some(table) = provider.table() {
        println!(
            "\n{} currencies, {}",
            ui::style_text(&options.len().to_string(), ui::StyleType::Label),
            ui::style_text(
                &format!("updated {}", ui::format_long_date(&table.as_of)),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
