use super::ui;
use crate::core::converter::highlights;
use crate::core::{DisplayNameResolver, RateProvider, RateSource, RateTable};
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::sync::Arc;

/// Renders the popular-currency panel for `base`.
pub fn display_highlights(base: &str, table: Option<&RateTable>) -> String {
    let panel = highlights(base, table);
    let title = ui::style_text("Spotlight Rates", ui::StyleType::Title);
    if panel.is_empty() {
        return format!(
            "{title}\n{}",
            ui::style_text(
                "Select currencies to see popular rates",
                ui::StyleType::Subtle
            )
        );
    }

    let mut out = ui::new_styled_table();
    out.set_header(vec![
        ui::header_cell(&format!("1 {base}")),
        ui::header_cell("Rate"),
    ]);
    for item in panel {
        out.add_row(vec![
            Cell::new(item.code),
            ui::number_cell(format!("{:.4}", item.rate)),
        ]);
    }
    format!("{title}\n{out}")
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

    println!(
        "{}",
        display_highlights(&base.trim().to_uppercase(), provider.table())
    );
    Ok(())
}
