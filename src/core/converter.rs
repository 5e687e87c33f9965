//! Conversion rule and the state of a conversion form.

use super::rates::RateTable;

pub const DEFAULT_BASE: &str = "USD";
pub const DEFAULT_TARGET: &str = "INR";
pub const DEFAULT_AMOUNT: &str = "100";
pub const QUICK_AMOUNTS: [&str; 4] = ["50", "100", "250", "500"];
pub const HIGHLIGHTED_CURRENCIES: [&str; 6] = ["EUR", "GBP", "INR", "JPY", "CAD", "AUD"];
pub const AMOUNT_ERROR: &str = "Enter an amount greater than 0";

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub converted_amount: f64,
    pub effective_rate: f64,
    pub as_of: String,
}

impl Conversion {
    /// Units of base per one unit of target.
    pub fn reverse_rate(&self) -> Option<f64> {
        (self.effective_rate != 0.0).then(|| 1.0 / self.effective_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionResult {
    pub conversion: Option<Conversion>,
    pub amount_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub code: &'static str,
    pub rate: f64,
}

/// Parses user-entered amount text.
///
/// `Ok(None)` means nothing was entered yet, `Err` carries the message to show
/// next to the field.
pub fn parse_amount(amount_text: &str) -> Result<Option<f64>, String> {
    let text = amount_text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(Some(value)),
        _ => Err(AMOUNT_ERROR.to_string()),
    }
}

/// Computes the conversion of `amount_text` from `base` to `target` using `table`.
///
/// Converting a currency to itself always yields the amount at rate 1, whatever
/// the table holds. A table for a different base, or one lacking `target`, gives
/// no conversion and no error.
pub fn compute_conversion(
    amount_text: &str,
    base: &str,
    target: &str,
    table: Option<&RateTable>,
) -> ConversionResult {
    let amount = match parse_amount(amount_text) {
        Ok(Some(amount)) => amount,
        Ok(None) => return ConversionResult::default(),
        Err(message) => {
            return ConversionResult {
                conversion: None,
                amount_error: Some(message),
            };
        }
    };

    let target = target.trim();
    let Some(table) = table else {
        return ConversionResult::default();
    };
    if target.is_empty() {
        return ConversionResult::default();
    }

    if target.eq_ignore_ascii_case(base.trim()) {
        return ConversionResult {
            conversion: Some(Conversion {
                converted_amount: amount,
                effective_rate: 1.0,
                as_of: table.as_of.clone(),
            }),
            amount_error: None,
        };
    }

    if !table.base.eq_ignore_ascii_case(base.trim()) {
        return ConversionResult::default();
    }

    let conversion = table.rate(target).map(|rate| Conversion {
        converted_amount: amount * rate,
        effective_rate: rate,
        as_of: table.as_of.clone(),
    });

    ConversionResult {
        conversion,
        amount_error: None,
    }
}

/// Rates of the highlighted currencies per unit of `base`, skipping the base
/// itself and any currency the table has no rate for. A table fetched for a
/// different base yields nothing.
pub fn highlights(base: &str, table: Option<&RateTable>) -> Vec<Highlight> {
    let Some(table) = table.filter(|t| t.base.eq_ignore_ascii_case(base.trim())) else {
        return Vec::new();
    };
    HIGHLIGHTED_CURRENCIES
        .iter()
        .copied()
        .filter(|code| !code.eq_ignore_ascii_case(base.trim()))
        .filter_map(|code| table.rate(code).map(|rate| Highlight { code, rate }))
        .collect()
}

/// User-editable conversion form plus its derived output.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionState {
    pub amount_text: String,
    pub base: String,
    pub target: String,
    pub converted_amount: Option<f64>,
    pub effective_rate: Option<f64>,
    pub as_of: String,
    pub amount_error: Option<String>,
}

impl Default for ConversionState {
    fn default() -> Self {
        ConversionState::new(DEFAULT_BASE, DEFAULT_TARGET, DEFAULT_AMOUNT)
    }
}

impl ConversionState {
    pub fn new(base: &str, target: &str, amount_text: &str) -> Self {
        ConversionState {
            amount_text: amount_text.to_string(),
            base: base.trim().to_uppercase(),
            target: target.trim().to_uppercase(),
            converted_amount: None,
            effective_rate: None,
            as_of: String::new(),
            amount_error: None,
        }
    }

    pub fn reverse_rate(&self) -> Option<f64> {
        self.effective_rate
            .filter(|rate| *rate != 0.0)
            .map(|rate| 1.0 / rate)
    }

    /// Stores the raw text and validates it straight away.
    pub fn set_amount(&mut self, amount_text: &str) {
        self.amount_text = amount_text.to_string();
        self.validate_amount();
    }

    /// Applies one of `QUICK_AMOUNTS`. Returns `false` for anything else.
    pub fn select_preset(&mut self, preset: &str) -> bool {
        let Some(preset) = QUICK_AMOUNTS.iter().find(|p| **p == preset.trim()) else {
            return false;
        };
        self.set_amount(preset);
        true
    }

    /// Returns `true` when the base actually changed and rates must be refetched.
    pub fn set_base(&mut self, base: &str) -> bool {
        let base = base.trim().to_uppercase();
        if base.is_empty() || base == self.base {
            return false;
        }
        self.base = base;
        true
    }

    pub fn set_target(&mut self, target: &str) {
        self.target = target.trim().to_uppercase();
    }

    /// Exchanges base and target. Returns `true` when the base changed.
    pub fn swap(&mut self) -> bool {
        if self.target.is_empty() {
            return false;
        }
        std::mem::swap(&mut self.base, &mut self.target);
        self.base != self.target
    }

    /// Restores amount and target to their defaults and clears derived output.
    /// The base currency is kept.
    pub fn reset(&mut self) {
        self.amount_text = DEFAULT_AMOUNT.to_string();
        self.target = DEFAULT_TARGET.to_string();
        self.clear_conversion();
        self.as_of.clear();
        self.amount_error = None;
    }

    /// Re-derives the conversion when amount, target and table are all present.
    pub fn recompute(&mut self, table: Option<&RateTable>) {
        if self.amount_text.trim().is_empty() || self.target.is_empty() || table.is_none() {
            return;
        }
        self.convert(table);
    }

    /// Unconditionally applies the conversion rule to the current inputs.
    pub fn convert(&mut self, table: Option<&RateTable>) {
        let result = compute_conversion(&self.amount_text, &self.base, &self.target, table);
        self.amount_error = result.amount_error;
        match result.conversion {
            Some(conversion) => {
                self.converted_amount = Some(conversion.converted_amount);
                self.effective_rate = Some(conversion.effective_rate);
                self.as_of = conversion.as_of;
            }
            None => self.clear_conversion(),
        }
    }

    fn validate_amount(&mut self) {
        self.amount_error = parse_amount(&self.amount_text).err();
    }

    fn clear_conversion(&mut self) {
        self.converted_amount = None;
        self.effective_rate = None;
    }
}
