//! Display names for currency codes

/// Resolves a currency code to a human readable name.
///
/// Returning `None` means no name is known; callers fall back to the code.
pub trait DisplayNameResolver: Send + Sync {
    fn display_name(&self, code: &str) -> Option<String>;
}

/// English names for ISO 4217 currencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsoCurrencyNames;

/// Resolver that knows no names at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeOnlyNames;

impl DisplayNameResolver for CodeOnlyNames {
    fn display_name(&self, _code: &str) -> Option<String> {
        None
    }
}

impl DisplayNameResolver for IsoCurrencyNames {
    fn display_name(&self, code: &str) -> Option<String> {
        let code = code.trim().to_uppercase();
        ISO_4217_NAMES
            .binary_search_by(|(c, _)| (*c).cmp(code.as_str()))
            .ok()
            .map(|index| ISO_4217_NAMES[index].1.to_string())
    }
}

// Sorted by code.
const ISO_4217_NAMES: &[(&str, &str)] = &[
    ("AED", "United Arab Emirates Dirham"),
    ("AFN", "Afghan Afghani"),
    ("ALL", "Albanian Lek"),
    ("AMD", "Armenian Dram"),
    ("ARS", "Argentine Peso"),
    ("AUD", "Australian Dollar"),
    ("AZN", "Azerbaijani Manat"),
    ("BAM", "Bosnia-Herzegovina Convertible Mark"),
    ("BDT", "Bangladeshi Taka"),
    ("BGN", "Bulgarian Lev"),
    ("BHD", "Bahraini Dinar"),
    ("BRL", "Brazilian Real"),
    ("BWP", "Botswanan Pula"),
    ("BYN", "Belarusian Ruble"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CLP", "Chilean Peso"),
    ("CNY", "Chinese Yuan"),
    ("COP", "Colombian Peso"),
    ("CRC", "Costa Rican Colón"),
    ("CZK", "Czech Koruna"),
    ("DKK", "Danish Krone"),
    ("DOP", "Dominican Peso"),
    ("DZD", "Algerian Dinar"),
    ("EGP", "Egyptian Pound"),
    ("ETB", "Ethiopian Birr"),
    ("EUR", "Euro"),
    ("FJD", "Fijian Dollar"),
    ("GBP", "British Pound"),
    ("GEL", "Georgian Lari"),
    ("GHS", "Ghanaian Cedi"),
    ("HKD", "Hong Kong Dollar"),
    ("HUF", "Hungarian Forint"),
    ("IDR", "Indonesian Rupiah"),
    ("ILS", "Israeli New Shekel"),
    ("INR", "Indian Rupee"),
    ("IQD", "Iraqi Dinar"),
    ("IRR", "Iranian Rial"),
    ("ISK", "Icelandic Króna"),
    ("JMD", "Jamaican Dollar"),
    ("JOD", "Jordanian Dinar"),
    ("JPY", "Japanese Yen"),
    ("KES", "Kenyan Shilling"),
    ("KRW", "South Korean Won"),
    ("KWD", "Kuwaiti Dinar"),
    ("KZT", "Kazakhstani Tenge"),
    ("LBP", "Lebanese Pound"),
    ("LKR", "Sri Lankan Rupee"),
    ("MAD", "Moroccan Dirham"),
    ("MXN", "Mexican Peso"),
    ("MYR", "Malaysian Ringgit"),
    ("NGN", "Nigerian Naira"),
    ("NOK", "Norwegian Krone"),
    ("NPR", "Nepalese Rupee"),
    ("NZD", "New Zealand Dollar"),
    ("OMR", "Omani Rial"),
    ("PEN", "Peruvian Sol"),
    ("PHP", "Philippine Peso"),
    ("PKR", "Pakistani Rupee"),
    ("PLN", "Polish Zloty"),
    ("QAR", "Qatari Riyal"),
    ("RON", "Romanian Leu"),
    ("RSD", "Serbian Dinar"),
    ("RUB", "Russian Ruble"),
    ("SAR", "Saudi Riyal"),
    ("SEK", "Swedish Krona"),
    ("SGD", "Singapore Dollar"),
    ("THB", "Thai Baht"),
    ("TND", "Tunisian Dinar"),
    ("TRY", "Turkish Lira"),
    ("TWD", "New Taiwan Dollar"),
    ("TZS", "Tanzanian Shilling"),
    ("UAH", "Ukrainian Hryvnia"),
    ("UGX", "Ugandan Shilling"),
    ("USD", "US Dollar"),
    ("UYU", "Uruguayan Peso"),
    ("UZS", "Uzbekistani Som"),
    ("VND", "Vietnamese Dong"),
    ("XAF", "Central African CFA Franc"),
    ("XAG", "Silver"),
    ("XAU", "Gold"),
    ("XOF", "West African CFA Franc"),
    ("ZAR", "South African Rand"),
    ("ZMW", "Zambian Kwacha"),
];
