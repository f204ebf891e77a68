use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Monetary amounts are exact decimals. All balance arithmetic goes through
/// `Decimal`; floats never touch money.
pub type Amount = Decimal;

/// Format an amount as a human-readable currency string with two decimal
/// places. Example: 5000 -> "5000.00", 12.5 -> "12.50"
pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", amount)
}

/// Parse a decimal string into an amount.
/// Example: "50.00", "12.5" and "100" are all accepted.
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    Decimal::from_str(input.trim()).map_err(|_| ParseAmountError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
