use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A quantity of some commodity, as printed by ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub commodity: String,
    pub value: f64,
}

impl Amount {
    pub fn new(commodity: impl Into<String>, value: f64) -> Self {
        Amount {
            commodity: commodity.into(),
            value,
        }
    }

    pub fn zero(commodity: impl Into<String>) -> Self {
        Amount::new(commodity, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commodity.is_empty() {
            write!(f, "{}", self.value)
        } else if needs_quotes(&self.commodity) {
            write!(f, "\"{}\" {}", self.commodity, self.value)
        } else {
            write!(f, "{} {}", self.commodity, self.value)
        }
    }
}

/// Ledger only reads a bare commodity when it has no digits, whitespace or
/// operator characters.
fn needs_quotes(commodity: &str) -> bool {
    commodity
        .chars()
        .any(|c| c.is_ascii_digit() || c.is_whitespace() || ".,;:?!-+*/^&|=<>{}[]()@\"".contains(c))
}

/// Grouping and decimal separators used by the ledger binary's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    pub grouping_separator: char,
    pub decimal_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            grouping_separator: ',',
            decimal_separator: '.',
        }
    }
}

impl NumberFormat {
    pub fn parse(&self, s: &str) -> Option<f64> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != self.grouping_separator)
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect();
        Decimal::from_str(&normalized).ok()?.to_f64()
    }
}

fn re_amount() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(
            r#"^\s*(?:(?P<pre>"[^"]*"|[^\s\d.,"-]+)\s*)?(?P<num>[-0-9.,]+)\s*(?:(?P<post>"[^"]*"|[^\s\d.,"-]+)\s*)?$"#,
        )
        .expect("invalid regex")
    })
}

/// Parses `"<commodity>? <number>"` tokens into [`Amount`]s.
#[derive(Debug, Clone)]
pub struct AmountParser {
    default_commodity: String,
    number_format: NumberFormat,
}

impl AmountParser {
    pub fn new(default_commodity: impl Into<String>, number_format: NumberFormat) -> Self {
        Self {
            default_commodity: default_commodity.into(),
            number_format,
        }
    }

    pub fn default_commodity(&self) -> &str {
        &self.default_commodity
    }

    pub fn parse(&self, token: &str) -> Result<Amount, LedgerError> {
        let malformed = || LedgerError::MalformedAmount(token.to_string());

        let caps = re_amount().captures(token).ok_or_else(malformed)?;
        let commodity = caps
            .name("pre")
            .or_else(|| caps.name("post"))
            .map(|m| m.as_str().trim_matches('"').to_string())
            .unwrap_or_else(|| self.default_commodity.clone());
        let value = caps
            .name("num")
            .and_then(|m| self.number_format.parse(m.as_str()))
            .ok_or_else(malformed)?;

        Ok(Amount { commodity, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> AmountParser {
        AmountParser::new("INR", NumberFormat::default())
    }

    #[test]
    fn parses_prefixed_commodity() {
        let amount = parser().parse("USD 12.50").unwrap();
        assert_eq!(amount, Amount::new("USD", 12.5));
    }

    #[test]
    fn parses_symbol_without_space() {
        assert_eq!(parser().parse("$-10.00").unwrap(), Amount::new("$", -10.0));
    }

    #[test]
    fn missing_commodity_uses_default() {
        assert_eq!(parser().parse("42").unwrap(), Amount::new("INR", 42.0));
        assert_eq!(parser().parse("  -3.25 ").unwrap(), Amount::new("INR", -3.25));
    }

    #[test]
    fn grouping_separators_are_accepted() {
        assert_eq!(
            parser().parse("INR 1,234,567.89").unwrap(),
            Amount::new("INR", 1_234_567.89)
        );
    }

    #[test]
    fn suffix_commodity() {
        assert_eq!(parser().parse("10.00 EUR").unwrap(), Amount::new("EUR", 10.0));
    }

    #[test]
    fn quoted_commodity_is_unquoted() {
        assert_eq!(
            parser().parse("\"VANGUARD 500\" 3").unwrap(),
            Amount::new("VANGUARD 500", 3.0)
        );
    }

    #[test]
    fn european_number_format() {
        let parser = AmountParser::new(
            "EUR",
            NumberFormat {
                grouping_separator: '.',
                decimal_separator: ',',
            },
        );
        assert_eq!(parser.parse("1.000,50").unwrap(), Amount::new("EUR", 1000.5));
    }

    #[test]
    fn malformed_tokens_fail() {
        for token in ["abc", "", "USD", "1.2.3", "-"] {
            assert_eq!(
                parser().parse(token),
                Err(LedgerError::MalformedAmount(token.to_string())),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn display_includes_commodity() {
        assert_eq!(Amount::new("INR", -4.5).to_string(), "INR -4.5");
        assert_eq!(Amount::new("", 2.0).to_string(), "2");
        assert_eq!(Amount::new("$", 1.5).to_string(), "$ 1.5");
    }

    #[test]
    fn display_quotes_commodities_ledger_cannot_read_bare() {
        assert_eq!(Amount::new("VANGUARD 500", 3.0).to_string(), "\"VANGUARD 500\" 3");
        assert_eq!(Amount::new("AAPL2", 1.0).to_string(), "\"AAPL2\" 1");
        assert_eq!(Amount::new("EUR", 1.0).to_string(), "EUR 1");
    }
}
