//! Budget parsing for Indian numeric shorthand
//!
//! Understands "15 lakhs", "2.5 Cr", "5l", "50k", "₹15,00,000" and similar.
//! Parsing never fails: unusable input yields the unspecified-budget sentinel.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Amount assumed when no usable budget was given
pub const DEFAULT_BUDGET: f64 = 500_000.0;

const LAKH: f64 = 100_000.0;
const CRORE: f64 = 10_000_000.0;
const THOUSAND: f64 = 1_000.0;

/// Currency markers stripped from the front of a budget string
const CURRENCY_PREFIXES: &[&str] = &["₹", "rs.", "rs", "inr", "$"];

/// Currency markers stripped from the end of a budget string
const CURRENCY_SUFFIXES: &[&str] = &["/-", "rupees", "rupee", "inr"];

/// A budget in rupees, parsed once per request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetAmount {
    /// Amount in rupees (never negative)
    pub amount: f64,
    /// False when `amount` is the default sentinel rather than user input
    pub specified: bool,
}

impl BudgetAmount {
    /// A budget the user actually supplied
    pub fn specified(amount: f64) -> Self {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        Self {
            amount,
            specified: true,
        }
    }

    /// The sentinel used when no budget was given
    pub fn unspecified() -> Self {
        Self {
            amount: DEFAULT_BUDGET,
            specified: false,
        }
    }
}

impl Default for BudgetAmount {
    fn default() -> Self {
        Self::unspecified()
    }
}

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"))
}

/// Parse a free-text budget into rupees
pub fn parse_budget(raw: Option<&str>) -> BudgetAmount {
    let Some(raw) = raw else {
        return BudgetAmount::unspecified();
    };

    let mut cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    strip_currency(&mut cleaned);

    let multiplier = multiplier_for(&cleaned);

    let Some(number) = number_pattern()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
    else {
        return BudgetAmount::unspecified();
    };

    BudgetAmount::specified(number * multiplier)
}

/// Convenience wrapper returning just the amount
pub fn parse_amount(raw: &str) -> f64 {
    parse_budget(Some(raw)).amount
}

fn strip_currency(s: &mut String) {
    let mut changed = true;
    while changed {
        changed = false;
        for prefix in CURRENCY_PREFIXES {
            if let Some(rest) = s.strip_prefix(prefix) {
                *s = rest.to_string();
                changed = true;
            }
        }
        for suffix in CURRENCY_SUFFIXES {
            if let Some(rest) = s.strip_suffix(suffix) {
                *s = rest.to_string();
                changed = true;
            }
        }
    }
}

/// Unit multiplier, checked in fixed precedence order
fn multiplier_for(s: &str) -> f64 {
    if s.contains("lakh") || s.contains("lac") {
        LAKH
    } else if s.contains("crore") || s.contains("cr") {
        CRORE
    } else if s.ends_with('l') {
        LAKH
    } else if s.contains("thousand") || s.contains('k') {
        THOUSAND
    } else {
        1.0
    }
}

/// Format rupees for prompts and CLI output (lakh/crore units above one lakh)
pub fn format_inr(amount: f64) -> String {
    if !amount.is_finite() {
        return "₹0".to_string();
    }
    let abs = amount.abs();
    let sign = if amount < 0.0 { "-" } else { "" };
    if abs >= CRORE {
        format!("{}₹{:.2} Cr", sign, abs / CRORE)
    } else if abs >= LAKH {
        format!("{}₹{:.2} L", sign, abs / LAKH)
    } else {
        format!("{}₹{:.0}", sign, abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lakh_variants() {
        assert_eq!(parse_amount("15 lakhs"), 1_500_000.0);
        assert_eq!(parse_amount("5 Lac"), 500_000.0);
        assert_eq!(parse_amount("5l"), 500_000.0);
        assert_eq!(parse_amount("10 L"), 1_000_000.0);
    }

    #[test]
    fn test_crore_variants() {
        assert_eq!(parse_amount("2.5 Cr"), 25_000_000.0);
        assert_eq!(parse_amount("1 crore"), 10_000_000.0);
        assert_eq!(parse_amount("2 crores"), 20_000_000.0);
    }

    #[test]
    fn test_thousands_and_plain() {
        assert_eq!(parse_amount("50k"), 50_000.0);
        assert_eq!(parse_amount("20000"), 20_000.0);
        assert_eq!(parse_amount("₹15,00,000"), 1_500_000.0);
        assert_eq!(parse_amount("Rs. 50K"), 50_000.0);
        assert_eq!(parse_amount("INR 3 lakh"), 300_000.0);
        assert_eq!(parse_amount("75000/-"), 75_000.0);
        assert_eq!(parse_amount("Rs 20 thousand"), 20_000.0);
    }

    #[test]
    fn test_range_uses_first_number() {
        assert_eq!(parse_amount("5-10 lakh"), 500_000.0);
    }

    #[test]
    fn test_unspecified_sentinel() {
        let empty = parse_budget(Some(""));
        assert_eq!(empty.amount, DEFAULT_BUDGET);
        assert!(!empty.specified);

        let absent = parse_budget(None);
        assert!(!absent.specified);

        let words = parse_budget(Some("Not specified"));
        assert_eq!(words.amount, DEFAULT_BUDGET);
        assert!(!words.specified);
    }

    #[test]
    fn test_zero_is_specified() {
        let zero = parse_budget(Some("0"));
        assert_eq!(zero.amount, 0.0);
        assert!(zero.specified);
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(1_500_000.0), "₹15.00 L");
        assert_eq!(format_inr(25_000_000.0), "₹2.50 Cr");
        assert_eq!(format_inr(20_000.0), "₹20000");
    }
}
