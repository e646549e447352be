//! Stipend text parsing: display strings for records, numbers for filtering and sorting.

use std::sync::OnceLock;

use internship_core::Stipend;
use regex::Regex;

const CURRENCY_SYMBOLS: [char; 4] = ['₹', '$', '€', '£'];

fn stipend_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([₹$€£]?\s?[0-9][0-9,]*)\s*(?:/\s*|per\s+)?([a-z]+)?")
            .expect("stipend pattern is valid")
    })
}

/// Returns `None` when the text carries no amount, so callers can tell a parse
/// miss apart from a real `"0"`.
pub fn match_stipend(raw: &str) -> Option<Stipend> {
    if raw.trim().is_empty() {
        return None;
    }
    let caps = stipend_pattern().captures(raw)?;
    let amount = caps
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "0".to_string());
    let period = caps
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "month".to_string());
    Some(Stipend { amount, period })
}

/// `"₹ 20,000 /month"` -> `{amount: "₹ 20,000", period: "month"}`; anything
/// without an amount falls back to `{"0", "month"}`.
pub fn parse_stipend(raw: &str) -> Stipend {
    match_stipend(raw).unwrap_or_default()
}

/// Numeric value of a display amount. Handles currency symbols, thousands
/// separators, a `k` suffix and `min-max` ranges (mean). Unparseable input is `0`.
pub fn parse_stipend_amount(amount: &str) -> f64 {
    let cleaned = amount
        .chars()
        .filter(|c| *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect::<String>();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0.0;
    }

    let lower = cleaned.to_lowercase();
    if lower.contains('k') {
        let without_suffix = lower.replacen('k', "", 1);
        return leading_float(&without_suffix)
            .map(|v| v * 1000.0)
            .unwrap_or(0.0);
    }

    if cleaned.contains('-') {
        let mut parts = cleaned.split('-');
        let min = parts.next().and_then(leading_float);
        let max = parts.next().and_then(leading_float);
        if let (Some(min), Some(max)) = (min, max) {
            return (min + max) / 2.0;
        }
    }

    leading_float(cleaned).unwrap_or(0.0)
}

fn leading_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
            .expect("number pattern is valid")
    })
}

/// Parses the longest numeric prefix after leading whitespace, the way a
/// lenient float reader does (`"5000abc"` -> 5000).
pub(crate) fn leading_float(text: &str) -> Option<f64> {
    leading_number_pattern()
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse().ok())
}

/// `0` -> `₹0`, `15000` -> `₹15K`, `1500` -> `₹1.5K`, `800` -> `₹800`.
pub fn format_currency(value: f64, symbol: &str) -> String {
    if value == 0.0 {
        return format!("{symbol}0");
    }
    if value >= 1000.0 {
        return format!("{symbol}{}K", value / 1000.0);
    }
    format!("{symbol}{value}")
}
