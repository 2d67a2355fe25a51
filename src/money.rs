use rust_decimal::{ Decimal, RoundingStrategy };

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_uppercase().as_str() {
        "EUR" => Some("€"),
        "USD" => Some("$"),
        "GBP" => Some("£"),
        "CHF" => Some("CHF "),
        "JPY" => Some("¥"),
        _ => None,
    }
}

/// Display an amount with two fraction digits and thousands grouping, e.g. `€10,000.00`.
/// Stored amounts are never rounded; this is presentation only.
pub fn format_currency(amount: Decimal, currency: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    match currency_symbol(currency) {
        Some(symbol) => format!("{}{}{}.{}", sign, symbol, grouped, fraction),
        None => format!("{}{}.{} {}", sign, grouped, fraction, currency.to_uppercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Decimal::from(10_000), "EUR"), "€10,000.00");
        assert_eq!(format_currency(Decimal::from_str("1234567.891").unwrap(), "usd"), "$1,234,567.89");
        assert_eq!(format_currency(Decimal::from_str("0.005").unwrap(), "EUR"), "€0.01");
        assert_eq!(format_currency(Decimal::from_str("-42.5").unwrap(), "GBP"), "-£42.50");
        assert_eq!(format_currency(Decimal::from(999), "SEK"), "999.00 SEK");
    }
}
