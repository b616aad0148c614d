//! Display formatting for prices, volumes and percentages.

use rust_decimal::{Decimal, RoundingStrategy};

/// Format as Canadian dollars with two decimals and thousands separators.
///
/// ```rust
/// use realtime_quotes::domain::market::format_currency;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_currency(Decimal::new(123_456, 2)), "$1,234.56");
/// assert_eq!(format_currency(Decimal::new(-123, 2)), "-$1.23");
/// ```
#[must_use]
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let digits = format!("{:.2}", rounded.abs());
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${}.{fraction}", group_thousands(whole))
}

/// Format a count compactly: `1.2K`, `3.4M`, `5.6B`. Below a thousand the
/// value is printed with separators.
#[must_use]
pub fn format_number(value: u64) -> String {
    const UNITS: [(u64, &str); 3] = [
        (1_000_000_000, "B"),
        (1_000_000, "M"),
        (1_000, "K"),
    ];

    for (scale, suffix) in UNITS {
        if value >= scale {
            let scaled = (Decimal::from(value) / Decimal::from(scale))
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
            return format!("{scaled:.1}{suffix}");
        }
    }

    group_thousands(&value.to_string())
}

/// Format a percent with an explicit sign and two decimals, e.g. `+1.23%`.
#[must_use]
pub fn format_percentage(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        "+"
    };
    format!("{sign}{:.2}%", rounded.abs())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(dec!(0), "$0.00")]
    #[test_case(dec!(5), "$5.00")]
    #[test_case(dec!(1234.567), "$1,234.57")]
    #[test_case(dec!(1000000), "$1,000,000.00")]
    #[test_case(dec!(-1.234), "-$1.23")]
    #[test_case(dec!(-0.001), "$0.00")]
    fn currency(value: Decimal, expected: &str) {
        assert_eq!(format_currency(value), expected);
    }

    #[test_case(0, "0")]
    #[test_case(999, "999")]
    #[test_case(1_000, "1.0K")]
    #[test_case(1_250, "1.3K")]
    #[test_case(3_400_000, "3.4M")]
    #[test_case(5_600_000_000, "5.6B")]
    fn compact_number(value: u64, expected: &str) {
        assert_eq!(format_number(value), expected);
    }

    #[test_case(dec!(1.234), "+1.23%")]
    #[test_case(dec!(0), "+0.00%")]
    #[test_case(dec!(-2.5), "-2.50%")]
    fn percentage(value: Decimal, expected: &str) {
        assert_eq!(format_percentage(value), expected);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1,234");
        assert_eq!(group_thousands("1234567"), "1,234,567");
    }
}
