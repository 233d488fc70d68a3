//! GST and money display

use rust_decimal::{Decimal, RoundingStrategy};

/// New Zealand GST rate
pub const GST_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

/// Add GST to an exclusive amount, rounded to cents
pub fn add_gst(amount: Decimal) -> Decimal {
    (amount * (Decimal::ONE + GST_RATE))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount as dollars with thousands grouping, e.g. `$1,234.50`
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, cents)
}
