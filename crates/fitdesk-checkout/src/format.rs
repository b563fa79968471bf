//! Keystroke Formatting
//!
//! Turns raw field input into display strings. Every function here is total:
//! any input produces a value, the empty string included. The stored value of
//! a field is always [`digits`] of its display string.

use crate::brand::Brand;

/// Maximum digits in a card number
pub const CARD_NUMBER_MAX_DIGITS: usize = 16;

/// Maximum digits in an MMYY expiry
pub const EXPIRY_MAX_DIGITS: usize = 4;

/// Maximum digits in an identification (DNI) number
pub const IDENTIFICATION_MAX_DIGITS: usize = 9;

/// Extract the decimal digits of `raw`
pub fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn digits_capped(raw: &str, max: usize) -> String {
    raw.chars().filter(char::is_ascii_digit).take(max).collect()
}

/// Card number grouped in runs of four, e.g. `4111 1111 1111 1111`
pub fn format_card_number(raw: &str) -> String {
    let cleaned = digits_capped(raw, CARD_NUMBER_MAX_DIGITS);
    let mut out = String::with_capacity(cleaned.len() + cleaned.len() / 4);

    for (i, c) in cleaned.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push(' ');
        }
        out.push(c);
    }

    out
}

/// Expiry as `MM/YY`
///
/// One or two digits are returned untouched while the month is being typed.
/// The month is not range-checked here; see [`crate::parse_expiry`].
pub fn format_expiry(raw: &str) -> String {
    let cleaned = digits_capped(raw, EXPIRY_MAX_DIGITS);

    if cleaned.len() <= 2 {
        cleaned
    } else {
        format!("{}/{}", &cleaned[..2], &cleaned[2..])
    }
}

/// Security code capped at the brand's length
pub fn format_security_code(raw: &str, brand: Brand) -> String {
    digits_capped(raw, brand.security_code_len())
}

/// Identification number capped at nine digits
pub fn format_identification(raw: &str) -> String {
    digits_capped(raw, IDENTIFICATION_MAX_DIGITS)
}

/// Last four digits of a card number, for logs and receipts
pub fn last_four(card_number: &str) -> String {
    let cleaned = digits(card_number);
    let start = cleaned.len().saturating_sub(4);
    cleaned[start..].to_string()
}
