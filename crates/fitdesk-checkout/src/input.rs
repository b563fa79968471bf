//! Payment Input
//!
//! Form-backing state for one checkout attempt. Each setter takes the raw
//! field text and returns the display string; the struct keeps only the
//! normalized digits. Validation that the formatters skip (month range,
//! expiry in the past, code length) happens once, in [`PaymentInput::validate`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::brand::{detect_brand, Brand};
use crate::error::{CheckoutError, Result};
use crate::format::{
    digits, format_card_number, format_expiry, format_identification, format_security_code,
    last_four,
};

/// Digits sent to the BIN lookup
pub const BIN_LENGTH: usize = 6;

/// Shortest card number accepted at submission
pub const CARD_NUMBER_MIN_DIGITS: usize = 13;

/// Payment method identifier issued by the processor's BIN lookup
///
/// Not convertible from [`Brand`]; the only source is a lookup response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodId(String);

impl PaymentMethodId {
    /// Wrap the identifier returned by a BIN lookup
    pub fn from_bin_lookup(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentMethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Card expiry with the year widened to four digits
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expiry {
    pub year: i32,
    pub month: u32,
}

impl Expiry {
    /// Two-digit month, `01`-`12`
    pub fn month_str(&self) -> String {
        format!("{:02}", self.month)
    }

    /// Four-digit year
    pub fn year_str(&self) -> String {
        format!("{:04}", self.year)
    }

    /// Cards are valid through the last day of their expiry month
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        (self.year, self.month) < (today.year(), today.month())
    }
}

/// Parse an `MM/YY` (or `MMYY`, `MM/YYYY`) expiry
///
/// Two-digit years are widened by prefixing `20`.
pub fn parse_expiry(formatted: &str) -> Result<Expiry> {
    let cleaned = digits(formatted);
    let invalid = || CheckoutError::InvalidExpiry(formatted.to_string());

    if cleaned.len() != 4 && cleaned.len() != 6 {
        return Err(invalid());
    }

    let month: u32 = cleaned[..2].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    let year_digits = &cleaned[2..];
    let year: i32 = if year_digits.len() == 2 {
        format!("20{year_digits}").parse().map_err(|_| invalid())?
    } else {
        year_digits.parse().map_err(|_| invalid())?
    };

    Ok(Expiry { year, month })
}

/// Card fields ready to be tokenized
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardDetails {
    pub card_number: String,
    pub expiry: Expiry,
    pub security_code: String,
    pub cardholder_name: String,
    pub identification_number: String,
    pub payment_method_id: PaymentMethodId,
}

/// Transient payment form state
#[derive(Clone, Debug, Default)]
pub struct PaymentInput {
    card_number: String,
    expiry: String,
    security_code: String,
    identification_number: String,
    cardholder_name: String,
    detected_brand: Brand,
    payment_method_id: Option<PaymentMethodId>,
}

impl PaymentInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the card number and return its display form
    ///
    /// Re-detects the brand hint and drops the resolved payment method once the
    /// BIN changes. A security code longer than the new brand allows is
    /// cleared so the member re-enters it.
    pub fn set_card_number(&mut self, raw: &str) -> String {
        let display = format_card_number(raw);
        let previous_bin = self.bin().map(str::to_owned);

        self.card_number = digits(&display);

        let brand = detect_brand(&self.card_number);
        if brand != self.detected_brand {
            tracing::debug!(brand = %brand, "Card brand hint changed");
            self.detected_brand = brand;
            if self.security_code.len() > brand.security_code_len() {
                self.security_code.clear();
            }
        }

        if previous_bin.as_deref() != self.bin() {
            self.payment_method_id = None;
        }

        display
    }

    pub fn set_expiry(&mut self, raw: &str) -> String {
        self.expiry = format_expiry(raw);
        self.expiry.clone()
    }

    pub fn set_security_code(&mut self, raw: &str) -> String {
        self.security_code = format_security_code(raw, self.detected_brand);
        self.security_code.clone()
    }

    pub fn set_identification(&mut self, raw: &str) -> String {
        self.identification_number = format_identification(raw);
        self.identification_number.clone()
    }

    pub fn set_cardholder_name(&mut self, name: &str) {
        self.cardholder_name = name.trim().to_string();
    }

    /// Record the processor's answer for the current BIN
    pub fn apply_payment_method(&mut self, id: PaymentMethodId) {
        self.payment_method_id = Some(id);
    }

    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    pub fn expiry(&self) -> &str {
        &self.expiry
    }

    pub fn security_code(&self) -> &str {
        &self.security_code
    }

    pub fn identification_number(&self) -> &str {
        &self.identification_number
    }

    pub fn cardholder_name(&self) -> &str {
        &self.cardholder_name
    }

    pub const fn detected_brand(&self) -> Brand {
        self.detected_brand
    }

    pub const fn payment_method_id(&self) -> Option<&PaymentMethodId> {
        self.payment_method_id.as_ref()
    }

    /// First six digits, once that many have been entered
    pub fn bin(&self) -> Option<&str> {
        self.card_number.get(..BIN_LENGTH)
    }

    /// Last four digits for display
    pub fn last_four(&self) -> String {
        last_four(&self.card_number)
    }

    /// Submission-time checks
    pub fn validate(&self, today: NaiveDate) -> Result<CardDetails> {
        if self.card_number.len() < CARD_NUMBER_MIN_DIGITS {
            return Err(CheckoutError::InvalidCardNumber(self.card_number.len()));
        }

        let expiry = parse_expiry(&self.expiry)?;
        if expiry.is_expired(today) {
            return Err(CheckoutError::CardExpired {
                month: expiry.month,
                year: expiry.year,
            });
        }

        let expected = self.detected_brand.security_code_len();
        let actual = self.security_code.len();
        let code_ok = match self.detected_brand {
            Brand::Unknown => (3..=expected).contains(&actual),
            _ => actual == expected,
        };
        if !code_ok {
            return Err(CheckoutError::InvalidSecurityCode { expected, actual });
        }

        if self.identification_number.is_empty() {
            return Err(CheckoutError::MissingIdentification);
        }

        let payment_method_id = self
            .payment_method_id
            .clone()
            .ok_or(CheckoutError::MissingPaymentMethod)?;

        Ok(CardDetails {
            card_number: self.card_number.clone(),
            expiry,
            security_code: self.security_code.clone(),
            cardholder_name: self.cardholder_name.clone(),
            identification_number: self.identification_number.clone(),
            payment_method_id,
        })
    }
}
