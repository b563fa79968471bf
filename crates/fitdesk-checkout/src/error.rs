//! Checkout Error Types

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout-related errors
///
/// Most variants are precondition violations: the caller tried to resolve an
/// amount or build a request without the upstream data it needs. They are
/// returned before anything is sent to the payment processor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Upgrade requested but the proration cost was never fetched
    #[error("Upgrade cost not loaded for plan {plan_id}")]
    MissingUpgradeCost { plan_id: String },

    /// Proration was quoted for a different plan than the one being bought
    #[error("Upgrade cost quoted for plan {quoted_plan_id}, not {plan_id}")]
    UpgradePlanMismatch {
        plan_id: String,
        quoted_plan_id: String,
    },

    /// Backend amount moved since it was shown to the member
    #[error("Charge amount changed from {displayed} to {current}")]
    AmountChanged { displayed: Decimal, current: Decimal },

    /// BIN lookup has not returned a payment method id yet
    #[error("Payment method not resolved")]
    MissingPaymentMethod,

    /// Card token missing from the request
    #[error("Card token missing")]
    MissingToken,

    /// Expiry could not be parsed as MM/YY
    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    /// Expiry is in the past
    #[error("Card expired: {month:02}/{year}")]
    CardExpired { month: u32, year: i32 },

    /// Card number too short to be a real card
    #[error("Invalid card number: {0} digits")]
    InvalidCardNumber(usize),

    /// Security code length does not match the card brand
    #[error("Invalid security code: expected {expected} digits, got {actual}")]
    InvalidSecurityCode { expected: usize, actual: usize },

    /// Identification number empty
    #[error("Identification number missing")]
    MissingIdentification,

    /// Payment processor answered with a non-success status
    #[error("Payment rejected ({status}): {detail}")]
    Rejected { status: String, detail: String },

    /// A submission for this checkout is already in flight
    #[error("Payment already submitting")]
    AlreadySubmitting,

    /// This checkout already succeeded
    #[error("Payment already completed")]
    AlreadyCompleted,
}

impl CheckoutError {
    /// True for errors the UI should have prevented by gating the submit button
    pub const fn is_precondition(&self) -> bool {
        !matches!(
            self,
            Self::Rejected { .. } | Self::AlreadySubmitting | Self::AlreadyCompleted
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingUpgradeCost { .. } | Self::UpgradePlanMismatch { .. } => {
                "We are still calculating your upgrade cost.".into()
            }
            Self::AmountChanged { current, .. } => {
                format!("The price changed to {current}. Review it and submit again.")
            }
            Self::MissingPaymentMethod => {
                "We could not recognise your card yet. Check the card number.".into()
            }
            Self::InvalidExpiry(_) | Self::CardExpired { .. } => {
                "Check the card expiration date.".into()
            }
            Self::InvalidCardNumber(_) => "Check the card number.".into(),
            Self::InvalidSecurityCode { expected, .. } => {
                format!("The security code must have {expected} digits.")
            }
            Self::MissingIdentification => "Enter your identification number.".into(),
            Self::Rejected { detail, .. } => format!("Payment was not approved: {detail}"),
            Self::AlreadySubmitting => "Your payment is being processed.".into(),
            Self::AlreadyCompleted => "This payment has already been completed.".into(),
            Self::MissingToken => "An error occurred processing your card.".into(),
        }
    }
}
