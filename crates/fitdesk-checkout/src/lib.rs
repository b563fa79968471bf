//! # fitdesk-checkout
//!
//! Payment input resolution for FitDesk membership checkout.
//!
//! Turns raw keystrokes into backend-ready payment fields, gives an instant
//! card-brand hint, picks the amount to charge and assembles the request for
//! the payment API. Pure code: no I/O, no global state.
//!
//! ## Flow
//!
//! ```text
//! keystrokes ──▶ format_* ──▶ PaymentInput ──validate──▶ CardDetails
//!                   │                                       │
//!                   ▼                                       ▼
//!             detect_brand                          (card token from
//!           (cosmetic hint)                          the payment API)
//!                                                           │
//!   Plan / UpgradeInfo ──▶ resolve_charge_amount ──▶ build_payment_request
//!   PaymentMethodId (BIN lookup) ─────────────────────────▶ │
//!                                                           ▼
//!                                                 PaymentRequestPayload
//! ```
//!
//! The brand hint only drives the card face. The processor's BIN lookup
//! answer ([`PaymentMethodId`]) is what goes into the request.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fitdesk_checkout::{PaymentInput, PaymentMethodId};
//!
//! let mut input = PaymentInput::new();
//! let shown = input.set_card_number("411111111111111155");
//! assert_eq!(shown, "4111 1111 1111 1115");
//!
//! // once the BIN lookup answers
//! input.apply_payment_method(PaymentMethodId::from_bin_lookup("visa"));
//! ```

mod brand;
mod error;
mod format;
mod input;
mod plan;
mod request;
mod response;

pub use brand::{detect_brand, Brand};
pub use error::{CheckoutError, Result};
pub use format::{
    digits, format_card_number, format_expiry, format_identification, format_security_code,
    last_four, CARD_NUMBER_MAX_DIGITS, EXPIRY_MAX_DIGITS, IDENTIFICATION_MAX_DIGITS,
};
pub use input::{
    parse_expiry, CardDetails, Expiry, PaymentInput, PaymentMethodId, BIN_LENGTH,
    CARD_NUMBER_MIN_DIGITS,
};
pub use plan::{resolve_charge_amount, BillingRecord, MemberSession, Plan, UpgradeInfo};
pub use request::{
    build_payment_request, IdempotencyKey, NewMembershipPayment, PayerName,
    PaymentRequestParams, PaymentRequestPayload, UpgradePayment, IDENTIFICATION_TYPE,
    INSTALLMENTS, NAME_PLACEHOLDER,
};
pub use response::{PaymentOutcome, PaymentResponse, PaymentStatus};
