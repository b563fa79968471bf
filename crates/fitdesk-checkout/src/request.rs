//! Payment Request Building
//!
//! Assembles the bodies sent to the payment API for a new membership or a
//! plan upgrade.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::input::PaymentMethodId;
use crate::plan::{resolve_charge_amount, MemberSession, Plan, UpgradeInfo};

/// Identification document type sent with every payment
pub const IDENTIFICATION_TYPE: &str = "DNI";

/// Card payments are always a single installment
pub const INSTALLMENTS: u32 = 1;

/// Used when a payer name part is missing
pub const NAME_PLACEHOLDER: &str = "Member";

/// Client-generated token that lets the backend drop duplicate submissions
///
/// One key per checkout attempt; a retry of the same attempt reuses it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payer first and last name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayerName {
    pub first: String,
    pub last: String,
}

impl PayerName {
    /// Build from separate form fields
    pub fn new(first: &str, last: &str) -> Self {
        Self {
            first: or_placeholder(first.trim()),
            last: or_placeholder(last.trim()),
        }
    }

    /// Split a single display name
    ///
    /// First whitespace token is the first name, the rest is the last name.
    /// Lossy for multi-word first names; prefer [`PayerName::new`].
    pub fn from_display_name(display_name: &str) -> Self {
        let mut parts = display_name.split_whitespace();
        let first = parts.next().unwrap_or_default();
        let last = parts.collect::<Vec<_>>().join(" ");

        if last.is_empty() {
            tracing::debug!("Payer last name missing, using placeholder");
        }

        Self::new(first, &last)
    }
}

fn or_placeholder(s: &str) -> String {
    if s.is_empty() {
        NAME_PLACEHOLDER.to_string()
    } else {
        s.to_string()
    }
}

/// Body for a new membership purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMembershipPayment {
    pub external_reference: String,
    pub user_id: String,
    pub plan_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payer_email: String,
    pub payer_first_name: String,
    pub payer_last_name: String,
    pub description: String,
    pub token: String,
    pub installments: u32,
    pub payment_method_id: PaymentMethodId,
    pub identification_type: String,
    pub identification_number: String,
    pub idempotency_key: IdempotencyKey,
}

/// Body for an upgrade of an existing membership
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePayment {
    pub user_id: String,
    pub new_plan_id: String,
    pub token: String,
    pub installments: u32,
    pub payment_method_id: PaymentMethodId,
    pub identification_type: String,
    pub identification_number: String,
    pub idempotency_key: IdempotencyKey,
}

/// Final request for the payment API
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PaymentRequestPayload {
    NewMembership(NewMembershipPayment),
    Upgrade(UpgradePayment),
}

impl PaymentRequestPayload {
    pub const fn idempotency_key(&self) -> &IdempotencyKey {
        match self {
            Self::NewMembership(p) => &p.idempotency_key,
            Self::Upgrade(p) => &p.idempotency_key,
        }
    }

    pub const fn is_upgrade(&self) -> bool {
        matches!(self, Self::Upgrade(_))
    }
}

/// Everything needed to build a [`PaymentRequestPayload`]
#[derive(Clone, Debug)]
pub struct PaymentRequestParams<'a> {
    pub session: &'a MemberSession,
    pub plan: &'a Plan,
    pub is_upgrade: bool,
    pub upgrade_info: Option<&'a UpgradeInfo>,
    pub payer: PayerName,
    pub card_token: &'a str,
    /// Method id from the processor's BIN lookup
    pub payment_method_id: &'a PaymentMethodId,
    pub identification_number: &'a str,
    pub idempotency_key: &'a IdempotencyKey,
}

/// Assemble the payment request
///
/// The external reference is derived from the idempotency key so a retried
/// attempt carries the same reference.
pub fn build_payment_request(params: PaymentRequestParams<'_>) -> Result<PaymentRequestPayload> {
    if params.card_token.is_empty() {
        return Err(CheckoutError::MissingToken);
    }
    if params.identification_number.is_empty() {
        return Err(CheckoutError::MissingIdentification);
    }

    let amount = resolve_charge_amount(params.plan, params.is_upgrade, params.upgrade_info)?;

    let payload = if params.is_upgrade {
        PaymentRequestPayload::Upgrade(UpgradePayment {
            user_id: params.session.user_id.clone(),
            new_plan_id: params.plan.id.clone(),
            token: params.card_token.to_string(),
            installments: INSTALLMENTS,
            payment_method_id: params.payment_method_id.clone(),
            identification_type: IDENTIFICATION_TYPE.to_string(),
            identification_number: params.identification_number.to_string(),
            idempotency_key: params.idempotency_key.clone(),
        })
    } else {
        PaymentRequestPayload::NewMembership(NewMembershipPayment {
            external_reference: format!(
                "membership-{}-{}",
                params.session.user_id, params.idempotency_key
            ),
            user_id: params.session.user_id.clone(),
            plan_id: params.plan.id.clone(),
            amount,
            payer_email: params.session.email.clone(),
            payer_first_name: params.payer.first,
            payer_last_name: params.payer.last,
            description: format!("FitDesk membership: {}", params.plan.name),
            token: params.card_token.to_string(),
            installments: INSTALLMENTS,
            payment_method_id: params.payment_method_id.clone(),
            identification_type: IDENTIFICATION_TYPE.to_string(),
            identification_number: params.identification_number.to_string(),
            idempotency_key: params.idempotency_key.clone(),
        })
    };

    tracing::debug!(
        plan_id = %params.plan.id,
        upgrade = params.is_upgrade,
        amount = %amount,
        "Built payment request"
    );

    Ok(payload)
}
