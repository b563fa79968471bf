//! Payment Responses

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;

/// Status reported by the payment processor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Approved,
    Pending,
    /// Rejected, cancelled, in_process and anything new the processor adds
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "approved" => Self::Approved,
            "pending" => Self::Pending,
            _ => Self::Other(s),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Response body of a payment or upgrade call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub status: PaymentStatus,

    #[serde(default)]
    pub status_detail: Option<String>,

    #[serde(default)]
    pub id: Option<String>,

    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// What the UI does next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { payment_id: Option<String> },
    /// Accepted but not settled yet; onward navigation still happens
    Pending { payment_id: Option<String> },
}

impl PaymentOutcome {
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

impl PaymentResponse {
    /// Classify the processor status
    ///
    /// `approved` and `pending` are success paths; anything else is a
    /// rejection carrying the backend's `statusDetail`.
    pub fn outcome(&self) -> Result<PaymentOutcome, CheckoutError> {
        match &self.status {
            PaymentStatus::Approved => Ok(PaymentOutcome::Approved {
                payment_id: self.id.clone(),
            }),
            PaymentStatus::Pending => Ok(PaymentOutcome::Pending {
                payment_id: self.id.clone(),
            }),
            PaymentStatus::Other(status) => Err(CheckoutError::Rejected {
                status: status.clone(),
                detail: self
                    .status_detail
                    .clone()
                    .unwrap_or_else(|| "Payment was not approved".into()),
            }),
        }
    }
}
