//! Membership Plans & Charge Amounts
//!
//! Types supplied by the membership/billing backend. Amounts are never
//! computed on the client: the charge is either the plan's list price or the
//! server-computed proration for an upgrade.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};

/// A membership plan as listed by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,

    pub name: String,

    /// List price for a new membership
    pub price: Decimal,

    #[serde(default)]
    pub description: Option<String>,

    /// Billing period length
    #[serde(default)]
    pub duration_days: Option<u32>,
}

impl Plan {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            description: None,
            duration_days: None,
        }
    }
}

/// Server-computed proration for moving to a higher plan mid-cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInfo {
    pub current_plan_id: String,

    pub new_plan_id: String,

    /// Amount charged for the remaining days of the current period
    pub upgrade_cost: Decimal,

    #[serde(default)]
    pub remaining_days: Option<u32>,
}

/// One entry of a member's billing history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRecord {
    pub id: String,
    pub amount: Decimal,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The signed-in member, handed to checkout explicitly
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSession {
    pub user_id: String,
    pub email: String,
    /// Single-field name from the profile
    #[serde(default)]
    pub display_name: String,
}

impl MemberSession {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

/// Amount to charge for this checkout
///
/// Upgrades charge the proration from `upgrade_info`; new memberships charge
/// the plan price. An upgrade without `upgrade_info` is a caller error: the
/// cost must be fetched before submission is allowed. The proration must be
/// quoted for `plan` itself.
pub fn resolve_charge_amount(
    plan: &Plan,
    is_upgrade: bool,
    upgrade_info: Option<&UpgradeInfo>,
) -> Result<Decimal> {
    match (is_upgrade, upgrade_info) {
        (true, Some(info)) if info.new_plan_id != plan.id => {
            Err(CheckoutError::UpgradePlanMismatch {
                plan_id: plan.id.clone(),
                quoted_plan_id: info.new_plan_id.clone(),
            })
        }
        (true, Some(info)) => Ok(info.upgrade_cost),
        (true, None) => Err(CheckoutError::MissingUpgradeCost {
            plan_id: plan.id.clone(),
        }),
        (false, _) => Ok(plan.price),
    }
}
