//! Mock Backends
//!
//! In-memory stand-ins for the payment and membership services, for tests
//! and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use fitdesk_checkout::{
    detect_brand, BillingRecord, Brand, CardDetails, IdempotencyKey, NewMembershipPayment,
    PaymentMethodId, PaymentResponse, PaymentStatus, Plan, UpgradeInfo, UpgradePayment,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{ApiError, Result};
use crate::membership::MembershipApi;
use crate::payment::{CardToken, PaymentApi};

/// Mock payment processor
///
/// Answers every payment with a configurable status and deduplicates by
/// idempotency key: a repeated key returns the stored response without a
/// second charge.
pub struct MockPaymentApi {
    status: RwLock<(PaymentStatus, String)>,
    processed: RwLock<HashMap<IdempotencyKey, PaymentResponse>>,
    charges: AtomicUsize,
    amounts: RwLock<Vec<Decimal>>,
    lookups: RwLock<Vec<String>>,
}

impl Default for MockPaymentApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentApi {
    /// Processor that approves everything
    pub fn new() -> Self {
        Self {
            status: RwLock::new((PaymentStatus::Approved, "accredited".into())),
            processed: RwLock::new(HashMap::new()),
            charges: AtomicUsize::new(0),
            amounts: RwLock::new(Vec::new()),
            lookups: RwLock::new(Vec::new()),
        }
    }

    /// Processor that answers with `status` and `detail`
    pub fn with_status(status: PaymentStatus, detail: impl Into<String>) -> Self {
        let api = Self::new();
        api.set_status(status, detail);
        api
    }

    pub fn set_status(&self, status: PaymentStatus, detail: impl Into<String>) {
        let mut current = self.status.write().unwrap_or_else(PoisonError::into_inner);
        *current = (status, detail.into());
    }

    /// Number of distinct charges made
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Amounts of new membership charges, in order
    pub fn charged_amounts(&self) -> Vec<Decimal> {
        self.amounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// BINs looked up so far, in call order
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn charge(&self, key: &IdempotencyKey, amount: Option<Decimal>) -> PaymentResponse {
        let mut processed = self.processed.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = processed.get(key) {
            tracing::debug!(idempotency_key = %key, "Duplicate submission ignored");
            return previous.clone();
        }

        let (status, detail) = self
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(amount) = amount {
            self.amounts
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(amount);
        }

        let response = PaymentResponse {
            status,
            status_detail: Some(detail),
            id: Some(format!("pay_{n}")),
            extra: HashMap::new(),
        };
        processed.insert(key.clone(), response.clone());
        response
    }
}

#[async_trait]
impl PaymentApi for MockPaymentApi {
    async fn create_card_token(&self, card: &CardDetails) -> Result<CardToken> {
        Ok(CardToken {
            id: format!(
                "tok_{}_{}",
                fitdesk_checkout::last_four(&card.card_number),
                uuid::Uuid::new_v4().simple()
            ),
        })
    }

    async fn lookup_payment_method(&self, bin: &str) -> Result<PaymentMethodId> {
        self.lookups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bin.to_string());

        let id = match detect_brand(bin) {
            Brand::Visa => "visa",
            Brand::Mastercard => "master",
            Brand::Amex => "amex",
            Brand::Discover => "discover",
            Brand::Unknown => {
                return Err(ApiError::Http {
                    status: 404,
                    message: format!("No payment method for BIN {bin}"),
                });
            }
        };

        Ok(PaymentMethodId::from_bin_lookup(id))
    }

    async fn process_payment(&self, payment: &NewMembershipPayment) -> Result<PaymentResponse> {
        Ok(self.charge(&payment.idempotency_key, Some(payment.amount)))
    }

    async fn process_upgrade(&self, payment: &UpgradePayment) -> Result<PaymentResponse> {
        Ok(self.charge(&payment.idempotency_key, None))
    }

    fn name(&self) -> &str {
        "MockPaymentApi"
    }
}

/// Days left in the billing period for every mock upgrade
const MOCK_REMAINING_DAYS: u32 = 15;

/// Mock membership service with three plans
pub struct MockMembershipApi {
    plans: RwLock<Vec<Plan>>,
    current_plans: RwLock<HashMap<String, String>>,
    history: RwLock<HashMap<String, Vec<BillingRecord>>>,
}

impl Default for MockMembershipApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMembershipApi {
    pub fn new() -> Self {
        let mut basic = Plan::new("basic", "Basic", dec!(49.90));
        basic.duration_days = Some(30);
        let mut premium = Plan::new("premium", "Premium", dec!(89.90));
        premium.duration_days = Some(30);
        let mut elite = Plan::new("elite", "Elite", dec!(129.90));
        elite.duration_days = Some(30);

        Self {
            plans: RwLock::new(vec![basic, premium, elite]),
            current_plans: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Put `user_id` on `plan_id`
    pub fn set_current_plan(&self, user_id: &str, plan_id: &str) {
        self.current_plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), plan_id.to_string());
    }

    /// Change a plan's list price
    pub fn set_price(&self, plan_id: &str, price: Decimal) {
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(plan) = plans.iter_mut().find(|p| p.id == plan_id) {
            plan.price = price;
        }
    }

    pub fn add_billing_record(&self, user_id: &str, amount: Decimal, description: &str) {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        let records = history.entry(user_id.to_string()).or_default();
        records.push(BillingRecord {
            id: format!("bill_{}", records.len() + 1),
            amount,
            status: "paid".into(),
            description: Some(description.to_string()),
            created_at: Utc::now(),
        });
    }

    fn find_plan(&self, plan_id: &str) -> Result<Plan> {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: format!("Plan not found: {plan_id}"),
            })
    }
}

#[async_trait]
impl MembershipApi for MockMembershipApi {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        Ok(self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Plan> {
        self.find_plan(plan_id)
    }

    async fn upgrade_cost(&self, user_id: &str, new_plan_id: &str) -> Result<UpgradeInfo> {
        let current_id = self
            .current_plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: format!("No active membership for {user_id}"),
            })?;

        let current = self.find_plan(&current_id)?;
        let target = self.find_plan(new_plan_id)?;

        if target.price <= current.price {
            return Err(ApiError::Http {
                status: 422,
                message: "Upgrade must move to a higher plan".into(),
            });
        }

        let period = Decimal::from(current.duration_days.unwrap_or(30));
        let cost = ((target.price - current.price) * Decimal::from(MOCK_REMAINING_DAYS) / period)
            .round_dp(2);

        Ok(UpgradeInfo {
            current_plan_id: current.id,
            new_plan_id: target.id,
            upgrade_cost: cost,
            remaining_days: Some(MOCK_REMAINING_DAYS),
        })
    }

    async fn billing_history(&self, user_id: &str) -> Result<Vec<BillingRecord>> {
        Ok(self
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
