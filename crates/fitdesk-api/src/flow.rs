//! Checkout Flow
//!
//! Drives one checkout attempt from keystrokes to the processor's answer:
//!
//! ```text
//! Idle ──submit──▶ Submitting ──approved/pending──▶ Succeeded
//!  ▲                   │
//!  └──── retry ◀── Failed ◀──── rejected / error
//! ```
//!
//! A second `submit` while one is in flight, or after success, is refused.
//! Every submission re-reads the amount from the membership service and stops
//! before charging if it no longer matches what the member was shown.
//! A retry after a transport failure reuses the idempotency key, since the
//! first request may have reached the processor. A rejection gets a fresh
//! key: the resubmission is a new charge attempt.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};
use fitdesk_checkout::{
    build_payment_request, resolve_charge_amount, CheckoutError, IdempotencyKey, MemberSession,
    PayerName, PaymentInput, PaymentOutcome, PaymentRequestParams, Plan, UpgradeInfo,
};
use rust_decimal::Decimal;

use crate::bin_lookup::{BinResolver, BinTicket};
use crate::error::{ApiError, Result};
use crate::membership::MembershipApi;
use crate::payment::PaymentApi;

/// Submission lifecycle of a checkout attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded(PaymentOutcome),
    /// User-facing message of the last failure
    Failed(String),
}

/// What is being bought
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutKind {
    NewMembership,
    Upgrade,
}

/// Last backend answer for the amount
#[derive(Clone, Debug)]
struct Pricing {
    plan: Plan,
    upgrade_info: Option<UpgradeInfo>,
}

/// One checkout attempt
pub struct CheckoutFlow {
    payments: Arc<dyn PaymentApi>,
    membership: Arc<dyn MembershipApi>,
    bin: BinResolver,
    session: MemberSession,
    kind: CheckoutKind,
    pricing: Mutex<Pricing>,
    idempotency_key: Mutex<IdempotencyKey>,
    state: Mutex<SubmissionState>,
}

impl CheckoutFlow {
    fn new(
        payments: Arc<dyn PaymentApi>,
        membership: Arc<dyn MembershipApi>,
        session: MemberSession,
        plan: Plan,
        kind: CheckoutKind,
    ) -> Self {
        Self {
            bin: BinResolver::new(payments.clone()),
            payments,
            membership,
            session,
            kind,
            pricing: Mutex::new(Pricing {
                plan,
                upgrade_info: None,
            }),
            idempotency_key: Mutex::new(IdempotencyKey::generate()),
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    /// Checkout for a first membership on `plan`
    pub fn new_membership(
        payments: Arc<dyn PaymentApi>,
        membership: Arc<dyn MembershipApi>,
        session: MemberSession,
        plan: Plan,
    ) -> Self {
        Self::new(payments, membership, session, plan, CheckoutKind::NewMembership)
    }

    /// Checkout for moving an existing member to `new_plan`
    pub fn upgrade(
        payments: Arc<dyn PaymentApi>,
        membership: Arc<dyn MembershipApi>,
        session: MemberSession,
        new_plan: Plan,
    ) -> Self {
        Self::new(payments, membership, session, new_plan, CheckoutKind::Upgrade)
    }

    pub const fn kind(&self) -> &CheckoutKind {
        &self.kind
    }

    pub const fn is_upgrade(&self) -> bool {
        matches!(self.kind, CheckoutKind::Upgrade)
    }

    pub fn plan(&self) -> Plan {
        self.pricing().plan.clone()
    }

    pub fn upgrade_info(&self) -> Option<UpgradeInfo> {
        self.pricing().upgrade_info.clone()
    }

    fn pricing(&self) -> MutexGuard<'_, Pricing> {
        self.pricing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Key the next submission will carry
    pub fn idempotency_key(&self) -> IdempotencyKey {
        self.idempotency_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> SubmissionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reload the amount from the backend
    ///
    /// New memberships refresh the plan price; upgrades fetch the proration.
    /// The returned value is what the member is shown and charged.
    pub async fn refresh_charge_amount(&self) -> Result<Decimal> {
        let plan_id = self.pricing().plan.id.clone();

        match self.kind {
            CheckoutKind::NewMembership => {
                let plan = self.membership.get_plan(&plan_id).await?;
                self.pricing().plan = plan;
            }
            CheckoutKind::Upgrade => {
                let info = self
                    .membership
                    .upgrade_cost(&self.session.user_id, &plan_id)
                    .await?;
                self.pricing().upgrade_info = Some(info);
            }
        }

        Ok(self.charge_amount()?)
    }

    /// Amount to display, from the last backend answer
    pub fn charge_amount(&self) -> fitdesk_checkout::Result<Decimal> {
        let pricing = self.pricing();
        resolve_charge_amount(&pricing.plan, self.is_upgrade(), pricing.upgrade_info.as_ref())
    }

    /// Apply a card number keystroke
    ///
    /// Returns the display string and, when the BIN changed, a ticket to pass
    /// to [`CheckoutFlow::resolve_payment_method`].
    pub fn on_card_number(
        &self,
        input: &mut PaymentInput,
        raw: &str,
    ) -> (String, Option<BinTicket>) {
        let display = input.set_card_number(raw);
        let ticket = self.bin.request(input.card_number());
        (display, ticket)
    }

    /// Run the BIN lookup for `ticket` and apply it if still current
    ///
    /// Returns whether `input` was updated. A failed lookup can be retried by
    /// the next keystroke.
    pub async fn resolve_payment_method(
        &self,
        input: &mut PaymentInput,
        ticket: &BinTicket,
    ) -> Result<bool> {
        match self.bin.resolve(ticket).await? {
            Some(id) if input.bin() == Some(ticket.bin()) => {
                input.apply_payment_method(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Whether the submit control should be enabled
    pub fn can_submit(&self, input: &PaymentInput, today: NaiveDate) -> bool {
        let idle = matches!(
            self.state(),
            SubmissionState::Idle | SubmissionState::Failed(_)
        );
        idle && self.charge_amount().is_ok() && input.validate(today).is_ok()
    }

    /// Submit the payment
    ///
    /// `payer` takes explicit first/last names; without it the cardholder name
    /// (or the profile display name) is split.
    pub async fn submit(
        &self,
        input: &PaymentInput,
        payer: Option<PayerName>,
    ) -> Result<PaymentOutcome> {
        self.submit_on(input, payer, Utc::now().date_naive()).await
    }

    /// [`CheckoutFlow::submit`] with an explicit date for the expiry check
    pub async fn submit_on(
        &self,
        input: &PaymentInput,
        payer: Option<PayerName>,
        today: NaiveDate,
    ) -> Result<PaymentOutcome> {
        self.begin()?;

        let result = self.process(input, payer, today).await;

        let next = match &result {
            Ok(outcome) => SubmissionState::Succeeded(outcome.clone()),
            Err(e) => {
                if matches!(e, ApiError::Checkout(CheckoutError::Rejected { .. })) {
                    *self
                        .idempotency_key
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = IdempotencyKey::generate();
                }
                SubmissionState::Failed(e.user_message())
            }
        };
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;

        result
    }

    fn begin(&self) -> std::result::Result<(), CheckoutError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SubmissionState::Submitting => Err(CheckoutError::AlreadySubmitting),
            SubmissionState::Succeeded(_) => Err(CheckoutError::AlreadyCompleted),
            SubmissionState::Idle | SubmissionState::Failed(_) => {
                *state = SubmissionState::Submitting;
                Ok(())
            }
        }
    }

    async fn process(
        &self,
        input: &PaymentInput,
        payer: Option<PayerName>,
        today: NaiveDate,
    ) -> Result<PaymentOutcome> {
        let card = input.validate(today)?;

        let displayed = self.charge_amount()?;
        let amount = self.refresh_charge_amount().await?;
        if amount != displayed {
            tracing::warn!(
                displayed = %displayed,
                current = %amount,
                "Charge amount changed before submission"
            );
            return Err(CheckoutError::AmountChanged {
                displayed,
                current: amount,
            }
            .into());
        }

        let pricing = self.pricing().clone();
        let idempotency_key = self.idempotency_key();

        tracing::info!(
            user_id = %self.session.user_id,
            plan_id = %pricing.plan.id,
            upgrade = self.is_upgrade(),
            amount = %amount,
            last_four = %input.last_four(),
            idempotency_key = %idempotency_key,
            "Submitting payment"
        );

        let token = self.payments.create_card_token(&card).await?;

        let payer = payer.unwrap_or_else(|| {
            if card.cardholder_name.is_empty() {
                PayerName::from_display_name(&self.session.display_name)
            } else {
                PayerName::from_display_name(&card.cardholder_name)
            }
        });

        let payload = build_payment_request(PaymentRequestParams {
            session: &self.session,
            plan: &pricing.plan,
            is_upgrade: self.is_upgrade(),
            upgrade_info: pricing.upgrade_info.as_ref(),
            payer,
            card_token: &token.id,
            payment_method_id: &card.payment_method_id,
            identification_number: &card.identification_number,
            idempotency_key: &idempotency_key,
        })?;

        let response = self.payments.submit(&payload).await?;

        match response.outcome() {
            Ok(outcome) => {
                tracing::info!(
                    status = %response.status.as_str(),
                    payment_id = ?response.id,
                    "Payment accepted"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    status = %response.status.as_str(),
                    detail = ?response.status_detail,
                    "Payment rejected"
                );
                Err(e.into())
            }
        }
    }
}
