use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use fitdesk_api::{
    ApiError, CardToken, CheckoutFlow, MockMembershipApi, MockPaymentApi, PaymentApi,
    SubmissionState,
};
use fitdesk_checkout::{
    Brand, CardDetails, CheckoutError, MemberSession, NewMembershipPayment, PayerName,
    PaymentInput, PaymentMethodId, PaymentOutcome, PaymentResponse, PaymentStatus, Plan,
    UpgradePayment,
};
use rust_decimal_macros::dec;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn session() -> MemberSession {
    MemberSession::new("u-1", "ana@example.com", "Ana María Torres")
}

struct Harness {
    payments: Arc<MockPaymentApi>,
    membership: Arc<MockMembershipApi>,
}

impl Harness {
    fn new() -> Self {
        let membership = Arc::new(MockMembershipApi::new());
        membership.set_current_plan("u-1", "basic");
        Self {
            payments: Arc::new(MockPaymentApi::new()),
            membership,
        }
    }

    fn new_membership(&self) -> CheckoutFlow {
        CheckoutFlow::new_membership(
            self.payments.clone(),
            self.membership.clone(),
            session(),
            Plan::new("premium", "Premium", dec!(89.90)),
        )
    }

    fn upgrade(&self) -> CheckoutFlow {
        CheckoutFlow::upgrade(
            self.payments.clone(),
            self.membership.clone(),
            session(),
            Plan::new("elite", "Elite", dec!(129.90)),
        )
    }
}

/// Payment API whose first BIN lookups fail with a 503
struct FlakyLookups {
    inner: MockPaymentApi,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyLookups {
    fn new(failures: usize) -> Self {
        Self {
            inner: MockPaymentApi::new(),
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PaymentApi for FlakyLookups {
    async fn create_card_token(&self, card: &CardDetails) -> fitdesk_api::Result<CardToken> {
        self.inner.create_card_token(card).await
    }

    async fn lookup_payment_method(&self, bin: &str) -> fitdesk_api::Result<PaymentMethodId> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ApiError::Http {
                status: 503,
                message: "Service unavailable".into(),
            });
        }
        self.inner.lookup_payment_method(bin).await
    }

    async fn process_payment(
        &self,
        payment: &NewMembershipPayment,
    ) -> fitdesk_api::Result<PaymentResponse> {
        self.inner.process_payment(payment).await
    }

    async fn process_upgrade(
        &self,
        payment: &UpgradePayment,
    ) -> fitdesk_api::Result<PaymentResponse> {
        self.inner.process_upgrade(payment).await
    }

    fn name(&self) -> &str {
        "FlakyLookups"
    }
}

async fn fill_card(flow: &CheckoutFlow, input: &mut PaymentInput, card: &str) {
    let (_, ticket) = flow.on_card_number(input, card);
    if let Some(ticket) = ticket {
        flow.resolve_payment_method(input, &ticket).await.unwrap();
    }
    input.set_expiry("12/28");
    input.set_security_code("123");
    input.set_identification("30.123.456");
}

#[tokio::test]
async fn test_new_membership_checkout() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    assert_eq!(flow.refresh_charge_amount().await.unwrap(), dec!(89.90));

    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "4111111111111111").await;
    assert_eq!(input.payment_method_id().unwrap().as_str(), "visa");
    assert!(flow.can_submit(&input, today()));

    let outcome = flow
        .submit_on(&input, Some(PayerName::new("Ana María", "Torres")), today())
        .await
        .unwrap();

    assert!(outcome.is_approved());
    assert_eq!(harness.payments.charge_count(), 1);
    assert!(matches!(flow.state(), SubmissionState::Succeeded(_)));
    assert!(!flow.can_submit(&input, today()));
}

#[tokio::test]
async fn test_backend_price_wins_over_cached_price() {
    let harness = Harness::new();
    harness.membership.set_price("premium", dec!(95.00));

    let flow = harness.new_membership();
    assert_eq!(flow.charge_amount(), Ok(dec!(89.90)));
    assert_eq!(flow.refresh_charge_amount().await.unwrap(), dec!(95.00));
}

#[tokio::test]
async fn test_price_change_after_refresh_is_not_charged() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    assert_eq!(flow.refresh_charge_amount().await.unwrap(), dec!(89.90));

    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "4111111111111111").await;
    harness.membership.set_price("premium", dec!(99.90));

    let key = flow.idempotency_key();
    let err = flow.submit_on(&input, None, today()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Checkout(CheckoutError::AmountChanged { displayed, current })
            if displayed == dec!(89.90) && current == dec!(99.90)
    ));
    assert_eq!(harness.payments.charge_count(), 0);
    assert_eq!(flow.charge_amount(), Ok(dec!(99.90)));
    assert_eq!(flow.idempotency_key(), key);

    // member saw the new price and confirms
    flow.submit_on(&input, None, today()).await.unwrap();
    assert_eq!(harness.payments.charged_amounts(), vec![dec!(99.90)]);
}

#[tokio::test]
async fn test_submit_checks_backend_price_without_refresh() {
    let harness = Harness::new();
    harness.membership.set_price("premium", dec!(95.00));
    let flow = harness.new_membership();

    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "4111111111111111").await;

    let err = flow.submit_on(&input, None, today()).await.unwrap_err();
    assert!(matches!(err, ApiError::Checkout(CheckoutError::AmountChanged { .. })));
    assert_eq!(harness.payments.charge_count(), 0);

    flow.submit_on(&input, None, today()).await.unwrap();
    assert_eq!(harness.payments.charged_amounts(), vec![dec!(95.00)]);
}

#[tokio::test]
async fn test_submit_after_success_is_refused() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "4111111111111111").await;

    flow.submit_on(&input, None, today()).await.unwrap();
    let err = flow.submit_on(&input, None, today()).await.unwrap_err();

    assert!(matches!(err, ApiError::Checkout(CheckoutError::AlreadyCompleted)));
    assert_eq!(harness.payments.charge_count(), 1);
}

#[tokio::test]
async fn test_concurrent_submissions_charge_once() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "4111111111111111").await;

    let (a, b) = tokio::join!(
        flow.submit_on(&input, None, today()),
        flow.submit_on(&input, None, today()),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let err = a.err().or(b.err()).unwrap();
    assert!(matches!(
        err,
        ApiError::Checkout(CheckoutError::AlreadySubmitting | CheckoutError::AlreadyCompleted)
    ));
    assert_eq!(harness.payments.charge_count(), 1);
}

#[tokio::test]
async fn test_stale_bin_answer_is_discarded() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();

    let (_, visa_ticket) = flow.on_card_number(&mut input, "411111");
    let visa_ticket = visa_ticket.unwrap();

    // member corrects the number before the first lookup returns
    let (_, master_ticket) = flow.on_card_number(&mut input, "550000");
    let master_ticket = master_ticket.unwrap();

    assert!(flow.resolve_payment_method(&mut input, &master_ticket).await.unwrap());
    assert!(!flow.resolve_payment_method(&mut input, &visa_ticket).await.unwrap());

    assert_eq!(input.payment_method_id().unwrap().as_str(), "master");
    assert_eq!(input.detected_brand(), Brand::Mastercard);
    assert_eq!(harness.payments.lookups(), vec!["550000", "411111"]);
}

#[tokio::test]
async fn test_lookup_fires_once_per_prefix() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();

    let mut tickets = Vec::new();
    for typed in ["4", "41", "411", "4111", "41111", "411111", "4111111", "41111111"] {
        let (_, ticket) = flow.on_card_number(&mut input, typed);
        tickets.extend(ticket);
    }

    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].bin(), "411111");
}

#[tokio::test]
async fn test_failed_lookup_is_retried_on_next_keystroke() {
    let payments = Arc::new(FlakyLookups::new(1));
    let flow = CheckoutFlow::new_membership(
        payments.clone(),
        Arc::new(MockMembershipApi::new()),
        session(),
        Plan::new("premium", "Premium", dec!(89.90)),
    );
    let mut input = PaymentInput::new();

    let (_, ticket) = flow.on_card_number(&mut input, "411111");
    let err = flow
        .resolve_payment_method(&mut input, &ticket.unwrap())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(input.payment_method_id().is_none());

    let (_, retry) = flow.on_card_number(&mut input, "4111111");
    let retry = retry.unwrap();
    assert_eq!(retry.bin(), "411111");
    assert!(flow.resolve_payment_method(&mut input, &retry).await.unwrap());
    assert_eq!(input.payment_method_id().unwrap().as_str(), "visa");

    let (_, ticket) = flow.on_card_number(&mut input, "4111111111111111");
    assert!(ticket.is_none());
    assert_eq!(payments.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_local_brand_never_reaches_request() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();

    // typed fast enough that no lookup was resolved
    flow.on_card_number(&mut input, "4111111111111111");
    input.set_expiry("1228");
    input.set_security_code("123");
    input.set_identification("30123456");
    assert_eq!(input.detected_brand(), Brand::Visa);

    let err = flow.submit_on(&input, None, today()).await.unwrap_err();
    assert!(matches!(err, ApiError::Checkout(CheckoutError::MissingPaymentMethod)));
    assert_eq!(harness.payments.charge_count(), 0);
    assert!(matches!(flow.state(), SubmissionState::Failed(_)));
}

#[tokio::test]
async fn test_rejection_then_resubmission() {
    let harness = Harness {
        payments: Arc::new(MockPaymentApi::with_status(
            PaymentStatus::Other("rejected".into()),
            "cc_rejected_insufficient_amount",
        )),
        membership: Arc::new(MockMembershipApi::new()),
    };
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "5500000000000004").await;

    let first_key = flow.idempotency_key();
    let err = flow.submit_on(&input, None, today()).await.unwrap_err();
    match &err {
        ApiError::Checkout(CheckoutError::Rejected { detail, .. }) => {
            assert_eq!(detail, "cc_rejected_insufficient_amount");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.user_message().contains("cc_rejected_insufficient_amount"));
    assert_eq!(
        flow.state(),
        SubmissionState::Failed(err.user_message())
    );
    assert_ne!(flow.idempotency_key(), first_key);

    harness.payments.set_status(PaymentStatus::Pending, "pending_contingency");
    let outcome = flow.submit_on(&input, None, today()).await.unwrap();
    assert_eq!(outcome, PaymentOutcome::Pending { payment_id: Some("pay_2".into()) });
    assert_eq!(harness.payments.charge_count(), 2);
}

#[tokio::test]
async fn test_precondition_failure_keeps_key() {
    let harness = Harness::new();
    let flow = harness.new_membership();
    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "4111111111111111").await;
    input.set_expiry("01/24");

    let key = flow.idempotency_key();
    let err = flow.submit_on(&input, None, today()).await.unwrap_err();
    assert!(matches!(err, ApiError::Checkout(CheckoutError::CardExpired { .. })));
    assert_eq!(flow.idempotency_key(), key);
}

#[tokio::test]
async fn test_upgrade_requires_fetched_cost() {
    let harness = Harness::new();
    let flow = harness.upgrade();
    let mut input = PaymentInput::new();
    fill_card(&flow, &mut input, "340000000000009").await;
    input.set_security_code("1234");

    assert!(!flow.can_submit(&input, today()));
    let err = flow.submit_on(&input, None, today()).await.unwrap_err();
    assert!(matches!(err, ApiError::Checkout(CheckoutError::MissingUpgradeCost { .. })));
    assert_eq!(harness.payments.charge_count(), 0);

    assert_eq!(flow.refresh_charge_amount().await.unwrap(), dec!(40.00));
    assert!(flow.can_submit(&input, today()));
    let outcome = flow.submit_on(&input, None, today()).await.unwrap();
    assert!(outcome.is_approved());
    assert_eq!(harness.payments.charge_count(), 1);
}

#[tokio::test]
async fn test_duplicate_delivery_is_deduplicated() {
    let payments = MockPaymentApi::new();
    let session = session();
    let plan = Plan::new("basic", "Basic", dec!(49.90));
    let method_id = fitdesk_checkout::PaymentMethodId::from_bin_lookup("visa");
    let key = fitdesk_checkout::IdempotencyKey::generate();

    let payload = fitdesk_checkout::build_payment_request(fitdesk_checkout::PaymentRequestParams {
        session: &session,
        plan: &plan,
        is_upgrade: false,
        upgrade_info: None,
        payer: PayerName::from_display_name(&session.display_name),
        card_token: "tok_1",
        payment_method_id: &method_id,
        identification_number: "30123456",
        idempotency_key: &key,
    })
    .unwrap();

    let first = payments.submit(&payload).await.unwrap();
    let second = payments.submit(&payload).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(payments.charge_count(), 1);
}
