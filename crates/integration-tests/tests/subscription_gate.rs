//! Integration tests for the subscription gate and payment flow.
//!
//! The mock service grants two free scans, then answers `402` with
//! `subscription_required` until a verified payment activates the plan.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;

use nutriscan_client::{
    Attempt, CheckoutError, CheckoutWidget, ClientError, GateState, MealPhoto, NutriScanClient,
    PaymentOutcome, SubscriptionGate,
};
use nutriscan_core::{Credential, MealType, OrderDescriptor, ProviderConfirmation};
use nutriscan_integration_tests::{
    FREE_SCANS, MockApi, PLAN_AMOUNT_PAISE, Script, ScriptedCheckout, signature_for,
};
use serde_json::json;

const EMAIL: &str = "ravi@example.com";

async fn signed_in(mock: &MockApi, dir: &tempfile::TempDir) -> NutriScanClient {
    let token = mock.seed_user(EMAIL, "secret", "Ravi");
    let client = mock.client(dir.path()).await;
    client.session().sign_in(Credential::new(token)).unwrap();
    client
}

fn photo() -> MealPhoto {
    MealPhoto::new("breakfast.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
}

/// Use up the free trial.
async fn exhaust_trial(client: &NutriScanClient) {
    for _ in 0..FREE_SCANS {
        client
            .api()
            .analyze_meal(&photo(), MealType::Breakfast)
            .await
            .unwrap();
    }
}

/// Drive the gate to `Blocked` the way the UI does: attempt and get refused.
async fn block(client: &NutriScanClient) {
    exhaust_trial(client).await;
    let meal_photo = photo();
    let attempt = client
        .gate()
        .attempt(|| client.api().analyze_meal(&meal_photo, MealType::Lunch))
        .await
        .unwrap();
    assert_eq!(attempt, Attempt::Blocked);
    assert_eq!(client.gate().state(), GateState::Blocked);
}

// =============================================================================
// Advisory checks and authoritative refusals
// =============================================================================

#[tokio::test]
async fn test_check_with_trial_left_allows() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    assert_eq!(client.gate().state(), GateState::Unknown);

    let status = client.gate().check().await.unwrap();
    assert!(status.active);
    assert!(status.is_trial);
    assert_eq!(status.free_scans_total, FREE_SCANS);
    assert_eq!(client.gate().state(), GateState::Allowed);
}

#[tokio::test]
async fn test_check_after_trial_blocks() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    exhaust_trial(&client).await;

    let status = client.gate().check().await.unwrap();
    assert!(!status.active);
    assert_eq!(status.remaining_free_scans(), 0);
    assert_eq!(client.gate().state(), GateState::Blocked);
}

#[tokio::test]
async fn test_subscription_required_wins_over_advisory_check() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;

    client.gate().check().await.unwrap();
    assert_eq!(client.gate().state(), GateState::Allowed);

    // The status endpoint still claims an active trial, but the analysis
    // endpoint refuses.
    mock.fail("/meals/analyze", 402, json!("subscription_required"));
    let meal_photo = photo();
    let attempt = client
        .gate()
        .attempt(|| client.api().analyze_meal(&meal_photo, MealType::Dinner))
        .await
        .unwrap();
    assert_eq!(attempt, Attempt::Blocked);
    assert_eq!(client.gate().state(), GateState::Blocked);

    let status = client.gate().check().await.unwrap();
    assert!(status.active);
    assert_eq!(client.gate().state(), GateState::Blocked);
}

#[tokio::test]
async fn test_auth_failure_resets_gate() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    client.gate().check().await.unwrap();

    mock.revoke_tokens();
    let meal_photo = photo();
    let err = client
        .gate()
        .attempt(|| client.api().analyze_meal(&meal_photo, MealType::Snack))
        .await
        .unwrap_err();
    assert!(err.requires_login());
    assert_eq!(client.gate().state(), GateState::Unknown);
}

#[tokio::test]
async fn test_failed_check_returns_to_unknown() {
    let mut mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    mock.shutdown().await;

    let err = client.gate().check().await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(client.gate().state(), GateState::Unknown);
}

#[tokio::test]
async fn test_purchase_requires_blocked() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    let checkout = ScriptedCheckout::new([Script::Pay]);

    let err = client.gate().purchase(&checkout).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::InvalidGateTransition {
            state: GateState::Unknown,
            ..
        }
    ));
    assert!(checkout.orders().is_empty());
}

// =============================================================================
// Payment flow
// =============================================================================

#[tokio::test]
async fn test_blocked_action_pays_and_retries_once() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    exhaust_trial(&client).await;
    let mut states = client.gate().watch();
    let checkout = ScriptedCheckout::new([Script::Pay]);

    let attempt = client
        .api()
        .analyze_meal_gated(client.gate(), &checkout, &photo(), MealType::Lunch)
        .await
        .unwrap();

    let result = attempt.completed().unwrap();
    assert_eq!(result.meal_name, "Idli sambar");
    assert_eq!(client.gate().state(), GateState::Allowed);
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), GateState::Allowed);

    // Two trial scans, the refused attempt and exactly one retry.
    assert_eq!(mock.analyze_calls(), FREE_SCANS + 2);
    assert_eq!(mock.verify_calls(), 1);

    let orders = checkout.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].amount, PLAN_AMOUNT_PAISE);
    assert_eq!(orders[0].prefill.email.as_deref(), Some(EMAIL));
}

#[tokio::test]
async fn test_cancelled_checkout_stays_blocked() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    exhaust_trial(&client).await;
    let checkout = ScriptedCheckout::new([Script::Cancel]);

    let attempt = client
        .api()
        .analyze_meal_gated(client.gate(), &checkout, &photo(), MealType::Lunch)
        .await
        .unwrap();

    assert_eq!(attempt, Attempt::Blocked);
    assert_eq!(client.gate().state(), GateState::Blocked);
    assert_eq!(mock.analyze_calls(), FREE_SCANS + 1);
    assert_eq!(mock.verify_calls(), 0);
}

#[tokio::test]
async fn test_rejected_signature_is_verification_failure() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;
    let checkout = ScriptedCheckout::new([Script::PayWithBadSignature]);

    let err = client.gate().purchase(&checkout).await.unwrap_err();
    match &err {
        ClientError::PaymentVerificationFailed {
            order_id,
            payment_id,
            detail,
        } => {
            assert_eq!(order_id, &checkout.orders()[0].order_id);
            assert_eq!(payment_id, &format!("pay_for_{order_id}"));
            assert!(detail.contains("Payment verification failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().ends_with("please contact support"));
    assert_eq!(client.gate().state(), GateState::Blocked);
    assert_eq!(mock.verify_calls(), 1);
}

#[tokio::test]
async fn test_confirmation_for_other_order_is_not_submitted() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;
    let checkout = ScriptedCheckout::new([Script::PayForOtherOrder]);

    let err = client.gate().purchase(&checkout).await.unwrap_err();
    assert!(matches!(err, ClientError::PaymentVerificationFailed { .. }));
    assert_eq!(mock.verify_calls(), 0);
    assert_eq!(client.gate().state(), GateState::Blocked);
}

#[tokio::test]
async fn test_provider_failure_is_payment_failed() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;
    let checkout = ScriptedCheckout::new([Script::Fail("card declined".to_string())]);

    let err = client.gate().purchase(&checkout).await.unwrap_err();
    assert!(matches!(err, ClientError::PaymentFailed(ref reason) if reason == "card declined"));
    assert_eq!(client.gate().state(), GateState::Blocked);
    assert_eq!(mock.verify_calls(), 0);
}

#[tokio::test]
async fn test_repeated_verification_yields_same_entitlement() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;
    let checkout = ScriptedCheckout::new([Script::Pay]);

    let first = match client.gate().purchase(&checkout).await.unwrap() {
        PaymentOutcome::Activated(verified) => verified,
        PaymentOutcome::Cancelled => panic!("checkout was scripted to pay"),
    };

    let order_id = checkout.orders()[0].order_id.clone();
    let payment_id = format!("pay_for_{order_id}");
    let confirmation = ProviderConfirmation {
        signature: signature_for(&order_id, &payment_id),
        order_id,
        payment_id,
    };
    let second = client.gate().verify(&confirmation).await.unwrap();

    assert_eq!(first.expires_at, second.expires_at);
    assert_eq!(client.gate().state(), GateState::Allowed);
    let history = client.api().subscription_history().await.unwrap();
    assert_eq!(history.subscriptions.len(), 1);
}

#[tokio::test]
async fn test_externally_verified_payment_unblocks() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;

    let order = client.api().create_order().await.unwrap();
    let payment_id = "pay_external".to_string();
    let confirmation = ProviderConfirmation {
        signature: signature_for(&order.order_id, &payment_id),
        order_id: order.order_id,
        payment_id,
    };
    let verified = client.gate().verify(&confirmation).await.unwrap();
    assert!(verified.is_active());
    assert_eq!(client.gate().state(), GateState::Allowed);
}

#[tokio::test]
async fn test_externally_forged_signature_asks_for_support() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;

    let order = client.api().create_order().await.unwrap();
    let confirmation = ProviderConfirmation {
        order_id: order.order_id.clone(),
        payment_id: "pay_forged".to_string(),
        signature: "forged".to_string(),
    };
    let err = client.gate().verify(&confirmation).await.unwrap_err();

    match &err {
        ClientError::PaymentVerificationFailed {
            order_id,
            payment_id,
            detail,
        } => {
            assert_eq!(order_id, &order.order_id);
            assert_eq!(payment_id, "pay_forged");
            assert!(detail.contains("Payment verification failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("contact support"));
    assert_eq!(client.gate().state(), GateState::Blocked);
    assert_eq!(mock.verify_calls(), 1);
}

// =============================================================================
// State during checkout
// =============================================================================

/// Widget that inspects the gate while the checkout is open.
struct Probe {
    gate: SubscriptionGate,
    seen: Mutex<Option<GateState>>,
    verify_refused: Mutex<bool>,
}

impl CheckoutWidget for Probe {
    async fn begin_checkout(
        &self,
        order: &OrderDescriptor,
    ) -> Result<ProviderConfirmation, CheckoutError> {
        *self.seen.lock().unwrap() = Some(self.gate.state());

        let confirmation = ProviderConfirmation {
            order_id: order.order_id.clone(),
            payment_id: "pay_probe".to_string(),
            signature: signature_for(&order.order_id, "pay_probe"),
        };
        let refused = matches!(
            self.gate.verify(&confirmation).await,
            Err(ClientError::InvalidGateTransition { .. })
        );
        *self.verify_refused.lock().unwrap() = refused;
        Err(CheckoutError::Cancelled)
    }
}

#[tokio::test]
async fn test_gate_is_locked_while_checkout_is_open() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;
    let probe = Probe {
        gate: client.gate().clone(),
        seen: Mutex::new(None),
        verify_refused: Mutex::new(false),
    };

    let outcome = client.gate().purchase(&probe).await.unwrap();
    assert_eq!(outcome, PaymentOutcome::Cancelled);
    assert_eq!(*probe.seen.lock().unwrap(), Some(GateState::PaymentInProgress));
    assert!(*probe.verify_refused.lock().unwrap());
    assert_eq!(mock.verify_calls(), 0);
    assert_eq!(client.gate().state(), GateState::Blocked);
}

#[tokio::test]
async fn test_abandoned_payment_returns_to_blocked() {
    let mock = MockApi::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = signed_in(&mock, &dir).await;
    block(&client).await;

    /// Never completes.
    struct Hang;
    impl CheckoutWidget for Hang {
        async fn begin_checkout(
            &self,
            _order: &OrderDescriptor,
        ) -> Result<ProviderConfirmation, CheckoutError> {
            std::future::pending().await
        }
    }

    let gate = client.gate().clone();
    let task = tokio::spawn(async move { gate.purchase(&Hang).await });
    let mut states = client.gate().watch();
    states
        .wait_for(|state| *state == GateState::PaymentInProgress)
        .await
        .unwrap();

    task.abort();
    let _ = task.await;
    assert_eq!(client.gate().state(), GateState::Blocked);
}
