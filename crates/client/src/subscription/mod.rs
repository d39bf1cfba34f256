//! Subscription gate in front of privileged actions.
//!
//! # States
//!
//! ```text
//! Unknown ──check──▶ Checking ──▶ Allowed | Blocked
//! Blocked ──purchase──▶ PaymentInProgress ──▶ Allowed | Blocked
//! ```
//!
//! [`SubscriptionGate::check`] is advisory: it only drives what the UI shows.
//! [`SubscriptionGate::attempt`] is authoritative: whenever the server answers
//! a privileged request with `subscription_required` the gate becomes
//! `Blocked`, whatever the advisory check said.
//!
//! The current state is published through a `watch` channel.

mod checkout;

pub use checkout::{CheckoutError, CheckoutWidget};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use nutriscan_core::{PendingPayment, ProviderConfirmation, SubscriptionStatus, VerifiedSubscription};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::api::NutriScanApi;
use crate::error::ClientError;

/// State of the subscription gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// Nothing known yet, or the last check failed.
    #[default]
    Unknown,
    /// Advisory status check in flight.
    Checking,
    /// Privileged actions are expected to succeed.
    Allowed,
    /// A subscription is needed.
    Blocked,
    /// Checkout and verification in flight.
    PaymentInProgress,
}

impl GateState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Checking => "checking",
            Self::Allowed => "allowed",
            Self::Blocked => "blocked",
            Self::PaymentInProgress => "payment in progress",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a gated action.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Attempt<T> {
    Completed(T),
    /// The server required a subscription; the gate is now `Blocked`.
    Blocked,
}

impl<T> Attempt<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Blocked => None,
        }
    }
}

/// Result of a payment flow that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The server verified the payment and granted the entitlement.
    Activated(VerifiedSubscription),
    /// The user dismissed the checkout.
    Cancelled,
}

// =============================================================================
// SubscriptionGate
// =============================================================================

/// Shared handle to the subscription gate.
#[derive(Clone)]
pub struct SubscriptionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    api: NutriScanApi,
    state: watch::Sender<GateState>,
}

impl fmt::Debug for SubscriptionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGate")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SubscriptionGate {
    #[must_use]
    pub fn new(api: NutriScanApi) -> Self {
        let (state, _) = watch::channel(GateState::Unknown);
        Self {
            inner: Arc::new(GateInner { api, state }),
        }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.inner.state.subscribe()
    }

    /// Advisory status check, typically on screen entry.
    ///
    /// Moves to `Checking` and then to `Allowed` or `Blocked`. A payment in
    /// progress and an authoritative `Blocked` are left alone; the fresh
    /// status is still returned.
    ///
    /// # Errors
    ///
    /// Propagates the status request failure after resetting a pending check
    /// to `Unknown`.
    #[instrument(skip(self))]
    pub async fn check(&self) -> Result<SubscriptionStatus, ClientError> {
        self.inner.state.send_if_modified(|state| match state {
            GateState::Unknown | GateState::Allowed => {
                *state = GateState::Checking;
                true
            }
            GateState::Checking | GateState::Blocked | GateState::PaymentInProgress => false,
        });

        match self.inner.api.subscription_status().await {
            Ok(status) => {
                let next = if status.active {
                    GateState::Allowed
                } else {
                    GateState::Blocked
                };
                self.replace(GateState::Checking, next);
                Ok(status)
            }
            Err(e) => {
                self.replace(GateState::Checking, GateState::Unknown);
                Err(e)
            }
        }
    }

    /// Run a privileged action under the gate.
    ///
    /// # Errors
    ///
    /// Errors other than `SubscriptionRequired` propagate unchanged. An
    /// authentication failure also resets the gate to `Unknown`.
    pub async fn attempt<T, F, Fut>(&self, action: F) -> Result<Attempt<T>, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        match action().await {
            Ok(value) => {
                self.settle(GateState::Allowed);
                Ok(Attempt::Completed(value))
            }
            Err(ClientError::SubscriptionRequired) => {
                info!("Privileged action requires a subscription");
                self.settle(GateState::Blocked);
                Ok(Attempt::Blocked)
            }
            Err(e) => {
                if e.requires_login() {
                    self.settle(GateState::Unknown);
                }
                Err(e)
            }
        }
    }

    /// Buy a subscription through `widget`. Only valid while `Blocked`.
    ///
    /// # Errors
    ///
    /// - `InvalidGateTransition` if the gate is not `Blocked`
    /// - `PaymentFailed` if the provider failed the charge
    /// - `PaymentVerificationFailed` if the user was charged but the server
    ///   did not grant the entitlement
    /// - any error creating the order
    #[instrument(skip_all)]
    pub async fn purchase<W: CheckoutWidget>(
        &self,
        widget: &W,
    ) -> Result<PaymentOutcome, ClientError> {
        let mut current = GateState::Blocked;
        let started = self.inner.state.send_if_modified(|state| {
            current = *state;
            if *state == GateState::Blocked {
                *state = GateState::PaymentInProgress;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ClientError::InvalidGateTransition {
                state: current,
                action: "start a payment",
            });
        }

        let guard = PaymentGuard {
            state: &self.inner.state,
        };
        let outcome = self.run_payment(widget).await;
        let next = match &outcome {
            Ok(PaymentOutcome::Activated(_)) => GateState::Allowed,
            Ok(PaymentOutcome::Cancelled) | Err(_) => GateState::Blocked,
        };
        guard.finish(next);
        outcome
    }

    async fn run_payment<W: CheckoutWidget>(
        &self,
        widget: &W,
    ) -> Result<PaymentOutcome, ClientError> {
        let order = self.inner.api.create_order().await?;
        info!(order_id = %order.order_id, amount = %order.price(), "Created payment order");
        let expected_order = order.order_id.clone();
        let mut pending = PendingPayment::new(order);

        let confirmation = match widget.begin_checkout(pending.order()).await {
            Ok(confirmation) => confirmation,
            Err(CheckoutError::Cancelled) => {
                info!(order_id = %expected_order, "Checkout cancelled");
                return Ok(PaymentOutcome::Cancelled);
            }
            Err(CheckoutError::ProviderFailure(reason)) => {
                warn!(order_id = %expected_order, reason = %reason, "Payment provider failure");
                return Err(ClientError::PaymentFailed(reason));
            }
        };

        let confirmation = match pending.confirm(confirmation) {
            Ok(confirmation) => confirmation.clone(),
            Err(foreign) => {
                error!(
                    order_id = %expected_order,
                    confirmed_order_id = %foreign.order_id,
                    payment_id = %foreign.payment_id,
                    "Checkout confirmed a different order"
                );
                return Err(ClientError::PaymentVerificationFailed {
                    detail: format!("confirmation is for order {}", foreign.order_id),
                    order_id: expected_order,
                    payment_id: foreign.payment_id,
                });
            }
        };

        let failure = |detail: String| {
            error!(
                order_id = %confirmation.order_id,
                payment_id = %confirmation.payment_id,
                detail = %detail,
                "Payment verification failed"
            );
            ClientError::PaymentVerificationFailed {
                order_id: confirmation.order_id.clone(),
                payment_id: confirmation.payment_id.clone(),
                detail,
            }
        };

        match self.inner.api.verify_subscription(&confirmation).await {
            Ok(verified) if verified.is_active() => {
                info!(order_id = %confirmation.order_id, "Subscription activated");
                Ok(PaymentOutcome::Activated(verified))
            }
            Ok(verified) => Err(failure(verified.message.unwrap_or_else(|| {
                format!(
                    "subscription status is {}",
                    verified.status.as_deref().unwrap_or("unknown")
                )
            }))),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    /// Explicit, user-initiated verification of a provider confirmation,
    /// e.g. after a checkout completed outside this process.
    ///
    /// Repeating it is safe; the server deduplicates by order id.
    ///
    /// # Errors
    ///
    /// - `InvalidGateTransition` while a payment is in progress
    /// - `AuthExpired` if the session was rejected
    /// - `PaymentVerificationFailed` for any other failure, including a
    ///   rejected signature or an unreachable server; the state is left as is
    #[instrument(skip_all, fields(order_id = %confirmation.order_id))]
    pub async fn verify(
        &self,
        confirmation: &ProviderConfirmation,
    ) -> Result<VerifiedSubscription, ClientError> {
        let state = self.state();
        if state == GateState::PaymentInProgress {
            return Err(ClientError::InvalidGateTransition {
                state,
                action: "verify a payment",
            });
        }

        let failure = |detail: String| {
            error!(
                order_id = %confirmation.order_id,
                payment_id = %confirmation.payment_id,
                detail = %detail,
                "Payment verification failed"
            );
            ClientError::PaymentVerificationFailed {
                order_id: confirmation.order_id.clone(),
                payment_id: confirmation.payment_id.clone(),
                detail,
            }
        };

        let verified = match self.inner.api.verify_subscription(confirmation).await {
            Ok(verified) => verified,
            Err(e @ (ClientError::AuthExpired { .. } | ClientError::SubscriptionRequired)) => {
                return Err(e);
            }
            Err(e) => return Err(failure(e.to_string())),
        };
        if !verified.is_active() {
            return Err(failure(
                verified
                    .message
                    .unwrap_or_else(|| "subscription not activated".to_string()),
            ));
        }
        self.settle(GateState::Allowed);
        Ok(verified)
    }

    /// Attempt `action`; if blocked, run the payment flow and, once the
    /// subscription is active, retry the action exactly once.
    ///
    /// # Errors
    ///
    /// Same as [`SubscriptionGate::attempt`] and
    /// [`SubscriptionGate::purchase`].
    pub async fn attempt_with_payment<T, W, F, Fut>(
        &self,
        widget: &W,
        action: F,
    ) -> Result<Attempt<T>, ClientError>
    where
        W: CheckoutWidget,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if let Attempt::Completed(value) = self.attempt(&action).await? {
            return Ok(Attempt::Completed(value));
        }

        match self.purchase(widget).await? {
            PaymentOutcome::Cancelled => Ok(Attempt::Blocked),
            PaymentOutcome::Activated(_) => self.attempt(&action).await,
        }
    }

    /// Move to `next` unless a payment is in progress.
    fn settle(&self, next: GateState) {
        self.inner.state.send_if_modified(|state| {
            if *state == GateState::PaymentInProgress || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    /// Move from `from` to `to`; no-op in any other state.
    fn replace(&self, from: GateState, to: GateState) {
        self.inner.state.send_if_modified(|state| {
            if *state == from && from != to {
                *state = to;
                true
            } else {
                false
            }
        });
    }
}

/// Returns the gate to `Blocked` if a payment flow is dropped midway.
struct PaymentGuard<'a> {
    state: &'a watch::Sender<GateState>,
}

impl PaymentGuard<'_> {
    fn finish(self, next: GateState) {
        self.state.send_replace(next);
        std::mem::forget(self);
    }
}

impl Drop for PaymentGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if *state == GateState::PaymentInProgress {
                *state = GateState::Blocked;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_state_display() {
        assert_eq!(GateState::default(), GateState::Unknown);
        assert_eq!(GateState::PaymentInProgress.to_string(), "payment in progress");
        assert_eq!(GateState::Blocked.to_string(), "blocked");
    }

    #[test]
    fn test_attempt_completed() {
        assert_eq!(Attempt::Completed(3).completed(), Some(3));
        assert_eq!(Attempt::<u8>::Blocked.completed(), None);
    }

    #[test]
    fn test_payment_guard_resets_on_drop() {
        let (state, _rx) = watch::channel(GateState::PaymentInProgress);
        {
            let _guard = PaymentGuard { state: &state };
        }
        assert_eq!(*state.borrow(), GateState::Blocked);
    }

    #[test]
    fn test_payment_guard_finish() {
        let (state, _rx) = watch::channel(GateState::PaymentInProgress);
        PaymentGuard { state: &state }.finish(GateState::Allowed);
        assert_eq!(*state.borrow(), GateState::Allowed);
    }
}
