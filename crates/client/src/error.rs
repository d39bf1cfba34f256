//! Error taxonomy for the data-access layer.
//!
//! Only two failures are ever handled inside the client: a `401` clears the
//! session before [`ClientError::AuthExpired`] is returned, and a transport
//! failure on a cacheable read is answered from the offline cache. Every
//! other error propagates to the caller unchanged.

use thiserror::Error;

use crate::storage::StorageError;
use crate::subscription::GateState;

/// Detail string the service uses to signal an exhausted entitlement.
pub const SUBSCRIPTION_REQUIRED_DETAIL: &str = "subscription_required";

/// Errors that can occur when talking to the NutriScan service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered `401`; the session has already been cleared.
    #[error("authentication failed: {detail}")]
    AuthExpired {
        /// Server-provided reason.
        detail: String,
    },

    /// The privileged action needs an active subscription.
    #[error("subscription required")]
    SubscriptionRequired,

    /// The provider charged the user but the server did not grant the
    /// entitlement. Needs manual support follow-up; never retried.
    #[error(
        "payment {payment_id} for order {order_id} could not be verified ({detail}); please contact support"
    )]
    PaymentVerificationFailed {
        /// Server-issued order id.
        order_id: String,
        /// Provider-issued payment id.
        payment_id: String,
        /// Why verification failed.
        detail: String,
    },

    /// The payment provider reported a failure before any confirmation.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// Transport-level failure (connect error, timeout, dropped connection).
    #[error("network unavailable: {0}")]
    NetworkUnavailable(#[source] reqwest::Error),

    /// Any other non-success status, with the server-provided detail.
    #[error("request failed ({status}): {detail}")]
    Request {
        /// HTTP status code.
        status: u16,
        /// Server-provided detail or a generic message.
        detail: String,
    },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    Build(#[source] reqwest::Error),

    /// A success response did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request path did not form a valid URL.
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading or writing persisted client state failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The subscription gate cannot perform the action from its current state.
    #[error("cannot {action} while the subscription gate is {state}")]
    InvalidGateTransition {
        /// Current gate state.
        state: GateState,
        /// Attempted action.
        action: &'static str,
    },
}

impl ClientError {
    /// Classify a `reqwest` failure raised while sending or reading.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Build(err)
        } else {
            Self::NetworkUnavailable(err)
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired { .. } => Some(401),
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }

    /// Whether the user must log in again before continuing.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_display() {
        let err = ClientError::Request {
            status: 400,
            detail: "Email already registered".to_string(),
        };
        assert_eq!(err.to_string(), "request failed (400): Email already registered");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_verification_failure_mentions_support() {
        let err = ClientError::PaymentVerificationFailed {
            order_id: "order_1".to_string(),
            payment_id: "pay_1".to_string(),
            detail: "Payment verification failed".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("pay_1"));
        assert!(message.contains("contact support"));
    }

    #[test]
    fn test_auth_expired_requires_login() {
        let err = ClientError::AuthExpired {
            detail: "Invalid token".to_string(),
        };
        assert!(err.requires_login());
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_network());
    }

    #[test]
    fn test_gate_transition_display() {
        let err = ClientError::InvalidGateTransition {
            state: GateState::Allowed,
            action: "start a payment",
        };
        assert_eq!(
            err.to_string(),
            "cannot start a payment while the subscription gate is allowed"
        );
    }
}
