//! Payment widget capability.

use std::future::Future;

use nutriscan_core::{OrderDescriptor, ProviderConfirmation};
use thiserror::Error;

/// Why a checkout did not produce a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The user dismissed the widget. Not an error for the payment flow.
    #[error("checkout cancelled")]
    Cancelled,
    /// The provider declined or failed the charge.
    #[error("payment provider failure: {0}")]
    ProviderFailure(String),
}

/// Third-party checkout that charges the user for an issued order.
///
/// Implementations open whatever UI the platform offers (an embedded widget,
/// a browser tab, a terminal prompt) and resolve once the user completes or
/// abandons the payment.
pub trait CheckoutWidget: Send + Sync {
    /// Charge the user for `order`.
    fn begin_checkout(
        &self,
        order: &OrderDescriptor,
    ) -> impl Future<Output = Result<ProviderConfirmation, CheckoutError>> + Send;
}
