//! Checkout widget for the terminal.
//!
//! Prints the order and reads the provider's confirmation fields from stdin.
//! An empty line (or end of input) cancels the checkout.

use nutriscan_client::{CheckoutError, CheckoutWidget};
use nutriscan_core::{OrderDescriptor, ProviderConfirmation};

use crate::commands::{notice, prompt};
use crate::render;

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalCheckout;

impl CheckoutWidget for TerminalCheckout {
    async fn begin_checkout(
        &self,
        order: &OrderDescriptor,
    ) -> Result<ProviderConfirmation, CheckoutError> {
        notice(&render::order(order));
        notice("Complete the payment with the provider, then paste the confirmation.");

        let Some(payment_id) = read_field("Payment id (empty to cancel): ").await? else {
            return Err(CheckoutError::Cancelled);
        };
        let Some(signature) = read_field("Signature (empty to cancel): ").await? else {
            return Err(CheckoutError::Cancelled);
        };

        Ok(ProviderConfirmation {
            order_id: order.order_id.clone(),
            payment_id,
            signature,
        })
    }
}

async fn read_field(label: &str) -> Result<Option<String>, CheckoutError> {
    match prompt(label).await {
        Ok(Some(value)) if !value.is_empty() => Ok(Some(value)),
        Ok(_) => Ok(None),
        Err(e) => Err(CheckoutError::ProviderFailure(format!(
            "could not read confirmation: {e}"
        ))),
    }
}
