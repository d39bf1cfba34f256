//! Subscription commands.
//!
//! # Usage
//!
//! ```bash
//! # Trial counters or plan expiry
//! nutriscan status
//!
//! # Pay through the terminal checkout
//! nutriscan subscribe
//!
//! # Verify a payment completed elsewhere (safe to repeat)
//! nutriscan verify --order-id order_x --payment-id pay_y --signature abc
//! ```

use nutriscan_client::{NutriScanClient, PaymentOutcome};
use nutriscan_core::ProviderConfirmation;

use super::{CliError, say};
use crate::checkout::TerminalCheckout;
use crate::render;

/// # Errors
///
/// Returns an error if the status cannot be fetched.
pub async fn status(client: &NutriScanClient) -> Result<(), CliError> {
    let status = client.gate().check().await?;
    say(&render::subscription_status(&status));
    Ok(())
}

/// Buy a subscription unless one is already active.
///
/// # Errors
///
/// Returns an error if the payment fails or cannot be verified.
pub async fn subscribe(client: &NutriScanClient) -> Result<(), CliError> {
    let gate = client.gate();
    let status = gate.check().await?;
    if status.active {
        say(&render::subscription_status(&status));
        return Ok(());
    }

    match gate.purchase(&TerminalCheckout).await? {
        PaymentOutcome::Activated(verified) => say(&render::activation(&verified)),
        PaymentOutcome::Cancelled => say("Checkout cancelled; no payment was taken."),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the server does not activate the subscription.
pub async fn verify(
    client: &NutriScanClient,
    order_id: String,
    payment_id: String,
    signature: String,
) -> Result<(), CliError> {
    let confirmation = ProviderConfirmation {
        order_id,
        payment_id,
        signature,
    };
    let verified = client.gate().verify(&confirmation).await?;
    say(&render::activation(&verified));
    Ok(())
}

/// # Errors
///
/// Returns an error if the history cannot be fetched.
pub async fn history(client: &NutriScanClient) -> Result<(), CliError> {
    let history = client.api().subscription_history().await?;
    say(&render::subscription_history(&history));
    Ok(())
}
