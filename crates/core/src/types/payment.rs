//! Checkout and payment-confirmation types.
//!
//! # Flow
//!
//! 1. The server issues an [`OrderDescriptor`] (`POST /subscription/create-order`)
//! 2. The payment widget charges the user and yields a [`ProviderConfirmation`]
//! 3. The confirmation is sent back to the server for signature verification
//!
//! [`PendingPayment`] ties steps 1 and 2 together for the lifetime of one
//! checkout attempt.

use serde::{Deserialize, Serialize};

use super::price::{CurrencyCode, Price};

/// Data needed to open the third-party checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescriptor {
    pub order_id: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: CurrencyCode,
    /// Public provider key id.
    pub key_id: String,
    /// Merchant name shown in the widget.
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub prefill: Prefill,
}

impl OrderDescriptor {
    #[must_use]
    pub fn price(&self) -> Price {
        Price::from_minor_units(self.amount, self.currency)
    }
}

/// Customer details pre-filled into the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Fields the payment provider returns after a completed charge.
///
/// Serialized with the provider's field names because the server verifies
/// the signature over exactly these values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderConfirmation {
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

/// Correlation between an issued order and the provider's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayment {
    order: OrderDescriptor,
    confirmation: Option<ProviderConfirmation>,
}

impl PendingPayment {
    #[must_use]
    pub const fn new(order: OrderDescriptor) -> Self {
        Self {
            order,
            confirmation: None,
        }
    }

    #[must_use]
    pub const fn order(&self) -> &OrderDescriptor {
        &self.order
    }

    #[must_use]
    pub const fn confirmation(&self) -> Option<&ProviderConfirmation> {
        self.confirmation.as_ref()
    }

    /// Attach the provider confirmation.
    ///
    /// # Errors
    ///
    /// Returns the confirmation back if it was issued for a different order.
    pub fn confirm(
        &mut self,
        confirmation: ProviderConfirmation,
    ) -> Result<&ProviderConfirmation, ProviderConfirmation> {
        if confirmation.order_id != self.order.order_id {
            return Err(confirmation);
        }
        Ok(self.confirmation.insert(confirmation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderDescriptor {
        serde_json::from_str(
            r#"{
                "order_id": "order_123",
                "amount": 30000,
                "currency": "INR",
                "key_id": "rzp_test_key",
                "name": "NutriScan",
                "description": "NutriScan Pro - 3 Months",
                "prefill": {"name": "Asha", "email": "asha@example.com"}
            }"#,
        )
        .expect("deserialize")
    }

    #[test]
    fn test_order_descriptor_price() {
        assert_eq!(order().price().to_string(), "₹300.00");
    }

    #[test]
    fn test_confirmation_uses_provider_field_names() {
        let confirmation = ProviderConfirmation {
            order_id: "order_123".to_string(),
            payment_id: "pay_456".to_string(),
            signature: "sig".to_string(),
        };
        let value = serde_json::to_value(&confirmation).expect("serialize");
        assert_eq!(value["razorpay_order_id"], "order_123");
        assert_eq!(value["razorpay_payment_id"], "pay_456");
        assert_eq!(value["razorpay_signature"], "sig");
    }

    #[test]
    fn test_pending_payment_rejects_foreign_order() {
        let mut pending = PendingPayment::new(order());
        let foreign = ProviderConfirmation {
            order_id: "order_999".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        assert!(pending.confirm(foreign).is_err());
        assert!(pending.confirmation().is_none());

        let own = ProviderConfirmation {
            order_id: "order_123".to_string(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        assert!(pending.confirm(own).is_ok());
        assert_eq!(
            pending.confirmation().map(|c| c.payment_id.as_str()),
            Some("pay_1")
        );
    }
}
