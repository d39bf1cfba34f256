//! Subscription entitlement records.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::id::SubscriptionRecordId;
use super::price::{CurrencyCode, Price};
use super::timestamp;

/// Entitlement snapshot from `GET /subscription/status`.
///
/// Paid subscribers get `active`, `plan` and `expires_at`; trial users get
/// the free-scan counters instead. Never cached: every screen entry fetches
/// a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionStatus {
    pub active: bool,
    #[serde(default)]
    pub is_trial: bool,
    #[serde(default)]
    pub free_scans_used: u32,
    #[serde(default)]
    pub free_scans_total: u32,
    /// Plan currently held (paid subscribers only).
    #[serde(default)]
    pub plan: Option<String>,
    /// Plan on offer.
    #[serde(default)]
    pub plan_name: Option<String>,
    /// Plan price in rupees.
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub plan_amount: Option<Decimal>,
    #[serde(default)]
    pub plan_duration_days: Option<u32>,
    #[serde(default, with = "timestamp::option")]
    pub expires_at: Option<NaiveDateTime>,
    /// Public key id the checkout widget is opened with.
    #[serde(default, rename = "razorpay_key_id")]
    pub provider_key_id: Option<String>,
}

impl SubscriptionStatus {
    /// Free scans left in the trial allowance.
    #[must_use]
    pub const fn remaining_free_scans(&self) -> u32 {
        self.free_scans_total.saturating_sub(self.free_scans_used)
    }

    /// Name of the held plan, falling back to the plan on offer.
    #[must_use]
    pub fn plan_label(&self) -> Option<&str> {
        self.plan.as_deref().or(self.plan_name.as_deref())
    }

    #[must_use]
    pub fn plan_price(&self) -> Option<Price> {
        self.plan_amount
            .map(|amount| Price::new(amount, CurrencyCode::INR))
    }
}

/// Response of `POST /subscription/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifiedSubscription {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub expires_at: Option<NaiveDateTime>,
}

impl VerifiedSubscription {
    /// Whether the server granted the entitlement.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false) || self.status.as_deref() == Some("active")
    }
}

/// One row of `GET /subscription/history`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionRecordId,
    pub amount_paise: i64,
    pub status: String,
    #[serde(default, with = "timestamp::option")]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub expires_at: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<NaiveDateTime>,
}

impl SubscriptionRecord {
    #[must_use]
    pub fn amount(&self) -> Price {
        Price::from_minor_units(self.amount_paise, CurrencyCode::INR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionHistory {
    pub subscriptions: Vec<SubscriptionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_status() {
        let json = r#"{
            "active": false,
            "free_scans_used": 3,
            "free_scans_total": 3,
            "is_trial": true,
            "plan_name": "NutriScan Pro",
            "plan_amount": 300.0,
            "plan_duration_days": 90,
            "razorpay_key_id": "rzp_test_key"
        }"#;
        let status: SubscriptionStatus = serde_json::from_str(json).expect("deserialize");
        assert!(!status.active);
        assert!(status.is_trial);
        assert_eq!(status.remaining_free_scans(), 0);
        assert_eq!(status.plan_label(), Some("NutriScan Pro"));
        assert_eq!(
            status.plan_price().map(|p| p.to_string()).as_deref(),
            Some("₹300.00")
        );
        assert_eq!(status.provider_key_id.as_deref(), Some("rzp_test_key"));
    }

    #[test]
    fn test_paid_status() {
        let json = r#"{
            "active": true,
            "expires_at": "2026-06-01T10:00:00.000001",
            "plan": "NutriScan Pro",
            "plan_name": "NutriScan Pro",
            "plan_amount": 300.0
        }"#;
        let status: SubscriptionStatus = serde_json::from_str(json).expect("deserialize");
        assert!(status.active);
        assert!(!status.is_trial);
        assert!(status.expires_at.is_some());
    }

    #[test]
    fn test_remaining_free_scans_saturates() {
        let json = r#"{"active": false, "free_scans_used": 5, "free_scans_total": 2}"#;
        let status: SubscriptionStatus = serde_json::from_str(json).expect("deserialize");
        assert_eq!(status.remaining_free_scans(), 0);
    }

    #[test]
    fn test_verified_subscription_shapes() {
        let by_status: VerifiedSubscription =
            serde_json::from_str(r#"{"status": "active", "message": "ok"}"#).expect("status");
        assert!(by_status.is_active());
        let by_flag: VerifiedSubscription =
            serde_json::from_str(r#"{"active": true}"#).expect("flag");
        assert!(by_flag.is_active());
        let pending: VerifiedSubscription =
            serde_json::from_str(r#"{"status": "created"}"#).expect("pending");
        assert!(!pending.is_active());
    }
}
