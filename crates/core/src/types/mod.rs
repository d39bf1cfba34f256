//! Core types for NutriScan.
//!
//! This module provides type-safe wrappers and wire records for the
//! nutrition-analysis service.

pub mod credential;
pub mod dashboard;
pub mod id;
pub mod meal;
pub mod payment;
pub mod price;
pub mod profile;
pub mod service;
pub mod status;
pub mod subscription;
pub mod timestamp;

pub use credential::{AuthResponse, Credential, LoginRequest, RegisterRequest};
pub use dashboard::{DailySummary, Dashboard, HistoryDashboard, LifetimeStats, TodayDashboard};
pub use id::*;
pub use meal::{
    DeleteMealResponse, InsulinResistance, Macros, MealAnalysisResult, MealItem, MealList,
    MealRecord, Micronutrients, SugarSpike,
};
pub use payment::{OrderDescriptor, PendingPayment, Prefill, ProviderConfirmation};
pub use price::{CurrencyCode, Price};
pub use profile::{ProfileUpdate, UserProfile};
pub use service::{HealthStatus, MessageResponse};
pub use status::*;
pub use subscription::{
    SubscriptionHistory, SubscriptionRecord, SubscriptionStatus, VerifiedSubscription,
};
