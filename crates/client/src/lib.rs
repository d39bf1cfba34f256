//! NutriScan Client - Resilient data access for the meal analysis service.
//!
//! Components, each a cheaply cloneable handle:
//! - [`SessionStore`] - Current credential, persisted and observable
//! - [`RequestGateway`] - Authenticated requests and response classification
//! - [`SubscriptionGate`] - Paywall state machine and payment flow
//! - [`OfflineCache`] - Network-first cache for public reads
//! - [`NutriScanApi`] - Typed endpoint operations
//!
//! [`NutriScanClient`] wires them together from a [`ClientConfig`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod storage;
pub mod subscription;

pub use api::{DEFAULT_HISTORY_DAYS, MealPhoto, MealQuery, NutriScanApi};
pub use cache::{CachePolicy, CacheVersion, Fetched, OfflineCache, Source};
pub use client::NutriScanClient;
pub use config::{CacheConfig, ClientConfig, ConfigError};
pub use error::ClientError;
pub use gateway::{Body, Part, RequestGateway};
pub use session::{SessionEvent, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use subscription::{
    Attempt, CheckoutError, CheckoutWidget, GateState, PaymentOutcome, SubscriptionGate,
};
