//! NutriScan Core - Shared domain types.
//!
//! This crate provides the types exchanged between the NutriScan client
//! components and the analysis service:
//! - `client` - Session, request gateway, subscription gate and offline cache
//! - `cli` - Terminal front end for the client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! Wire shapes follow the service's JSON responses so they deserialize
//! directly from `reqwest` bodies.
//!
//! # Modules
//!
//! - [`types`] - Credentials, ids, prices, statuses, subscription, payment,
//!   meal analysis, dashboard and profile records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
