//! Agora Core - Shared domain types.
//!
//! This crate provides common types used across all Agora components:
//! - `commerce` - Repositories, catalogue filtering, checkout, notifications
//! - `storefront` - Public-facing catalogue, cart and checkout API
//! - `admin` - Administrative console API
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, contact values, money, statuses, the order
//!   state machine and the API response envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
