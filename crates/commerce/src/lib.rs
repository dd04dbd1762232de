//! Agora Commerce - shared data and workflow layer.
//!
//! Both the storefront and the admin binary talk to the same `PostgreSQL`
//! database. This crate owns everything they share:
//!
//! - [`db`] - Connection pool and repositories for every table
//! - [`catalogue`] - Faceted catalogue queries built from URL filter segments
//! - [`checkout`] - Turning a cart into an order inside one transaction
//! - [`notify`] - SMS and email notifications about orders
//! - [`password`] - Argon2 password hashing for customers and admins

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalogue;
pub mod checkout;
pub mod db;
pub mod notify;
pub mod password;
