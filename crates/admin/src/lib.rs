//! Agora Admin library.
//!
//! This crate provides the admin console JSON API as a library, allowing it
//! to be tested and reused.
//!
//! # Security
//!
//! Admin sessions are separate from customer sessions and live in
//! `admin.session`. Every route except login requires an admin, and writes
//! are further gated by [`agora_core::AdminRole`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
