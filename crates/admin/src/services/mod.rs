//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Email and password authentication for admin users
//! - `uniqueness` - Text uniqueness checker client

pub mod auth;
pub mod uniqueness;

pub use auth::{AdminAuthService, AuthError};
pub use uniqueness::{PollOutcome, UniquenessClient, UniquenessError};
