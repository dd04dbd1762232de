//! Agora CLI library.
//!
//! Holds the catalogue fixture format so it can be validated outside the
//! `agora` binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fixture;
