//! LiquiFund Core - Shared domain types.
//!
//! This crate provides the types used across the LiquiFund components:
//! - `web` - Server-rendered front end that talks to the LiquiFund REST API
//! - `integration-tests` - Scenario tests against an in-process fake backend
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks. Anything that needs the current time takes it as an
//! argument.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, phone numbers, money,
//!   statuses and the rental plan catalogue

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
