//! BeFit Core - Domain types and business rules.
//!
//! This crate provides the types shared by every BeFit component:
//! - `api` - HTTP JSON service for the store and the admin dashboard
//! - `cli` - Command-line tools for migrations, seeding and scheduled jobs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Rules that decide money or state (order transitions,
//! loyalty tiers, totals) live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, and status enums
//! - [`order`] - Order state machine and totals
//! - [`loyalty`] - Tier selection, point accrual, and shipping benefits
//! - [`fitness`] - Plan recommendation from a fitness goal

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fitness;
pub mod loyalty;
pub mod order;
pub mod types;

pub use types::*;
