//! BeFit API library.
//!
//! The HTTP service is built as a library so the CLI and the integration tests
//! can reuse its repositories, services and router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod validation;
