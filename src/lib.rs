//! KANTOR — multi-currency wallet and exchange service
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod conversion;
pub mod rates;
pub mod storage;
pub mod auth;
pub mod wallet;
pub mod api;
