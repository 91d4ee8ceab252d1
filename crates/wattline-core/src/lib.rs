//! Core types and algorithms for the Wattline power monitor.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod store;
pub mod timeline;

pub use error::{Error, Result};
