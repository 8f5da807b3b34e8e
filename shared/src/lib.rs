//! Shared types and models for the Fertilizer Procurement Platform
//!
//! This crate holds the settlement engine: batches, delivery orders and the
//! per-buyer allocation and distribution records, together with the
//! rounding policy, role checks and lifecycle rules. It performs no I/O.

pub mod apportion;
pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
