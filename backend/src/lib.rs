//! Fertilizer Procurement Platform - backend
//!
//! Persistence, permissions and reporting around the settlement engine in
//! the `shared` crate.

pub mod config;
pub mod error;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
