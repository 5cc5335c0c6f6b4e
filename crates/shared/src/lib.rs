//! Shared types, errors, and configuration for Clinipay.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for payments, bookings and refunds
//! - Application-wide error taxonomy
//! - Configuration management
//! - Bearer credential validation

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use jwt::{JwtError, JwtService};
