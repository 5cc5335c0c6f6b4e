//! Request middleware.

pub mod auth;

pub use auth::{AuthUser, auth_middleware, require_staff_role};
