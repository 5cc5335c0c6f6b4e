//! Refund proof storage using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Apache OpenDAL                              │
//! │                   (Unified Storage API)                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ op.write("key", data)      │ op.presign_read("key", duration)   │
//! │ op.read("key")             │ op.delete("key")                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod proof;
mod service;

pub use config::{StorageConfig, UploadLimits};
pub use error::StorageError;
pub use proof::{PresignedUrl, ProofStore, sha256_hex};
pub use service::{StorageService, proof_key, sanitize_filename};
