//! Centralized error handling for the persistence facade
//!
//! This module provides the error taxonomy shared by every layer of the
//! crate, so that callers can always tell an absent record (`Ok(None)`)
//! apart from a failed operation (`Err(..)`).
//!
//! # Error Categories
//!
//! - **Database Errors**: connection, query and constraint failures raised by SeaORM
//! - **Codec Errors**: typed value serialization/deserialization failures
//! - **Migration Errors**: script discovery, checksum validation and execution
//! - **Worker Errors**: a spawned operation panicked or was cancelled
//!
//! # Usage
//!
//! ```rust
//! use brick_orm::errors::{ContextError, ContextResult};
//!
//! fn example_function() -> ContextResult<String> {
//!     Err(ContextError::operation("nothing to do"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using ContextError
pub type ContextResult<T> = Result<T, ContextError>;

/// Convenience type alias for Migration Results
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Convenience type alias for Codec Results
pub type CodecResult<T> = Result<T, CodecError>;
