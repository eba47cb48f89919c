//! brick-orm: an asynchronous persistence facade over SeaORM
//!
//! - [`context`]: the [`DatabaseContext`](context::DatabaseContext) facade
//!   and its SeaORM implementation
//! - [`data`]: typed values stored as nullable strings
//! - [`database`]: connections, entity registry and startup migrations

pub mod config;
pub mod context;
pub mod data;
pub mod database;
pub mod errors;
pub mod observability;

pub use config::{Config, DatabaseConfig};
pub use context::{DatabaseContext, SeaOrmDatabaseContext, Task};
pub use data::{SerializableType, SerializableValue};
pub use database::{Database, DatabaseType, EntityRegistry};
pub use errors::{ContextError, ContextResult};
