//! Versioned SQL migrations
//!
//! Scripts live in one directory per platform below the migrations root
//! (`dbmigrations/sqlite`, `dbmigrations/postgresql`, `dbmigrations/mysql`)
//! or are compiled into the binary. [`MigrationRunner`] applies them at
//! startup; [`MigrationGenerator`] writes new scripts from registered
//! entities.

pub mod db_migration;
mod generator;
mod runner;
mod script;

pub use generator::MigrationGenerator;
pub use runner::{AppliedMigration, MigrationReport, MigrationRunner, MigrationSource};
pub use script::{MigrationScript, MigrationVersion, load_directory};
