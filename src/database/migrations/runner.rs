//! Startup migration runner
//!
//! Resolves the platform of the live connection, reads the scripts for that
//! platform and applies the ones not yet recorded in `db_migration`, each in
//! its own transaction. There is no cross-process lock: run a single migrator
//! per schema. MySQL commits DDL implicitly, so a failing MySQL script may
//! leave earlier statements of that script applied.

use chrono::Utc;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, Schema, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::db_migration;
use super::script::{MigrationScript, MigrationVersion, load_directory, sort_scripts};
use crate::config::DatabaseConfig;
use crate::database::DatabaseType;
use crate::errors::{MigrationError, MigrationResult};

/// Where migration scripts come from
#[derive(Debug, Clone)]
pub enum MigrationSource {
    /// `<root>/<platform>/*.sql`
    Directory(PathBuf),
    /// Scripts compiled into the binary, keyed by platform name
    Embedded(BTreeMap<String, Vec<MigrationScript>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: String,
    pub name: String,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub platform: String,
    /// Scripts applied by this run, in order
    pub applied: Vec<AppliedMigration>,
    /// Scripts that were already applied before this run
    pub skipped: usize,
}

impl MigrationReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

#[derive(Debug, Clone)]
pub struct MigrationRunner {
    source: MigrationSource,
    platform: Option<String>,
}

impl MigrationRunner {
    pub fn from_directory(root: impl Into<PathBuf>) -> Self {
        Self {
            source: MigrationSource::Directory(root.into()),
            platform: None,
        }
    }

    /// Runner over scripts compiled in with `include_str!`
    pub fn embedded<I, P>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<MigrationScript>)>,
        P: Into<String>,
    {
        let scripts = scripts
            .into_iter()
            .map(|(platform, scripts)| (platform.into(), scripts))
            .collect();
        Self {
            source: MigrationSource::Embedded(scripts),
            platform: None,
        }
    }

    /// Directory runner honouring `migrations_path` and `dialect`
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::from_directory(&config.migrations_path).with_platform(config.dialect.clone())
    }

    /// Use a fixed platform name instead of the one of the live connection
    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn source(&self) -> &MigrationSource {
        &self.source
    }

    /// The platform directory name for a backend
    pub fn platform(&self, backend: DatabaseBackend) -> String {
        match &self.platform {
            Some(platform) => platform.to_lowercase(),
            None => DatabaseType::from_backend(backend).platform_name().to_string(),
        }
    }

    /// Every script known for a platform, sorted by version
    pub fn scripts(&self, platform: &str) -> MigrationResult<Vec<MigrationScript>> {
        match &self.source {
            MigrationSource::Directory(root) => load_directory(&platform_dir(root, platform)),
            MigrationSource::Embedded(scripts) => {
                sort_scripts(scripts.get(platform).cloned().unwrap_or_default())
            }
        }
    }

    /// Rows of the tracking table, oldest version first
    pub async fn applied(connection: &DatabaseConnection) -> MigrationResult<Vec<db_migration::Model>> {
        ensure_tracking_table(connection).await?;
        let mut rows = db_migration::Entity::find().all(connection).await?;
        rows.sort_by_cached_key(|row| MigrationVersion::parse(&row.version));
        Ok(rows)
    }

    /// Scripts that `run` would apply
    pub async fn pending(&self, connection: &DatabaseConnection) -> MigrationResult<Vec<MigrationScript>> {
        let (_, pending, _) = self.plan(connection).await?;
        Ok(pending)
    }

    /// Apply every pending script
    pub async fn run(&self, connection: &DatabaseConnection) -> MigrationResult<MigrationReport> {
        let (platform, pending, skipped) = self.plan(connection).await?;
        info!(
            "Running database migrations for platform '{}' ({} pending, {} already applied)",
            platform,
            pending.len(),
            skipped
        );

        let mut applied = Vec::with_capacity(pending.len());
        for script in &pending {
            applied.push(apply_script(connection, script).await?);
        }

        info!("Database migrations completed successfully");
        Ok(MigrationReport {
            platform,
            applied,
            skipped,
        })
    }

    async fn plan(
        &self,
        connection: &DatabaseConnection,
    ) -> MigrationResult<(String, Vec<MigrationScript>, usize)> {
        let platform = self.platform(connection.get_database_backend());
        let scripts = self.scripts(&platform)?;
        if scripts.is_empty() {
            info!("No migrations found for platform '{}'", platform);
        }

        let applied: Vec<(Option<MigrationVersion>, db_migration::Model)> = Self::applied(connection)
            .await?
            .into_iter()
            .map(|row| (MigrationVersion::parse(&row.version), row))
            .collect();

        let mut pending = Vec::new();
        let mut skipped = 0;
        for script in scripts {
            let record = applied
                .iter()
                .find(|(version, _)| version.as_ref() == Some(script.version()))
                .map(|(_, row)| row);
            match record {
                Some(row) if row.checksum != script.checksum() => {
                    return Err(MigrationError::ChecksumMismatch {
                        version: script.version().to_string(),
                        applied: row.checksum.clone(),
                        found: script.checksum().to_string(),
                    });
                }
                Some(_) => skipped += 1,
                None => pending.push(script),
            }
        }

        Ok((platform, pending, skipped))
    }
}

fn platform_dir(root: &Path, platform: &str) -> PathBuf {
    root.join(platform)
}

async fn ensure_tracking_table(connection: &DatabaseConnection) -> MigrationResult<()> {
    let backend = connection.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(db_migration::Entity);
    statement.if_not_exists();
    connection.execute(backend.build(&statement)).await?;
    Ok(())
}

async fn apply_script(
    connection: &DatabaseConnection,
    script: &MigrationScript,
) -> MigrationResult<AppliedMigration> {
    let version = script.version().to_string();
    info!("Applying migration {} ({})", version, script.name());

    // sent whole, trigger and function bodies contain `;`
    let txn = connection.begin().await?;
    debug!("Executing migration script:\n{}", script.sql());
    if let Err(source) = txn.execute_unprepared(script.sql()).await {
        if let Err(rollback_error) = txn.rollback().await {
            warn!("Rollback of migration {} failed: {}", version, rollback_error);
        }
        return Err(MigrationError::ScriptFailed { version, source });
    }

    let record = db_migration::ActiveModel {
        version: Set(version.clone()),
        name: Set(script.name().to_string()),
        checksum: Set(script.checksum().to_string()),
        applied_at: Set(Utc::now()),
    };
    db_migration::Entity::insert(record)
        .exec_without_returning(&txn)
        .await?;
    txn.commit().await?;

    Ok(AppliedMigration {
        version,
        name: script.name().to_string(),
        checksum: script.checksum().to_string(),
    })
}
