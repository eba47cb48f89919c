//! Generates migration scripts from registered entities

use sea_orm::{ConnectOptions, Database as SeaOrmDatabase};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::info;

use super::runner::{MigrationReport, MigrationRunner};
use super::script::{MigrationScript, MigrationVersion, load_directory};
use crate::database::{DatabaseType, EntityRegistry};
use crate::errors::{MigrationError, MigrationResult};

/// Writes `<root>/<platform>/<version>__<description>.sql` holding the
/// `CREATE TABLE` statements of registered entities that no earlier script
/// of the platform creates
#[derive(Debug, Clone)]
pub struct MigrationGenerator {
    root: PathBuf,
    platforms: Option<Vec<DatabaseType>>,
}

impl MigrationGenerator {
    /// Generator for every supported platform
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            platforms: None,
        }
    }

    /// Restrict generation to the given platforms; may be called repeatedly
    pub fn platform(mut self, database_type: DatabaseType) -> Self {
        let platforms = self.platforms.get_or_insert_with(Vec::new);
        if !platforms.contains(&database_type) {
            platforms.push(database_type);
        }
        self
    }

    pub fn platforms(&self) -> Vec<DatabaseType> {
        match &self.platforms {
            Some(platforms) => platforms.clone(),
            None => DatabaseType::iter().collect(),
        }
    }

    pub fn platform_dir(&self, database_type: DatabaseType) -> PathBuf {
        self.root.join(database_type.platform_name())
    }

    /// The script body for one platform, holding only the tables that no
    /// script in `existing` creates; `None` when every table is covered
    pub fn render(
        &self,
        registry: &EntityRegistry,
        database_type: DatabaseType,
        existing: &[MigrationScript],
    ) -> Option<String> {
        let created: HashSet<String> = existing
            .iter()
            .flat_map(|script| created_tables(script.sql()))
            .collect();
        let statements: Vec<String> = registry
            .table_names()
            .into_iter()
            .zip(registry.create_table_sql(database_type))
            .filter(|(table, _)| !created.contains(&table.to_ascii_lowercase()))
            .map(|(_, sql)| sql)
            .collect();
        if statements.is_empty() {
            return None;
        }

        let mut sql = format!(
            "-- generated by brick-orm for {}\n",
            database_type.platform_name()
        );
        for statement in statements {
            sql.push('\n');
            sql.push_str(&statement);
            sql.push_str(";\n");
        }
        Some(sql)
    }

    /// The version after the newest script of a platform, or `1.0`
    pub fn next_version(&self, database_type: DatabaseType) -> MigrationResult<MigrationVersion> {
        let scripts = load_directory(&self.platform_dir(database_type))?;
        Ok(scripts
            .last()
            .map(|script| script.version().next())
            .unwrap_or_else(MigrationVersion::initial))
    }

    /// Write one script per platform with new tables and return the written paths
    pub fn generate(
        &self,
        registry: &EntityRegistry,
        version: &str,
        description: &str,
    ) -> MigrationResult<Vec<PathBuf>> {
        let name = script_name(description).ok_or_else(|| MigrationError::InvalidScriptName {
            name: description.to_string(),
        })?;

        let raw_version = version;
        let version = MigrationVersion::parse(raw_version).ok_or_else(|| MigrationError::InvalidScriptName {
            name: raw_version.to_string(),
        })?;

        let mut scripts = Vec::new();
        for database_type in self.platforms() {
            let existing = load_directory(&self.platform_dir(database_type))?;
            if existing.iter().any(|script| script.version() == &version) {
                return Err(MigrationError::DuplicateVersion {
                    version: version.to_string(),
                });
            }
            match self.render(registry, database_type, &existing) {
                Some(sql) => scripts.push((database_type, MigrationScript::new(raw_version, name.as_str(), sql)?)),
                None => info!(
                    "Every registered table already has a {} migration, nothing to generate",
                    database_type.platform_name()
                ),
            }
        }

        let mut written = Vec::new();
        for (database_type, script) in scripts {
            let dir = self.platform_dir(database_type);
            std::fs::create_dir_all(&dir).map_err(|e| MigrationError::io(&dir, e))?;
            let path = dir.join(script.file_name());
            std::fs::write(&path, script.sql()).map_err(|e| MigrationError::io(&path, e))?;
            info!(
                "Generated {} migration {} with {} table(s)",
                database_type.platform_name(),
                path.display(),
                created_tables(script.sql()).len()
            );
            written.push(path);
        }

        Ok(written)
    }

    /// Apply every SQLite script below the root to a fresh in-memory database
    pub async fn verify(&self) -> MigrationResult<MigrationReport> {
        verify_sqlite_scripts(&self.root).await
    }
}

async fn verify_sqlite_scripts(root: &Path) -> MigrationResult<MigrationReport> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let connection = SeaOrmDatabase::connect(options).await?;

    let report = MigrationRunner::from_directory(root)
        .with_platform(Some(DatabaseType::SQLite.platform_name().to_string()))
        .run(&connection)
        .await;
    connection.close().await?;

    let report = report?;
    info!("Verified {} SQLite migration(s)", report.applied_count());
    Ok(report)
}

/// Lowercased names of the tables a script creates
fn created_tables(sql: &str) -> Vec<String> {
    const CREATE_TABLE: &str = "create table";
    let lower = sql.to_ascii_lowercase();
    let mut tables = Vec::new();
    let mut rest = lower.as_str();
    while let Some(index) = rest.find(CREATE_TABLE) {
        rest = &rest[index + CREATE_TABLE.len()..];
        let target = rest.trim_start();
        let target = target.strip_prefix("if not exists").unwrap_or(target).trim_start();
        let table: String = target
            .trim_start_matches(['"', '`', '['])
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !table.is_empty() {
            tables.push(table);
        }
    }
    tables
}

fn script_name(description: &str) -> Option<String> {
    let name = description
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>();
    let name = name.trim_matches('_').to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migrations::db_migration;

    #[test]
    fn descriptions_become_file_name_safe() {
        assert_eq!(script_name("Add user tags").as_deref(), Some("add_user_tags"));
        assert_eq!(script_name("  --  "), None);
    }

    #[test]
    fn finds_tables_created_by_a_script() {
        let sql = r#"
            CREATE TABLE "users" (id INTEGER);
            create table if not exists `posts` (id INT);
            CREATE INDEX idx_users_name ON users (name);
        "#;
        assert_eq!(created_tables(sql), vec!["users", "posts"]);
    }

    #[test]
    fn skips_tables_an_earlier_script_creates() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EntityRegistry::new().register::<db_migration::Entity>();
        let generator = MigrationGenerator::new(dir.path()).platform(DatabaseType::SQLite);

        let earlier = MigrationScript::new("1.0", "initial", "CREATE TABLE db_migration (version TEXT);").unwrap();
        assert!(generator.render(&registry, DatabaseType::SQLite, &[earlier]).is_none());
        assert!(generator.render(&registry, DatabaseType::SQLite, &[]).is_some());
    }

    #[test]
    fn next_version_follows_newest_script() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MigrationGenerator::new(dir.path()).platform(DatabaseType::SQLite);
        assert_eq!(generator.next_version(DatabaseType::SQLite).unwrap().to_string(), "1.0");

        let sqlite = dir.path().join("sqlite");
        std::fs::create_dir_all(&sqlite).unwrap();
        std::fs::write(sqlite.join("1.9__a.sql"), "").unwrap();
        std::fs::write(sqlite.join("1.10__b.sql"), "").unwrap();
        assert_eq!(generator.next_version(DatabaseType::SQLite).unwrap().to_string(), "1.11");
    }

    #[test]
    fn refuses_to_overwrite_an_existing_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EntityRegistry::new().register::<db_migration::Entity>();
        let generator = MigrationGenerator::new(dir.path()).platform(DatabaseType::SQLite);

        generator.generate(&registry, "1.0", "initial").unwrap();
        assert!(matches!(
            generator.generate(&registry, "1", "again"),
            Err(MigrationError::DuplicateVersion { .. })
        ));
    }
}
