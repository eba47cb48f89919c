//! Versioned migration scripts
//!
//! Script files are named `<version>__<description>.sql`, where the version
//! is a list of integers separated by `.` or `_` with an optional leading
//! `V` (`1.0__initial.sql`, `V1_2__add_tags.sql`). Versions compare
//! numerically, so `1.10` sorts after `1.9`.

use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::errors::{MigrationError, MigrationResult};

const SCRIPT_EXTENSION: &str = ".sql";
const NAME_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub struct MigrationVersion {
    parts: Vec<u64>,
}

impl MigrationVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.strip_prefix(['V', 'v']).unwrap_or(raw);
        if trimmed.is_empty() {
            return None;
        }
        let parts = trimmed
            .split(['.', '_'])
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { parts })
    }

    /// Version of the first generated script, `1.0`
    pub fn initial() -> Self {
        Self { parts: vec![1, 0] }
    }

    /// The version with its last component incremented (`1.4` -> `1.5`)
    pub fn next(&self) -> Self {
        let mut parts = self.parts.clone();
        if let Some(last) = parts.last_mut() {
            *last += 1;
        }
        Self { parts }
    }

    fn significant_parts(&self) -> &[u64] {
        let len = self
            .parts
            .iter()
            .rposition(|part| *part != 0)
            .map_or(0, |index| index + 1);
        &self.parts[..len]
    }
}

impl PartialEq for MigrationVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MigrationVersion {}

impl PartialOrd for MigrationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MigrationVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // trailing zeros are insignificant: 1 == 1.0 == 1.0.0
        self.significant_parts().cmp(other.significant_parts())
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&rendered)
    }
}

/// One versioned schema change
#[derive(Debug, Clone)]
pub struct MigrationScript {
    version: MigrationVersion,
    name: String,
    sql: String,
    checksum: String,
}

impl MigrationScript {
    pub fn new(version: &str, name: impl Into<String>, sql: impl Into<String>) -> MigrationResult<Self> {
        let version = MigrationVersion::parse(version).ok_or_else(|| MigrationError::InvalidScriptName {
            name: version.to_string(),
        })?;
        let sql = sql.into();
        let checksum = checksum(&sql);
        Ok(Self {
            version,
            name: name.into(),
            sql,
            checksum,
        })
    }

    /// Build a script from its file name, e.g. `1.2__add_tags.sql`
    pub fn from_file_name(file_name: &str, sql: impl Into<String>) -> MigrationResult<Self> {
        let invalid = || MigrationError::InvalidScriptName {
            name: file_name.to_string(),
        };
        let stem = file_name.strip_suffix(SCRIPT_EXTENSION).ok_or_else(invalid)?;
        let (version, name) = stem.split_once(NAME_SEPARATOR).ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        let version = MigrationVersion::parse(version).ok_or_else(invalid)?;
        let sql = sql.into();
        let checksum = checksum(&sql);
        Ok(Self {
            version,
            name: name.to_string(),
            sql,
            checksum,
        })
    }

    pub fn version(&self) -> &MigrationVersion {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// SHA-256 of the script text, hex encoded
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn file_name(&self) -> String {
        format!("{}{NAME_SEPARATOR}{}{SCRIPT_EXTENSION}", self.version, self.name)
    }
}

fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Sort scripts by version and reject duplicate versions
pub fn sort_scripts(mut scripts: Vec<MigrationScript>) -> MigrationResult<Vec<MigrationScript>> {
    scripts.sort_by(|a, b| a.version.cmp(&b.version));
    if let Some(pair) = scripts.windows(2).find(|pair| pair[0].version == pair[1].version) {
        return Err(MigrationError::DuplicateVersion {
            version: pair[1].version.to_string(),
        });
    }
    Ok(scripts)
}

/// Load every `.sql` script of a platform directory, sorted by version
///
/// A directory that does not exist holds no migrations.
pub fn load_directory(dir: &Path) -> MigrationResult<Vec<MigrationScript>> {
    if !dir.is_dir() {
        debug!("Migration directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !file_name.ends_with(SCRIPT_EXTENSION) {
            debug!("Ignoring non-migration file {}", path.display());
            continue;
        }
        let sql = std::fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
        scripts.push(MigrationScript::from_file_name(file_name, sql)?);
    }

    sort_scripts(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.0__initial.sql", "1.0", "initial")]
    #[case("V1_2__add_tags.sql", "1.2", "add_tags")]
    #[case("20240101__baseline_schema.sql", "20240101", "baseline_schema")]
    fn parses_script_file_names(#[case] file: &str, #[case] version: &str, #[case] name: &str) {
        let script = MigrationScript::from_file_name(file, "SELECT 1").unwrap();
        assert_eq!(script.version().to_string(), version);
        assert_eq!(script.name(), name);
    }

    #[rstest]
    #[case("initial.sql")]
    #[case("1.0__.sql")]
    #[case("one__initial.sql")]
    #[case("1.0__initial.txt")]
    fn rejects_malformed_file_names(#[case] file: &str) {
        assert!(matches!(
            MigrationScript::from_file_name(file, ""),
            Err(MigrationError::InvalidScriptName { .. })
        ));
    }

    #[test]
    fn versions_compare_numerically() {
        let v = |raw: &str| MigrationVersion::parse(raw).unwrap();
        assert!(v("1.10") > v("1.9"));
        assert!(v("2") > v("1.99"));
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1.4").next(), v("1.5"));
    }

    #[test]
    fn sorting_detects_duplicate_versions() {
        let scripts = vec![
            MigrationScript::new("1.0", "a", "").unwrap(),
            MigrationScript::new("1", "b", "").unwrap(),
        ];
        assert!(matches!(
            sort_scripts(scripts),
            Err(MigrationError::DuplicateVersion { .. })
        ));
    }

    #[test]
    fn checksum_changes_with_content() {
        let a = MigrationScript::new("1", "a", "CREATE TABLE a (id INT)").unwrap();
        let b = MigrationScript::new("1", "a", "CREATE TABLE a (id BIGINT)").unwrap();
        assert_eq!(a.checksum().len(), 64);
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn missing_directory_has_no_scripts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_directory(&dir.path().join("sqlite")).unwrap().is_empty());
    }
}
