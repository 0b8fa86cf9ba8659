//! Migration history
//!
//! Every emitted migration leaves `<migrationsDir>/meta/<id>_snapshot.json`
//! behind. The next diff starts from the snapshot of the last migration the
//! master changelog includes, so the files of a run that never reached the
//! master are not part of the history.

use super::{EmissionError, master, master_format, read_optional};
use crate::config::Config;
use crate::snapshot::{JsonSnapshotLoader, SchemaSnapshot, SnapshotError, SnapshotLoader};
use std::path::{Path, PathBuf};

/// Migrations registered in the master changelog
pub struct MigrationHistory<'a> {
    config: &'a Config,
}

impl<'a> MigrationHistory<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Ids of the included migrations, in master order
    pub fn migration_ids(&self) -> Result<Vec<String>, EmissionError> {
        let path = &self.config.master_changelog;
        let format = master_format(self.config)?;
        let existing = read_optional(path)?;
        Ok(master::included_files(path, format, existing.as_deref())?
            .iter()
            .filter_map(|file| migration_id(file))
            .collect())
    }

    /// Snapshot of the latest included migration that has one
    pub fn latest_snapshot_path(&self) -> Result<Option<PathBuf>, EmissionError> {
        for id in self.migration_ids()?.iter().rev() {
            let path = self.config.snapshot_file(id);
            if path.is_file() {
                return Ok(Some(path));
            }
            tracing::debug!(migration = %id, "included migration has no snapshot");
        }
        Ok(None)
    }
}

impl SnapshotLoader for MigrationHistory<'_> {
    fn load(&self) -> Result<SchemaSnapshot, SnapshotError> {
        let latest = self
            .latest_snapshot_path()
            .map_err(|e| SnapshotError::History {
                path: self.config.master_changelog.clone(),
                reason: e.to_string(),
            })?;
        match latest {
            Some(path) => JsonSnapshotLoader::new(path).load(),
            None => {
                tracing::debug!("no migrations with a snapshot yet, starting empty");
                Ok(SchemaSnapshot::empty())
            }
        }
    }
}

/// Migration id of an included file: its name without the extension
fn migration_id(file: &str) -> Option<String> {
    Path::new(file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeEntry, ChangeSet};
    use crate::emit::ChangelogEmitter;
    use crate::snapshot::{Column, TableDefinition};
    use crate::traits::QualifiedName;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &Path) -> Config {
        let mut config = Config::new("ci");
        config.migrations_dir = dir.join("liquibase/migrations");
        config.master_changelog = dir.join("liquibase/changelog-master.xml");
        config
    }

    fn table(name: &str) -> TableDefinition {
        TableDefinition::new("public", name).column(Column::new("id", "int"))
    }

    fn emit(config: &Config, name: &str, second: u32) -> String {
        let snapshot = SchemaSnapshot::from_tables([table(name)]).unwrap();
        let changes = ChangeSet::new(vec![ChangeEntry::create(
            QualifiedName::table("public", name),
            table(name),
        )]);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap();
        ChangelogEmitter::new(config)
            .emit(&changes, &snapshot, now)
            .unwrap()
            .id
    }

    #[test]
    fn test_empty_without_master() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let history = MigrationHistory::new(&config);
        assert!(history.migration_ids().unwrap().is_empty());
        assert!(history.load().unwrap().is_empty());
    }

    #[test]
    fn test_latest_included_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let first = emit(&config, "users", 0);
        let second = emit(&config, "posts", 1);

        let history = MigrationHistory::new(&config);
        assert_eq!(history.migration_ids().unwrap(), [first, second.clone()]);
        assert_eq!(
            history.latest_snapshot_path().unwrap(),
            Some(config.snapshot_file(&second))
        );
        assert!(history.load().unwrap().contains(&QualifiedName::table("public", "posts")));
    }

    #[test]
    fn test_snapshot_without_include_is_ignored() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let first = emit(&config, "users", 0);

        // Left behind by a run that stopped before the master was written
        let stray = config.snapshot_file("20240101000001_0001_ci");
        fs::write(&stray, SchemaSnapshot::from_tables([table("posts")]).unwrap().to_json().unwrap())
            .unwrap();

        let history = MigrationHistory::new(&config);
        assert_eq!(
            history.latest_snapshot_path().unwrap(),
            Some(config.snapshot_file(&first))
        );
        let loaded = history.load().unwrap();
        assert!(loaded.contains(&QualifiedName::table("public", "users")));
        assert!(!loaded.contains(&QualifiedName::table("public", "posts")));
    }

    #[test]
    fn test_hand_written_includes_are_skipped() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let first = emit(&config, "users", 0);

        let master = fs::read_to_string(&config.master_changelog).unwrap();
        let master = master.replace(
            "</databaseChangeLog>",
            "    <include file=\"manual/seed.sql\" relativeToChangelogFile=\"true\"/>\n</databaseChangeLog>",
        );
        fs::write(&config.master_changelog, master).unwrap();

        let history = MigrationHistory::new(&config);
        assert_eq!(history.migration_ids().unwrap(), [first.clone(), "seed".to_string()]);
        assert_eq!(
            history.latest_snapshot_path().unwrap(),
            Some(config.snapshot_file(&first))
        );
    }

    #[test]
    fn test_malformed_master_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.master_changelog = dir.path().join("master.json");
        fs::write(&config.master_changelog, "[]").unwrap();
        assert!(matches!(
            MigrationHistory::new(&config).load(),
            Err(SnapshotError::History { .. })
        ));
    }
}
