//! Changelog emission
//!
//! Turns an ordered [`ChangeSet`] into a Liquibase changelog file, persists
//! the snapshot the next diff starts from and registers the migration in the
//! master changelog. The three writes are committed together: if any of them
//! fails the ones already done are undone.

mod error;
pub mod format;
mod history;
pub mod master;

pub use error::EmissionError;
pub use format::ChangeSetBlock;
pub use history::MigrationHistory;
pub use master::Include;

use crate::change::ChangeSet;
use crate::config::{Config, MasterFormat};
use crate::snapshot::SchemaSnapshot;
use crate::sql::PostgresGenerator;
use chrono::{DateTime, Utc};
use heck::ToSnakeCase;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A rendered (and possibly written) migration
#[derive(Debug, Clone)]
pub struct MigrationFile {
    /// `{timestamp}_{sequence}_{author}`
    pub id: String,
    pub path: PathBuf,
    /// Position in the master changelog, 0-based
    pub sequence: usize,
    pub contents: String,
    /// SHA-256 of `contents`, hex encoded
    pub checksum: String,
    pub changes: ChangeSet,
}

impl MigrationFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.id)
    }
}

/// Everything a successful emission writes
#[derive(Debug)]
struct Rendered {
    migration: MigrationFile,
    master: String,
    snapshot: String,
}

/// Writes migrations for one configuration
pub struct ChangelogEmitter<'a> {
    config: &'a Config,
    generator: PostgresGenerator,
}

impl<'a> ChangelogEmitter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            generator: PostgresGenerator::new(),
        }
    }

    /// Path of the migration with the given id
    pub fn migration_path(&self, id: &str) -> PathBuf {
        self.config.migrations_dir.join(format!(
            "{id}.{}",
            self.config.liquibase_mode.extension()
        ))
    }

    /// Render without touching the filesystem
    pub fn render(
        &self,
        changes: &ChangeSet,
        now: DateTime<Utc>,
    ) -> Result<MigrationFile, EmissionError> {
        let format = master_format(self.config)?;
        let existing = read_optional(&self.config.master_changelog)?;
        let sequence =
            master::count_includes(&self.config.master_changelog, format, existing.as_deref())?;
        self.render_migration(changes, sequence, now)
    }

    /// Render and commit the migration, the snapshot and the master changelog
    pub fn emit(
        &self,
        changes: &ChangeSet,
        snapshot: &SchemaSnapshot,
        now: DateTime<Utc>,
    ) -> Result<MigrationFile, EmissionError> {
        let rendered = self.render_all(changes, snapshot, now)?;
        self.commit(&rendered)?;

        let migration = rendered.migration;
        tracing::info!(
            path = %migration.path.display(),
            changes = migration.changes.len(),
            checksum = %migration.checksum,
            "wrote migration"
        );
        Ok(migration)
    }

    fn render_migration(
        &self,
        changes: &ChangeSet,
        sequence: usize,
        now: DateTime<Utc>,
    ) -> Result<MigrationFile, EmissionError> {
        if changes.is_empty() {
            return Err(EmissionError::EmptyChangeSet);
        }

        let id = format!(
            "{}_{sequence:04}_{}",
            self.config.timestamp_format.format(&now),
            author_slug(&self.config.author)
        );

        let blocks = changes
            .iter()
            .enumerate()
            .map(|(n, entry)| {
                Ok(ChangeSetBlock {
                    id: format!("{id}-{}", n + 1),
                    author: self.config.author.clone(),
                    comment: format!("{entry} ({})", entry.classification()),
                    statements: self.generator.generate(entry)?,
                })
            })
            .collect::<Result<Vec<_>, EmissionError>>()?;

        let contents = format::render(self.config.liquibase_mode, &blocks)?;
        Ok(MigrationFile {
            path: self.migration_path(&id),
            checksum: checksum(&contents),
            id,
            sequence,
            contents,
            changes: changes.clone(),
        })
    }

    fn render_all(
        &self,
        changes: &ChangeSet,
        snapshot: &SchemaSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Rendered, EmissionError> {
        let format = master_format(self.config)?;
        let master_path = &self.config.master_changelog;
        let existing = read_optional(master_path)?;
        let sequence = master::count_includes(master_path, format, existing.as_deref())?;

        let migration = self.render_migration(changes, sequence, now)?;
        let include = Include::new(master_path, &migration.path);
        let master = master::append_include(master_path, format, existing.as_deref(), &include)?;

        let mut snapshot = snapshot.to_json().map_err(EmissionError::Snapshot)?;
        snapshot.push('\n');

        Ok(Rendered {
            migration,
            master,
            snapshot,
        })
    }

    fn commit(&self, rendered: &Rendered) -> Result<(), EmissionError> {
        let migration = &rendered.migration.path;
        if migration.exists() {
            return Err(EmissionError::AlreadyExists(migration.clone()));
        }
        let snapshot = self.config.snapshot_file(&rendered.migration.id);

        write_new(migration, &rendered.migration.contents)?;

        // A snapshot already under this id is left from a run that never
        // reached the master
        if let Err(e) = write_replace(&snapshot, &rendered.snapshot) {
            remove_partial(migration);
            return Err(e);
        }

        // The master goes last: once it includes the file the migration is live
        if let Err(e) = write_replace(&self.config.master_changelog, &rendered.master) {
            remove_partial(migration);
            remove_partial(&snapshot);
            return Err(e);
        }
        Ok(())
    }
}

fn master_format(config: &Config) -> Result<MasterFormat, EmissionError> {
    MasterFormat::from_path(&config.master_changelog).ok_or_else(|| {
        EmissionError::MalformedMaster {
            path: config.master_changelog.clone(),
            reason: "master changelog must be .xml or .json".into(),
        }
    })
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::error!(path = %path.display(), error = %e, "failed to remove partial output");
    }
}

/// Read a file that may not exist yet
fn read_optional(path: &Path) -> Result<Option<String>, EmissionError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(None)
        }
        Err(e) => Err(EmissionError::io(path)(e)),
    }
}

fn temp_beside(path: &Path, contents: &str) -> Result<NamedTempFile, EmissionError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(EmissionError::io(dir))?;
    let mut file = NamedTempFile::new_in(dir).map_err(EmissionError::io(dir))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(EmissionError::io(path))?;
    Ok(file)
}

/// Write a file that must not exist
fn write_new(path: &Path, contents: &str) -> Result<(), EmissionError> {
    temp_beside(path, contents)?
        .persist_noclobber(path)
        .map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => EmissionError::AlreadyExists(path.to_path_buf()),
            _ => EmissionError::io(path)(e.error),
        })?;
    Ok(())
}

/// Atomically replace a file
fn write_replace(path: &Path, contents: &str) -> Result<(), EmissionError> {
    temp_beside(path, contents)?
        .persist(path)
        .map_err(|e| EmissionError::io(path)(e.error))?;
    Ok(())
}

fn checksum(contents: &str) -> String {
    format!("{:x}", Sha256::digest(contents.as_bytes()))
}

/// Author reduced to characters safe in a file name
pub fn author_slug(author: &str) -> String {
    let slug: String = author
        .to_snake_case()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if slug.is_empty() {
        "author".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeEntry;
    use crate::config::LiquibaseMode;
    use crate::snapshot::{Column, TableDefinition};
    use crate::traits::QualifiedName;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn config(dir: &Path) -> Config {
        let mut config = Config::new("Jane Doe");
        config.migrations_dir = dir.join("liquibase/migrations");
        config.master_changelog = dir.join("liquibase/changelog-master.xml");
        config
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn users() -> TableDefinition {
        TableDefinition::new("public", "users").column(Column::new("id", "integer").not_null())
    }

    fn changes() -> ChangeSet {
        ChangeSet::new(vec![ChangeEntry::create(
            QualifiedName::table("public", "users"),
            users(),
        )])
    }

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::from_tables([users()]).unwrap()
    }

    #[test]
    fn test_author_slug() {
        assert_eq!(author_slug("Jane Doe"), "jane_doe");
        assert_eq!(author_slug("ci-bot"), "ci_bot");
        assert_eq!(author_slug("***"), "author");
    }

    #[test]
    fn test_emit_writes_all_three_files() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let emitter = ChangelogEmitter::new(&config);

        let file = emitter.emit(&changes(), &snapshot(), now()).unwrap();
        assert_eq!(file.id, "20240301123000_0000_jane_doe");
        assert_eq!(file.sequence, 0);
        assert_eq!(file.file_name(), "20240301123000_0000_jane_doe.sql");
        assert_eq!(fs::read_to_string(&file.path).unwrap(), file.contents);
        assert_eq!(file.checksum.len(), 64);
        assert!(file.contents.contains("-- changeset \"Jane Doe\":20240301123000_0000_jane_doe-1"));
        assert!(file.contents.contains("-- comment: create table public.users (additive)"));

        let master = fs::read_to_string(&config.master_changelog).unwrap();
        assert!(master.contains("<include file=\"migrations/20240301123000_0000_jane_doe.sql\""));

        let saved = SchemaSnapshot::load(&config.snapshot_file(&file.id)).unwrap();
        assert_eq!(saved, snapshot());
    }

    #[test]
    fn test_sequence_follows_master() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.liquibase_mode = LiquibaseMode::Json;
        let emitter = ChangelogEmitter::new(&config);

        emitter.emit(&changes(), &snapshot(), now()).unwrap();
        let second = emitter.emit(&changes(), &snapshot(), now()).unwrap();
        assert_eq!(second.sequence, 1);
        assert_eq!(second.file_name(), "20240301123000_0001_jane_doe.json");

        let master = fs::read_to_string(&config.master_changelog).unwrap();
        assert_eq!(master.matches("<include ").count(), 2);
    }

    #[test]
    fn test_render_is_a_dry_run() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let file = ChangelogEmitter::new(&config).render(&changes(), now()).unwrap();
        assert!(!file.path.exists());
        assert!(!config.master_changelog.exists());
    }

    #[test]
    fn test_empty_change_set_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let err = ChangelogEmitter::new(&config)
            .emit(&ChangeSet::default(), &snapshot(), now())
            .unwrap_err();
        assert!(matches!(err, EmissionError::EmptyChangeSet));
        assert!(!config.migrations_dir.exists());
    }

    #[test]
    fn test_failed_snapshot_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.migrations_dir).unwrap();
        // A file where the meta directory should be
        fs::write(config.meta_dir(), "not a directory").unwrap();

        let emitter = ChangelogEmitter::new(&config);
        let err = emitter.emit(&changes(), &snapshot(), now()).unwrap_err();
        assert!(matches!(err, EmissionError::Io { .. }));

        let left: Vec<_> = fs::read_dir(&config.migrations_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, ["meta"]);
        assert!(!config.master_changelog.exists());
    }

    #[test]
    fn test_failed_master_write_undoes_migration_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        let emitter = ChangelogEmitter::new(&config);
        let first = emitter.emit(&changes(), &snapshot(), now()).unwrap();
        let first_snapshot = fs::read_to_string(config.snapshot_file(&first.id)).unwrap();

        // The master sits below a plain file: reading it finds nothing, and
        // writing it fails once the migration and snapshot are in place
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        config.master_changelog = blocker.join("changelog-master.xml");
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 31, 0).unwrap();

        let emitter = ChangelogEmitter::new(&config);
        let err = emitter.emit(&changes(), &snapshot(), later).unwrap_err();
        assert!(matches!(err, EmissionError::Io { .. }));

        let second = emitter.migration_path("20240301123100_0000_jane_doe");
        assert!(!second.exists());
        assert!(!config.snapshot_file("20240301123100_0000_jane_doe").exists());
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "");

        let mut left: Vec<_> = fs::read_dir(&config.migrations_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, [first.file_name(), "meta"]);
        assert_eq!(
            fs::read_to_string(config.snapshot_file(&first.id)).unwrap(),
            first_snapshot
        );
    }

    #[test]
    fn test_existing_migration_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let emitter = ChangelogEmitter::new(&config);
        let path = emitter.migration_path("20240301123000_0000_jane_doe");
        fs::create_dir_all(&config.migrations_dir).unwrap();
        fs::write(&path, "keep").unwrap();

        let err = emitter.emit(&changes(), &snapshot(), now()).unwrap_err();
        assert!(matches!(err, EmissionError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
    }
}
