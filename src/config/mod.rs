//! Configuration for drizzle-liquibase
//!
//! Handles loading `drizzle-liquibase.toml`. Keys are camelCase, unknown keys
//! are rejected and every value is validated when the file is loaded:
//!
//! ```toml
//! author = "Jane Doe"
//! migrationsDir = "./liquibase/migrations"
//! masterChangelog = "./liquibase/changelog-master.xml"
//! liquibaseMode = "sql"
//! excludeTables = ["audit.events"]
//!
//! [diff]
//! dropOrphanIndexes = true
//! ```

mod error;
mod timestamp;

pub use error::ConfigError;
pub use timestamp::{DEFAULT_TIMESTAMP_FORMAT, TimestampFormat};

use crate::snapshot::DEFAULT_SCHEMA;
use crate::traits::ObjectKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "drizzle-liquibase.toml";

/// Suffix of the snapshot persisted for each migration, after its id
pub const SNAPSHOT_SUFFIX: &str = "_snapshot.json";

// ============================================================================
// Liquibase Mode
// ============================================================================

/// Changelog dialect of generated migrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquibaseMode {
    #[default]
    Sql,
    Xml,
    Json,
}

impl LiquibaseMode {
    pub const ALL: &'static [&'static str] = &["sql", "xml", "json"];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Xml => "xml",
            Self::Json => "json",
        }
    }

    /// Migration file extension
    #[inline]
    pub const fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for LiquibaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Master changelog format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterFormat {
    Xml,
    Json,
}

impl MasterFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("xml") {
            Some(Self::Xml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }
}

// ============================================================================
// Diff Options
// ============================================================================

/// The `[diff]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiffOptions {
    #[serde(default = "yes")]
    pub include_policies: bool,
    #[serde(default = "yes")]
    pub modify_policies: bool,
    #[serde(default)]
    pub drop_orphan_policies: bool,
    #[serde(default)]
    pub drop_orphan_indexes: bool,
    #[serde(default)]
    pub drop_orphan_uniques: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_policies: true,
            modify_policies: true,
            drop_orphan_policies: false,
            drop_orphan_indexes: false,
            drop_orphan_uniques: false,
        }
    }
}

impl DiffOptions {
    /// Whether orphans of this kind get an explicit drop
    pub fn drops_orphans(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Index => self.drop_orphan_indexes,
            ObjectKind::Unique => self.drop_orphan_uniques,
            ObjectKind::Policy => self.include_policies && self.drop_orphan_policies,
            ObjectKind::Table | ObjectKind::Column => false,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
    #[serde(default = "default_schema_index_file")]
    pub schema_index_file: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_master_changelog")]
    pub master_changelog: PathBuf,
    #[serde(default)]
    pub timestamp_format: TimestampFormat,
    #[serde(default)]
    pub liquibase_mode: LiquibaseMode,
    pub author: String,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub diff: DiffOptions,
}

fn default_schema_dir() -> PathBuf { PathBuf::from("./src/db/schema") }
fn default_schema_index_file() -> PathBuf { PathBuf::from("snapshot.json") }
fn default_migrations_dir() -> PathBuf { PathBuf::from("./liquibase/migrations") }
fn default_master_changelog() -> PathBuf { PathBuf::from("./liquibase/changelog-master.xml") }
fn default_schemas() -> Vec<String> { vec![DEFAULT_SCHEMA.to_string()] }
fn yes() -> bool { true }

impl Config {
    /// Defaults for everything but the author
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            schema_dir: default_schema_dir(),
            schema_index_file: default_schema_index_file(),
            migrations_dir: default_migrations_dir(),
            master_changelog: default_master_changelog(),
            timestamp_format: TimestampFormat::default(),
            liquibase_mode: LiquibaseMode::default(),
            author: author.into(),
            exclude_tables: Vec::new(),
            schemas: default_schemas(),
            strict: false,
            diff: DiffOptions::default(),
        }
    }

    /// Load from default config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.into())
            } else {
                ConfigError::Io(path.into(), e)
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.into(), e))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate TOML source
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.author.trim().is_empty() {
            return Err(ConfigError::EmptyField("author"));
        }
        if self.schemas.is_empty() || self.schemas.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::EmptyField("schemas"));
        }
        if self.exclude_tables.iter().any(|t| t.is_empty()) {
            return Err(ConfigError::EmptyField("excludeTables"));
        }

        let paths = [
            ("schemaDir", &self.schema_dir),
            ("schemaIndexFile", &self.schema_index_file),
            ("migrationsDir", &self.migrations_dir),
            ("masterChangelog", &self.master_changelog),
        ];
        if let Some((name, _)) = paths.into_iter().find(|(_, p)| p.as_os_str().is_empty()) {
            return Err(ConfigError::EmptyField(name));
        }

        self.master_format()?;
        Ok(())
    }

    /// Snapshot exported by the schema introspection step
    pub fn snapshot_path(&self) -> PathBuf {
        self.schema_dir.join(&self.schema_index_file)
    }

    /// Meta directory (for the persisted snapshots)
    #[inline]
    pub fn meta_dir(&self) -> PathBuf {
        self.migrations_dir.join("meta")
    }

    /// Snapshot persisted alongside the migration `id`
    pub fn snapshot_file(&self, id: &str) -> PathBuf {
        self.meta_dir().join(format!("{id}{SNAPSHOT_SUFFIX}"))
    }

    pub fn master_format(&self) -> Result<MasterFormat, ConfigError> {
        MasterFormat::from_path(&self.master_changelog)
            .ok_or_else(|| ConfigError::UnsupportedMasterChangelog(self.master_changelog.clone()))
    }

    /// Default config file contents written by `init`
    pub fn template(author: &str) -> String {
        format!(
            r#"# drizzle-liquibase configuration
author = "{}"
schemaDir = "./src/db/schema"
schemaIndexFile = "snapshot.json"
migrationsDir = "./liquibase/migrations"
masterChangelog = "./liquibase/changelog-master.xml"
timestampFormat = "{DEFAULT_TIMESTAMP_FORMAT}"
liquibaseMode = "sql"
excludeTables = []
schemas = ["public"]
strict = false

[diff]
includePolicies = true
modifyPolicies = true
dropOrphanPolicies = false
dropOrphanIndexes = false
dropOrphanUniques = false
"#,
            author.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
