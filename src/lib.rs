//! # drizzle-liquibase
//!
//! Compiles the difference between two drizzle schema snapshots into a
//! Liquibase changelog for PostgreSQL.
//!
//! ## Quick Start
//!
//! ```no_run
//! use drizzle_liquibase::{Config, JsonSnapshotLoader, MigrationHistory, Outcome, Pipeline};
//!
//! # fn main() -> drizzle_liquibase::Result<()> {
//! let config = Config::load()?;
//! let previous = MigrationHistory::new(&config);
//! let current = JsonSnapshotLoader::new(config.snapshot_path());
//!
//! match Pipeline::new(&config).run(&previous, &current, chrono::Utc::now())? {
//!     Outcome::Unchanged => println!("no changes"),
//!     Outcome::Emitted(file) => println!("wrote {}", file.path.display()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stages
//!
//! | Stage       | Module       | Output                         |
//! |-------------|--------------|--------------------------------|
//! | Diffing     | [`diff`]     | unordered [`ChangeSet`]        |
//! | Classifying | [`classify`] | filtered, ordered [`ChangeSet`]|
//! | Emitting    | [`emit`]     | [`MigrationFile`] + master     |

pub mod change;
pub mod classify;
pub mod collection;
pub mod config;
pub mod diff;
pub mod emit;
pub mod error;
pub mod order;
pub mod pipeline;
pub mod snapshot;
pub mod sql;
pub mod traits;

// =============================================================================
// Root-level exports
// =============================================================================

pub use change::{Ambiguity, ChangeEntry, ChangeSet, Classification, Origin, SchemaObject};
pub use config::{Config, ConfigError, DiffOptions, LiquibaseMode, MasterFormat, TimestampFormat};
pub use diff::{DiffScope, diff_snapshots};
pub use emit::{ChangelogEmitter, EmissionError, MigrationFile, MigrationHistory};
pub use error::{Error, Result};
pub use pipeline::{Outcome, Pipeline, Stage};
pub use snapshot::{JsonSnapshotLoader, SchemaSnapshot, SnapshotError, SnapshotLoader};
pub use traits::{ChangeKind, ObjectKind, QualifiedName};
