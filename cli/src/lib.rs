//! drizzle-liquibase CLI
//!
//! Reads a `drizzle-liquibase.toml` configuration and turns the difference
//! between the last generated snapshot and the current schema snapshot into a
//! Liquibase changelog.
//!
//! # Quick Start
//!
//! 1. Run `drizzle-liquibase init` to create `drizzle-liquibase.toml`
//! 2. Export the schema snapshot to `<schemaDir>/<schemaIndexFile>`
//! 3. Run `drizzle-liquibase generate`
//!
//! # Commands
//!
//! - `drizzle-liquibase init` - Create a default configuration file
//! - `drizzle-liquibase check` - Validate the configuration and show resolved settings
//! - `drizzle-liquibase generate` - Write a migration for the schema changes
//! - `drizzle-liquibase generate --dry-run` - Show the changes without writing anything

pub mod commands;
pub mod error;
pub mod output;

pub use error::CliError;
