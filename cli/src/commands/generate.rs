//! Generate migration command
//!
//! 1. Load the snapshot of the last migration in the master (empty if none)
//! 2. Load the current snapshot exported by the schema tooling
//! 3. Diff, classify and order the changes
//! 4. Write the changelog, its snapshot and the master include

use chrono::Utc;
use colored::Colorize;
use drizzle_liquibase::{
    ChangeSet, ChangelogEmitter, Classification, Config, JsonSnapshotLoader, MigrationHistory,
    Outcome, Pipeline, SnapshotLoader,
};
use std::path::PathBuf;

use crate::error::CliError;
use crate::output;

pub struct GenerateOptions {
    /// Current snapshot; defaults to `<schemaDir>/<schemaIndexFile>`
    pub snapshot: Option<PathBuf>,
    /// Print the changelog instead of writing it
    pub dry_run: bool,
}

pub fn run(config: &Config, opts: GenerateOptions) -> Result<(), CliError> {
    let previous = MigrationHistory::new(config);
    let current =
        JsonSnapshotLoader::new(opts.snapshot.unwrap_or_else(|| config.snapshot_path()));
    tracing::debug!(
        master = %config.master_changelog.display(),
        current = %current.path().display(),
        dry_run = opts.dry_run,
        "generate"
    );

    if opts.dry_run {
        return dry_run(config, &previous, &current);
    }

    match Pipeline::new(config).run(&previous, &current, Utc::now())? {
        Outcome::Unchanged => {
            println!("{}", "No schema changes detected".yellow());
        }
        Outcome::Emitted(file) => {
            println!(
                "{} Created migration: {}",
                "✓".green().bold(),
                file.file_name().cyan()
            );
            print_summary(&file.changes);
        }
    }
    Ok(())
}

fn dry_run(
    config: &Config,
    previous: &impl SnapshotLoader,
    current: &impl SnapshotLoader,
) -> Result<(), CliError> {
    let old = previous.load().map_err(drizzle_liquibase::Error::from)?;
    let new = current.load().map_err(drizzle_liquibase::Error::from)?;
    let changes = Pipeline::new(config).plan(&old, &new)?;

    if changes.is_empty() {
        println!("{}", "No schema changes detected".yellow());
        return Ok(());
    }

    let file = ChangelogEmitter::new(config)
        .render(&changes, Utc::now())
        .map_err(drizzle_liquibase::Error::from)?;
    println!(
        "{}",
        output::muted(&format!("-- would write {}", file.path.display()))
    );
    println!("{}", file.contents);
    print_summary(&changes);
    Ok(())
}

fn print_summary(changes: &ChangeSet) {
    println!("\n{}", "Changes:".bold());
    for entry in changes {
        println!("{}", output::change_line(entry));
    }

    let destructive = changes.count(Classification::Destructive);
    let ambiguous = changes.count(Classification::Ambiguous);
    println!(
        "\n  {} change(s): {} additive, {} destructive, {} ambiguous",
        changes.len(),
        changes.count(Classification::Additive),
        destructive,
        ambiguous
    );

    for ambiguity in changes.ambiguities() {
        println!("{}", output::warn_line(&ambiguity.to_string()));
    }
    if destructive > 0 {
        println!(
            "{}",
            output::warn_line("destructive changes may lose data; review the rollback sections")
        );
    }
}
