//! Check command - validates configuration and reports resolved settings

use chrono::Utc;
use drizzle_liquibase::{Config, MigrationHistory};

use crate::output;

pub fn run(config: &Config) {
    println!("{}", output::heading("Checking configuration..."));
    println!();

    println!("  {}: {}", output::label("Author"), config.author);
    println!("  {}: {}", output::label("Mode"), config.liquibase_mode);
    println!(
        "  {}: {} {}",
        output::label("Timestamp"),
        config.timestamp_format.pattern(),
        output::muted(&format!("(e.g. {})", config.timestamp_format.format(&Utc::now())))
    );
    println!("  {}: {}", output::label("Schemas"), config.schemas.join(", "));
    if !config.exclude_tables.is_empty() {
        println!(
            "  {}: {}",
            output::label("Excluded"),
            config.exclude_tables.join(", ")
        );
    }
    println!("  {}: {}", output::label("Strict"), config.strict);

    println!();
    println!("  {}", output::label("Diff"));
    let diff = &config.diff;
    for (key, value) in [
        ("includePolicies", diff.include_policies),
        ("modifyPolicies", diff.modify_policies),
        ("dropOrphanPolicies", diff.drop_orphan_policies),
        ("dropOrphanIndexes", diff.drop_orphan_indexes),
        ("dropOrphanUniques", diff.drop_orphan_uniques),
    ] {
        println!("    {key}: {value}");
    }

    println!();
    let mut warnings = Vec::new();

    let snapshot = config.snapshot_path();
    print!("  {} Schema snapshot... ", output::label("Checking"));
    if snapshot.exists() {
        println!("{}", output::status_ok());
    } else {
        println!("{}", output::status_warning("MISSING"));
        warnings.push(format!("no schema snapshot at {}", snapshot.display()));
    }
    println!("    {}", snapshot.display());

    print!("  {} Migrations... ", output::label("Checking"));
    match MigrationHistory::new(config).latest_snapshot_path() {
        Ok(Some(latest)) => {
            println!("{}", output::status_ok());
            println!("    {}", config.migrations_dir.display());
            println!("    {}", output::muted(&format!("diffing from {}", latest.display())));
        }
        Ok(None) => {
            println!("{}", output::status_warning("NONE YET"));
            println!("    {}", config.migrations_dir.display());
        }
        Err(e) => {
            println!("{}", output::status_warning("UNREADABLE"));
            println!("    {}", config.migrations_dir.display());
            warnings.push(e.to_string());
        }
    }

    print!("  {} Master changelog... ", output::label("Checking"));
    if config.master_changelog.exists() {
        println!("{}", output::status_ok());
    } else {
        println!("{}", output::status_warning("NOT CREATED"));
    }
    println!("    {}", config.master_changelog.display());

    println!();
    if warnings.is_empty() {
        println!("{}", output::success("Configuration OK."));
    } else {
        println!(
            "{}",
            output::warning(&format!("Configuration OK with {} warning(s):", warnings.len()))
        );
        for w in warnings {
            println!("  - {w}");
        }
    }
}
