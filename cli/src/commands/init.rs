//! Init command - writes a default configuration file

use colored::Colorize;
use drizzle_liquibase::Config;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::CliError;

pub fn run(path: &Path, author: Option<&str>) -> Result<(), CliError> {
    let author = author.map(str::to_string).unwrap_or_else(default_author);
    let contents = Config::template(&author);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => CliError::AlreadyExists(path.to_path_buf()),
            _ => CliError::Io(path.to_path_buf(), e),
        })?;
    file.write_all(contents.as_bytes())
        .map_err(|e| CliError::Io(path.to_path_buf(), e))?;

    println!(
        "{}",
        format!("Created {}", path.display()).bright_green()
    );
    println!();
    println!("Next steps:");
    println!("  1. Review the author and paths in {}", path.display());
    println!(
        "  2. Export your schema snapshot to {}",
        "./src/db/schema/snapshot.json".bright_cyan()
    );
    println!(
        "  3. Run {} to write your first changelog",
        "drizzle-liquibase generate".bright_cyan()
    );
    Ok(())
}

fn default_author() -> String {
    ["USER", "USERNAME"]
        .into_iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "author".to_string())
}
