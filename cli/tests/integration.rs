//! End-to-end integration tests for the drizzle-liquibase CLI

use assert_cmd::cargo;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const USERS: &str = r#"{
  "version": "1",
  "tables": [
    {
      "name": "users",
      "columns": [
        { "name": "id", "type": "serial", "notNull": true },
        { "name": "email", "type": "text" }
      ],
      "primaryKey": { "name": "users_pkey", "columns": ["id"] },
      "indexes": [{ "name": "users_email_idx", "columns": ["email"] }]
    }
  ]
}"#;

const USERS_EMAIL_VARCHAR: &str = r#"{
  "tables": [
    {
      "name": "users",
      "columns": [
        { "name": "id", "type": "serial", "notNull": true },
        { "name": "email", "type": "varchar(320)" }
      ],
      "primaryKey": { "name": "users_pkey", "columns": ["id"] },
      "indexes": [{ "name": "users_email_idx", "columns": ["email"] }]
    }
  ]
}"#;

/// Get the drizzle-liquibase binary
fn cli() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("drizzle-liquibase"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, extra: &str) {
    fs::write(
        dir.join("drizzle-liquibase.toml"),
        format!("author = \"ci\"\n{extra}"),
    )
    .unwrap();
}

fn write_snapshot(dir: &Path, contents: &str) {
    let schema_dir = dir.join("src/db/schema");
    fs::create_dir_all(&schema_dir).unwrap();
    fs::write(schema_dir.join("snapshot.json"), contents).unwrap();
}

fn migrations(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir.join("liquibase/migrations"))
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .filter(|name| name != "meta")
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

mod init {
    use super::*;

    #[test]
    fn init_creates_config_file() {
        let temp = TempDir::new().unwrap();

        cli()
            .current_dir(temp.path())
            .args(["init", "--author", "Jane Doe"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created drizzle-liquibase.toml"));

        let content = fs::read_to_string(temp.path().join("drizzle-liquibase.toml")).unwrap();
        assert!(content.contains("author = \"Jane Doe\""));
        assert!(content.contains("liquibaseMode = \"sql\""));

        cli()
            .current_dir(temp.path())
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("Jane Doe"));
    }

    #[test]
    fn init_fails_if_config_exists() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "");

        cli()
            .current_dir(temp.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        let content = fs::read_to_string(temp.path().join("drizzle-liquibase.toml")).unwrap();
        assert_eq!(content, "author = \"ci\"\n");
    }

    #[test]
    fn init_honours_custom_path() {
        let temp = TempDir::new().unwrap();

        cli()
            .current_dir(temp.path())
            .args(["--config", "db.toml", "init", "--author", "ci"])
            .assert()
            .success();

        assert!(temp.path().join("db.toml").exists());
        assert!(!temp.path().join("drizzle-liquibase.toml").exists());
    }
}

mod check {
    use super::*;

    #[test]
    fn check_reports_missing_config() {
        let temp = TempDir::new().unwrap();

        cli()
            .current_dir(temp.path())
            .arg("check")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("config not found"));
    }

    #[test]
    fn check_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "dialect = \"postgresql\"\n");

        cli()
            .current_dir(temp.path())
            .arg("check")
            .assert()
            .failure()
            .stderr(predicate::str::contains("dialect"));
    }

    #[test]
    fn check_rejects_yaml_master() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "masterChangelog = \"changelog.yaml\"\n");

        cli()
            .current_dir(temp.path())
            .arg("check")
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected a .xml or .json file"));
    }

    #[test]
    fn check_warns_about_missing_snapshot() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "timestampFormat = \"YYYY-MM-DD_HHmmss\"\n");

        cli()
            .current_dir(temp.path())
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("YYYY-MM-DD_HHmmss"))
            .stdout(predicate::str::contains("MISSING"));
    }
}

mod generate {
    use super::*;

    #[test]
    fn generate_writes_migration_and_master() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "");
        write_snapshot(temp.path(), USERS);

        cli()
            .current_dir(temp.path())
            .arg("generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Created migration"))
            .stdout(predicate::str::contains("create table public.users"));

        let files = migrations(temp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("_0000_ci.sql"));

        let master = fs::read_to_string(temp.path().join("liquibase/changelog-master.xml")).unwrap();
        assert!(master.contains(&format!("migrations/{}", files[0])));
        let id = files[0].trim_end_matches(".sql");
        assert!(
            temp.path()
                .join(format!("liquibase/migrations/meta/{id}_snapshot.json"))
                .exists()
        );

        // Nothing changed since
        cli()
            .current_dir(temp.path())
            .arg("generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("No schema changes detected"));
        assert_eq!(migrations(temp.path()).len(), 1);
    }

    #[test]
    fn generate_from_explicit_snapshot() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "liquibaseMode = \"json\"\n");
        fs::write(temp.path().join("exported.json"), USERS).unwrap();

        cli()
            .current_dir(temp.path())
            .args(["generate", "--snapshot", "exported.json"])
            .assert()
            .success();

        let files = migrations(temp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".json"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "");
        write_snapshot(temp.path(), USERS);

        cli()
            .current_dir(temp.path())
            .args(["generate", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("-- liquibase formatted sql"))
            .stdout(predicate::str::contains("CREATE TABLE \"users\""));

        assert!(!temp.path().join("liquibase").exists());
    }

    #[test]
    fn missing_snapshot_fails() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "");

        cli()
            .current_dir(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("failed to load snapshot"));
    }

    #[test]
    fn strict_mode_stops_on_ambiguity() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "strict = true\n");
        write_snapshot(temp.path(), USERS);
        cli().current_dir(temp.path()).arg("generate").assert().success();

        write_snapshot(temp.path(), USERS_EMAIL_VARCHAR);
        let master = temp.path().join("liquibase/changelog-master.xml");
        let before = fs::read_to_string(&master).unwrap();

        cli()
            .current_dir(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("changes type from text to varchar(320)"));

        assert_eq!(fs::read_to_string(&master).unwrap(), before);
        assert_eq!(migrations(temp.path()).len(), 1);
    }
}
