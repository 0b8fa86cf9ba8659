#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use drizzle_liquibase::Config;
use drizzle_liquibase::snapshot::{
    Column, Index, Policy, PrimaryKey, SchemaSnapshot, TableDefinition, UniqueConstraint,
};
use std::path::Path;

pub fn snapshot(tables: impl IntoIterator<Item = TableDefinition>) -> SchemaSnapshot {
    SchemaSnapshot::from_tables(tables).expect("valid snapshot")
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
}

/// Config rooted in a temporary directory
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::new("ci");
    config.schema_dir = dir.join("schema");
    config.migrations_dir = dir.join("liquibase/migrations");
    config.master_changelog = dir.join("liquibase/changelog-master.xml");
    config
}

/// `public.users` with an id primary key and an indexed email
pub fn users() -> TableDefinition {
    TableDefinition::new("public", "users")
        .column(Column::new("id", "serial").not_null())
        .column(Column::new("email", "text").not_null())
        .primary_key(PrimaryKey::new("users_pkey", ["id"]))
        .index(Index::new("users_email_idx", ["email"]))
}

/// `public.posts` with two indexes and a unique constraint
pub fn posts() -> TableDefinition {
    TableDefinition::new("public", "posts")
        .column(Column::new("id", "serial").not_null())
        .column(Column::new("author_id", "integer").not_null())
        .column(Column::new("slug", "text").not_null())
        .primary_key(PrimaryKey::new("posts_pkey", ["id"]))
        .index(Index::new("posts_author_idx", ["author_id"]))
        .index(Index::new("posts_created_idx", ["id"]))
        .unique(UniqueConstraint::new("posts_slug_key", ["slug"]))
}

pub fn owner_policy() -> Policy {
    Policy::new("posts_owner")
        .for_clause("select")
        .to_role("authenticated")
        .using("author_id = current_setting('app.user')::int")
}
