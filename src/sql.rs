//! PostgreSQL statement generation
//!
//! Every change entry becomes forward statements plus the statements that
//! undo them. Changes that cannot be undone carry an explicit
//! [`Rollback::Irreversible`] marker instead.

use crate::change::{ChangeEntry, SchemaObject};
use crate::snapshot::{Column, DEFAULT_SCHEMA, Index, Policy, TableDefinition, UniqueConstraint};
use crate::traits::{ChangeKind, ObjectKind, QualifiedName};
use regex::Regex;
use std::sync::LazyLock;

static SIMPLE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("valid identifier pattern")
});

/// Role names that are keywords rather than identifiers
const ROLE_KEYWORDS: &[&str] = &["public", "current_role", "current_user", "session_user"];

// =============================================================================
// Statements
// =============================================================================

/// How to undo a change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rollback {
    Statements(Vec<String>),
    Irreversible { reason: String },
}

/// SQL for one change entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statements {
    pub forward: Vec<String>,
    pub rollback: Rollback,
}

impl Statements {
    fn reversible(forward: Vec<String>, rollback: Vec<String>) -> Self {
        Self {
            forward,
            rollback: Rollback::Statements(rollback),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("{change} {} '{target}' is missing its before or after state", .kind.label())]
    MissingState {
        change: ChangeKind,
        kind: ObjectKind,
        target: QualifiedName,
    },

    #[error("{} '{target}' cannot go away implicitly with a drop", .kind.label())]
    NotADependent {
        kind: ObjectKind,
        target: QualifiedName,
    },
}

// =============================================================================
// Generator
// =============================================================================

/// Generates PostgreSQL DDL for change entries
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGenerator;

impl PostgresGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, entry: &ChangeEntry) -> Result<Statements, SqlError> {
        use ChangeKind::{Alter, Create, Drop};
        use SchemaObject as O;

        let table = &entry.table();
        match (entry.change, &entry.before, &entry.after) {
            (Create, _, Some(O::Table(t))) => Ok(Statements::reversible(
                self.create_table(t)?,
                vec![self.drop_table(t)?],
            )),
            (Drop, Some(O::Table(t)), _) => {
                let mut rollback = self.create_table(t)?;
                rollback.extend(self.recreate_implicit(table, entry)?);
                Ok(Statements::reversible(vec![self.drop_table(t)?], rollback))
            }
            (Alter, Some(O::Table(from)), Some(O::Table(to))) => Ok(Statements::reversible(
                self.alter_table(from, to)?,
                self.alter_table(to, from)?,
            )),

            (Create, _, Some(O::Column(c))) => Ok(Statements::reversible(
                vec![self.add_column(table, c)?],
                vec![self.drop_column(table, c)?],
            )),
            (Drop, Some(O::Column(c)), _) => {
                let forward = vec![self.drop_column(table, c)?];
                if c.not_null && c.default.is_none() {
                    return Ok(Statements {
                        forward,
                        rollback: Rollback::Irreversible {
                            reason: format!(
                                "column \"{}\" was NOT NULL without a default",
                                c.name
                            ),
                        },
                    });
                }
                let mut rollback = vec![self.add_column(table, c)?];
                rollback.extend(self.recreate_implicit(table, entry)?);
                Ok(Statements::reversible(forward, rollback))
            }
            (Alter, Some(O::Column(from)), Some(O::Column(to))) => Ok(Statements::reversible(
                self.alter_column(table, from, to)?,
                self.alter_column(table, to, from)?,
            )),

            (Create, _, Some(O::Index(i))) => Ok(Statements::reversible(
                vec![self.create_index(table, i)?],
                vec![self.drop_index(table, i)?],
            )),
            (Drop, Some(O::Index(i)), _) => Ok(Statements::reversible(
                vec![self.drop_index(table, i)?],
                vec![self.create_index(table, i)?],
            )),
            (Alter, Some(O::Index(from)), Some(O::Index(to))) => Ok(Statements::reversible(
                vec![self.drop_index(table, from)?, self.create_index(table, to)?],
                vec![self.drop_index(table, to)?, self.create_index(table, from)?],
            )),

            (Create, _, Some(O::Unique(u))) => Ok(Statements::reversible(
                vec![self.add_unique(table, u)?],
                vec![self.drop_constraint(table, &u.name)?],
            )),
            (Drop, Some(O::Unique(u)), _) => Ok(Statements::reversible(
                vec![self.drop_constraint(table, &u.name)?],
                vec![self.add_unique(table, u)?],
            )),
            (Alter, Some(O::Unique(from)), Some(O::Unique(to))) => Ok(Statements::reversible(
                vec![self.drop_constraint(table, &from.name)?, self.add_unique(table, to)?],
                vec![self.drop_constraint(table, &to.name)?, self.add_unique(table, from)?],
            )),

            (Create, _, Some(O::Policy(p))) => Ok(Statements::reversible(
                vec![self.create_policy(table, p)?],
                vec![self.drop_policy(table, p)?],
            )),
            (Drop, Some(O::Policy(p)), _) => Ok(Statements::reversible(
                vec![self.drop_policy(table, p)?],
                vec![self.create_policy(table, p)?],
            )),
            (Alter, Some(O::Policy(from)), Some(O::Policy(to))) => Ok(Statements::reversible(
                self.alter_policy(table, from, to)?,
                self.alter_policy(table, to, from)?,
            )),

            _ => Err(SqlError::MissingState {
                change: entry.change,
                kind: entry.kind,
                target: entry.target.clone(),
            }),
        }
    }

    /// Dependents that went away with a table or column drop
    fn recreate_implicit(
        &self,
        table: &QualifiedName,
        entry: &ChangeEntry,
    ) -> Result<Vec<String>, SqlError> {
        entry
            .implicit
            .iter()
            .map(|member| match member {
                SchemaObject::Index(i) => self.create_index(table, i),
                SchemaObject::Unique(u) => self.add_unique(table, u),
                SchemaObject::Policy(p) => self.create_policy(table, p),
                SchemaObject::Table(_) | SchemaObject::Column(_) => Err(SqlError::NotADependent {
                    kind: member.kind(),
                    target: table.child(member.name()),
                }),
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Tables
    // -------------------------------------------------------------------------

    fn create_table(&self, table: &TableDefinition) -> Result<Vec<String>, SqlError> {
        let name = self.table_ref(&table.qualified_name())?;
        let mut lines = Vec::with_capacity(table.columns.len() + 1);
        for col in &table.columns {
            lines.push(format!("\t{}", self.column_def(col)?));
        }
        if let Some(pk) = &table.primary_key {
            lines.push(format!(
                "\tCONSTRAINT {} PRIMARY KEY({})",
                quote(&pk.name)?,
                quote_list(&pk.columns)?
            ));
        }

        let mut statements = vec![format!("CREATE TABLE {name} (\n{}\n);", lines.join(",\n"))];
        if table.rls_enabled {
            statements.push(format!("ALTER TABLE {name} ENABLE ROW LEVEL SECURITY;"));
        }
        Ok(statements)
    }

    fn drop_table(&self, table: &TableDefinition) -> Result<String, SqlError> {
        Ok(format!(
            "DROP TABLE {};",
            self.table_ref(&table.qualified_name())?
        ))
    }

    /// Primary key and RLS changes
    fn alter_table(
        &self,
        from: &TableDefinition,
        to: &TableDefinition,
    ) -> Result<Vec<String>, SqlError> {
        let name = self.table_ref(&to.qualified_name())?;
        let mut statements = Vec::new();

        if from.primary_key != to.primary_key {
            if let Some(pk) = &from.primary_key {
                statements.push(format!(
                    "ALTER TABLE {name} DROP CONSTRAINT {};",
                    quote(&pk.name)?
                ));
            }
            if let Some(pk) = &to.primary_key {
                statements.push(format!(
                    "ALTER TABLE {name} ADD CONSTRAINT {} PRIMARY KEY({});",
                    quote(&pk.name)?,
                    quote_list(&pk.columns)?
                ));
            }
        }

        if from.rls_enabled != to.rls_enabled {
            let action = if to.rls_enabled { "ENABLE" } else { "DISABLE" };
            statements.push(format!("ALTER TABLE {name} {action} ROW LEVEL SECURITY;"));
        }

        Ok(statements)
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    fn column_def(&self, col: &Column) -> Result<String, SqlError> {
        let mut def = format!("{} {}", quote(&col.name)?, col.sql_type);
        if col.not_null {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &col.default {
            def.push_str(&format!(" DEFAULT {default}"));
        }
        Ok(def)
    }

    fn add_column(&self, table: &QualifiedName, col: &Column) -> Result<String, SqlError> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {};",
            self.table_ref(table)?,
            self.column_def(col)?
        ))
    }

    fn drop_column(&self, table: &QualifiedName, col: &Column) -> Result<String, SqlError> {
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.table_ref(table)?,
            quote(&col.name)?
        ))
    }

    fn alter_column(
        &self,
        table: &QualifiedName,
        from: &Column,
        to: &Column,
    ) -> Result<Vec<String>, SqlError> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.table_ref(table)?,
            quote(&to.name)?
        );
        let mut statements = Vec::new();

        if from.sql_type != to.sql_type {
            statements.push(format!("{prefix} SET DATA TYPE {};", to.sql_type));
        }
        if from.default != to.default {
            match &to.default {
                Some(default) => statements.push(format!("{prefix} SET DEFAULT {default};")),
                None => statements.push(format!("{prefix} DROP DEFAULT;")),
            }
        }
        if from.not_null != to.not_null {
            let action = if to.not_null { "SET" } else { "DROP" };
            statements.push(format!("{prefix} {action} NOT NULL;"));
        }

        Ok(statements)
    }

    // -------------------------------------------------------------------------
    // Indexes and unique constraints
    // -------------------------------------------------------------------------

    fn create_index(&self, table: &QualifiedName, index: &Index) -> Result<String, SqlError> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let columns = index
            .columns
            .iter()
            .map(|c| {
                if SIMPLE_IDENTIFIER.is_match(c) {
                    quote(c)
                } else {
                    Ok(c.clone())
                }
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let mut sql = format!(
            "CREATE {}INDEX {} ON {} USING {} ({})",
            unique,
            quote(&index.name)?,
            self.table_ref(table)?,
            index.method.as_deref().unwrap_or("btree"),
            columns
        );
        if let Some(predicate) = &index.r#where {
            sql.push_str(&format!(" WHERE {predicate}"));
        }
        sql.push(';');
        Ok(sql)
    }

    fn drop_index(&self, table: &QualifiedName, index: &Index) -> Result<String, SqlError> {
        Ok(format!(
            "DROP INDEX {}{};",
            schema_prefix(table.schema())?,
            quote(&index.name)?
        ))
    }

    fn add_unique(
        &self,
        table: &QualifiedName,
        unique: &UniqueConstraint,
    ) -> Result<String, SqlError> {
        let nulls = if unique.nulls_not_distinct {
            " NULLS NOT DISTINCT"
        } else {
            ""
        };
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE{}({});",
            self.table_ref(table)?,
            quote(&unique.name)?,
            nulls,
            quote_list(&unique.columns)?
        ))
    }

    fn drop_constraint(&self, table: &QualifiedName, name: &str) -> Result<String, SqlError> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            self.table_ref(table)?,
            quote(name)?
        ))
    }

    // -------------------------------------------------------------------------
    // Policies
    // -------------------------------------------------------------------------

    fn create_policy(&self, table: &QualifiedName, policy: &Policy) -> Result<String, SqlError> {
        let mut sql = format!(
            "CREATE POLICY {} ON {}",
            quote(&policy.name)?,
            self.table_ref(table)?
        );
        if let Some(as_clause) = &policy.as_clause {
            sql.push_str(&format!(" AS {}", as_clause.to_uppercase()));
        }
        if let Some(for_clause) = &policy.for_clause {
            sql.push_str(&format!(" FOR {}", for_clause.to_uppercase()));
        }
        if !policy.to.is_empty() {
            sql.push_str(&format!(" TO {}", roles(&policy.to)?));
        }
        if let Some(using) = &policy.using {
            sql.push_str(&format!(" USING ({using})"));
        }
        if let Some(check) = &policy.with_check {
            sql.push_str(&format!(" WITH CHECK ({check})"));
        }
        sql.push(';');
        Ok(sql)
    }

    fn drop_policy(&self, table: &QualifiedName, policy: &Policy) -> Result<String, SqlError> {
        Ok(format!(
            "DROP POLICY {} ON {};",
            quote(&policy.name)?,
            self.table_ref(table)?
        ))
    }

    /// `ALTER POLICY` when possible, drop and create otherwise.
    ///
    /// `AS` and `FOR` cannot be altered, and a removed `USING` or `WITH CHECK`
    /// expression cannot be cleared in place.
    fn alter_policy(
        &self,
        table: &QualifiedName,
        from: &Policy,
        to: &Policy,
    ) -> Result<Vec<String>, SqlError> {
        let in_place = from.as_clause == to.as_clause
            && from.for_clause == to.for_clause
            && !(from.using.is_some() && to.using.is_none())
            && !(from.with_check.is_some() && to.with_check.is_none());

        if !in_place {
            return Ok(vec![
                self.drop_policy(table, from)?,
                self.create_policy(table, to)?,
            ]);
        }

        let mut sql = format!(
            "ALTER POLICY {} ON {}",
            quote(&to.name)?,
            self.table_ref(table)?
        );
        if from.to != to.to {
            if to.to.is_empty() {
                sql.push_str(" TO public");
            } else {
                sql.push_str(&format!(" TO {}", roles(&to.to)?));
            }
        }
        if from.using != to.using
            && let Some(using) = &to.using
        {
            sql.push_str(&format!(" USING ({using})"));
        }
        if from.with_check != to.with_check
            && let Some(check) = &to.with_check
        {
            sql.push_str(&format!(" WITH CHECK ({check})"));
        }
        sql.push(';');
        Ok(vec![sql])
    }

    // -------------------------------------------------------------------------
    // Names
    // -------------------------------------------------------------------------

    /// `"table"` for the default schema, `"schema"."table"` otherwise
    fn table_ref(&self, table: &QualifiedName) -> Result<String, SqlError> {
        Ok(format!(
            "{}{}",
            schema_prefix(table.schema())?,
            quote(table.table_str())?
        ))
    }
}

fn schema_prefix(schema: &str) -> Result<String, SqlError> {
    if schema == DEFAULT_SCHEMA {
        Ok(String::new())
    } else {
        Ok(format!("{}.", quote(schema)?))
    }
}

/// Quote an identifier, doubling embedded quotes
pub fn quote(ident: &str) -> Result<String, SqlError> {
    if ident.is_empty() || ident.chars().any(char::is_control) {
        return Err(SqlError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

fn quote_list(idents: &[String]) -> Result<String, SqlError> {
    Ok(idents
        .iter()
        .map(|i| quote(i))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

fn roles(roles: &[String]) -> Result<String, SqlError> {
    Ok(roles
        .iter()
        .map(|role| {
            if ROLE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(role)) {
                Ok(role.to_lowercase())
            } else {
                quote(role)
            }
        })
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}
