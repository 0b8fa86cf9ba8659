//! Changelog renderers for the three Liquibase dialects

use super::EmissionError;
use crate::config::LiquibaseMode;
use crate::sql::{Rollback, Statements};
use serde::Serialize;
use std::fmt::Write as _;

pub const XML_NAMESPACE: &str = "http://www.liquibase.org/xml/ns/dbchangelog";
pub const XML_SCHEMA_LOCATION: &str = "http://www.liquibase.org/xml/ns/dbchangelog https://www.liquibase.org/xml/ns/dbchangelog/dbchangelog-latest.xsd";

/// One Liquibase changeSet ready to be rendered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSetBlock {
    pub id: String,
    pub author: String,
    pub comment: String,
    pub statements: Statements,
}

pub fn render(mode: LiquibaseMode, blocks: &[ChangeSetBlock]) -> Result<String, EmissionError> {
    match mode {
        LiquibaseMode::Sql => Ok(render_sql(blocks)),
        LiquibaseMode::Xml => render_xml(blocks),
        LiquibaseMode::Json => render_json(blocks),
    }
}

// =============================================================================
// Formatted SQL
// =============================================================================

fn render_sql(blocks: &[ChangeSetBlock]) -> String {
    let mut out = String::from("-- liquibase formatted sql\n");
    for block in blocks {
        let author = if block.author.contains(char::is_whitespace) {
            format!("\"{}\"", block.author)
        } else {
            block.author.clone()
        };
        let _ = writeln!(out, "\n-- changeset {author}:{}", block.id);
        let _ = writeln!(out, "-- comment: {}", block.comment);
        for statement in &block.statements.forward {
            let _ = writeln!(out, "{statement}");
        }
        match &block.statements.rollback {
            Rollback::Statements(statements) => {
                for line in statements.iter().flat_map(|s| s.lines()) {
                    let _ = writeln!(out, "-- rollback {line}");
                }
            }
            Rollback::Irreversible { .. } => out.push_str("-- rollback empty\n"),
        }
    }
    out
}

// =============================================================================
// XML
// =============================================================================

/// Escape text for XML content and attribute values
pub fn escape_xml(text: &str) -> Result<String, EmissionError> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() || matches!(c, '\u{FFFE}' | '\u{FFFF}') => {
                return Err(EmissionError::InvalidXmlText(text.to_string()));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn render_xml(blocks: &[ChangeSetBlock]) -> Result<String, EmissionError> {
    let mut out = xml_header();
    for block in blocks {
        let _ = writeln!(
            out,
            "    <changeSet id=\"{}\" author=\"{}\">",
            escape_xml(&block.id)?,
            escape_xml(&block.author)?
        );
        let _ = writeln!(out, "        <comment>{}</comment>", escape_xml(&block.comment)?);
        for statement in &block.statements.forward {
            let _ = writeln!(out, "        <sql>{}</sql>", escape_xml(statement)?);
        }
        match &block.statements.rollback {
            Rollback::Statements(statements) => {
                out.push_str("        <rollback>\n");
                for statement in statements {
                    let _ = writeln!(out, "            <sql>{}</sql>", escape_xml(statement)?);
                }
                out.push_str("        </rollback>\n");
            }
            Rollback::Irreversible { reason } => {
                let _ = writeln!(out, "        <!-- irreversible: {} -->", xml_comment(reason));
                out.push_str("        <rollback/>\n");
            }
        }
        out.push_str("    </changeSet>\n");
    }
    out.push_str("</databaseChangeLog>\n");
    Ok(out)
}

pub(super) fn xml_header() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <databaseChangeLog\n    \
         xmlns=\"{XML_NAMESPACE}\"\n    \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n    \
         xsi:schemaLocation=\"{XML_SCHEMA_LOCATION}\">\n"
    )
}

/// `--` may not appear inside an XML comment
fn xml_comment(text: &str) -> String {
    text.replace("--", "- -")
}

// =============================================================================
// JSON
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonChangelog<'a> {
    database_change_log: Vec<JsonEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonEntry<'a> {
    change_set: JsonChangeSet<'a>,
}

#[derive(Serialize)]
struct JsonChangeSet<'a> {
    id: &'a str,
    author: &'a str,
    comment: &'a str,
    changes: Vec<JsonSql<'a>>,
    rollback: JsonRollback<'a>,
}

#[derive(Serialize)]
struct JsonSql<'a> {
    sql: JsonSqlBody<'a>,
}

#[derive(Serialize)]
struct JsonSqlBody<'a> {
    sql: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonRollback<'a> {
    Changes(Vec<JsonSql<'a>>),
    Empty(&'static str),
}

fn json_sql(statements: &[String]) -> Vec<JsonSql<'_>> {
    statements
        .iter()
        .map(|sql| JsonSql {
            sql: JsonSqlBody { sql },
        })
        .collect()
}

fn render_json(blocks: &[ChangeSetBlock]) -> Result<String, EmissionError> {
    let changelog = JsonChangelog {
        database_change_log: blocks
            .iter()
            .map(|block| JsonEntry {
                change_set: JsonChangeSet {
                    id: &block.id,
                    author: &block.author,
                    comment: &block.comment,
                    changes: json_sql(&block.statements.forward),
                    rollback: match &block.statements.rollback {
                        Rollback::Statements(statements) => {
                            JsonRollback::Changes(json_sql(statements))
                        }
                        Rollback::Irreversible { .. } => JsonRollback::Empty("empty"),
                    },
                },
            })
            .collect(),
    };
    let mut out = serde_json::to_string_pretty(&changelog)?;
    out.push('\n');
    Ok(out)
}
