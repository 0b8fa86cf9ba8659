//! Master changelog maintenance
//!
//! The master changelog is append-only: existing content is kept byte for
//! byte and a single `include` is added at the end.

use super::EmissionError;
use super::format::{escape_xml, xml_header};
use crate::config::MasterFormat;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static XML_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<include\s[^>]*\bfile\s*=\s*"([^"]*)""#).expect("valid include pattern")
});

static XML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));

const XML_CLOSE: &str = "</databaseChangeLog>";

/// An `include` entry pointing at a migration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Include {
    pub file: String,
    pub relative_to_changelog_file: bool,
}

impl Include {
    /// Path of `migration` as seen from the master changelog
    pub fn new(master: &Path, migration: &Path) -> Self {
        let master_dir = normalize(master.parent().unwrap_or(Path::new("")));
        let migration = normalize(migration);
        match migration.strip_prefix(&master_dir) {
            Ok(relative) => Self {
                file: slashes(relative),
                relative_to_changelog_file: true,
            },
            Err(_) => Self {
                file: slashes(&migration),
                relative_to_changelog_file: false,
            },
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Files the master includes, in order
pub fn included_files(
    path: &Path,
    format: MasterFormat,
    existing: Option<&str>,
) -> Result<Vec<String>, EmissionError> {
    let Some(existing) = existing else {
        return Ok(Vec::new());
    };
    match format {
        MasterFormat::Xml => Ok(xml_includes(existing)),
        MasterFormat::Json => Ok(json_entries(path, existing)?
            .iter()
            .filter_map(|entry| entry.pointer("/include/file").and_then(Value::as_str))
            .map(str::to_string)
            .collect()),
    }
}

/// Number of includes already in the master
pub fn count_includes(
    path: &Path,
    format: MasterFormat,
    existing: Option<&str>,
) -> Result<usize, EmissionError> {
    Ok(included_files(path, format, existing)?.len())
}

/// `file` attributes of the includes outside comments, unescaped
fn xml_includes(existing: &str) -> Vec<String> {
    let live = XML_COMMENT.replace_all(existing, "");
    XML_INCLUDE
        .captures_iter(&live)
        .map(|caps| unescape_xml(&caps[1]))
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Master contents with `include` appended
pub fn append_include(
    path: &Path,
    format: MasterFormat,
    existing: Option<&str>,
    include: &Include,
) -> Result<String, EmissionError> {
    match format {
        MasterFormat::Xml => append_xml(path, existing, include),
        MasterFormat::Json => append_json(path, existing, include),
    }
}

fn xml_include(include: &Include) -> Result<String, EmissionError> {
    let mut line = format!("<include file=\"{}\"", escape_xml(&include.file)?);
    if include.relative_to_changelog_file {
        line.push_str(" relativeToChangelogFile=\"true\"");
    }
    line.push_str("/>");
    Ok(line)
}

fn append_xml(
    path: &Path,
    existing: Option<&str>,
    include: &Include,
) -> Result<String, EmissionError> {
    let line = xml_include(include)?;
    let Some(existing) = existing else {
        return Ok(format!("{}    {line}\n{XML_CLOSE}\n", xml_header()));
    };

    if xml_includes(existing).contains(&include.file) {
        return Err(EmissionError::AlreadyIncluded(include.file.clone()));
    }

    let close = existing
        .rfind(XML_CLOSE)
        .ok_or_else(|| EmissionError::MalformedMaster {
            path: path.to_path_buf(),
            reason: format!("no closing {XML_CLOSE}"),
        })?;

    let line_start = existing[..close].rfind('\n').map_or(0, |i| i + 1);
    let (head, tail) = if existing[line_start..close].trim().is_empty() {
        existing.split_at(line_start)
    } else {
        existing.split_at(close)
    };

    let mut out = String::with_capacity(existing.len() + line.len() + 8);
    out.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("    ");
    out.push_str(&line);
    out.push('\n');
    out.push_str(tail);
    Ok(out)
}

fn json_entries(path: &Path, existing: &str) -> Result<Vec<Value>, EmissionError> {
    let malformed = |reason: String| EmissionError::MalformedMaster {
        path: path.to_path_buf(),
        reason,
    };
    let value: Value = serde_json::from_str(existing).map_err(|e| malformed(e.to_string()))?;
    match value.get("databaseChangeLog") {
        Some(Value::Array(entries)) => Ok(entries.clone()),
        _ => Err(malformed("expected a databaseChangeLog array".into())),
    }
}

fn append_json(
    path: &Path,
    existing: Option<&str>,
    include: &Include,
) -> Result<String, EmissionError> {
    let mut root = match existing {
        Some(existing) => serde_json::from_str::<Value>(existing).map_err(|e| {
            EmissionError::MalformedMaster {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?,
        None => Value::Object(Map::from_iter([(
            "databaseChangeLog".to_string(),
            Value::Array(Vec::new()),
        )])),
    };

    let Some(Value::Array(entries)) = root.get_mut("databaseChangeLog") else {
        return Err(EmissionError::MalformedMaster {
            path: path.to_path_buf(),
            reason: "expected a databaseChangeLog array".into(),
        });
    };

    let already = entries.iter().any(|entry| {
        entry
            .pointer("/include/file")
            .and_then(Value::as_str)
            .is_some_and(|file| file == include.file)
    });
    if already {
        return Err(EmissionError::AlreadyIncluded(include.file.clone()));
    }

    let mut body = Map::new();
    body.insert("file".into(), Value::String(include.file.clone()));
    if include.relative_to_changelog_file {
        body.insert("relativeToChangelogFile".into(), Value::Bool(true));
    }
    entries.push(Value::Object(Map::from_iter([(
        "include".to_string(),
        Value::Object(body),
    )])));

    let mut out = serde_json::to_string_pretty(&root)?;
    out.push('\n');
    Ok(out)
}
