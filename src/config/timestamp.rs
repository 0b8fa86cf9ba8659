//! Migration timestamp patterns
//!
//! Patterns are written with the tokens `YYYY YY MM DD HH mm ss SSS` and the
//! separators `-`, `_` and `.`, e.g. `YYYYMMDDHHmmss` or `YYYY-MM-DD_HH.mm`.
//! They are translated once into a `chrono` format string.

use super::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "YYYYMMDDHHmmss";

/// Longest tokens first so `YYYY` wins over `YY`
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("SSS", "%3f"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

const SEPARATORS: &[char] = &['-', '_', '.'];

/// Validated timestamp pattern
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimestampFormat {
    pattern: String,
    chrono: String,
}

impl TimestampFormat {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTimestampFormat {
            format: pattern.to_string(),
            reason,
        };

        let mut chrono = String::with_capacity(pattern.len() * 2);
        let mut rest = pattern;
        let mut tokens = 0usize;

        while let Some(c) = rest.chars().next() {
            if let Some((token, spec)) = TOKENS.iter().find(|(t, _)| rest.starts_with(t)) {
                chrono.push_str(spec);
                rest = &rest[token.len()..];
                tokens += 1;
                continue;
            }
            if c.is_ascii_alphabetic() {
                return Err(invalid(format!("unknown token starting at '{rest}'")));
            }
            if !(c.is_ascii_digit() || SEPARATORS.contains(&c)) {
                return Err(invalid(format!("'{c}' is not allowed in file names")));
            }
            chrono.push(c);
            rest = &rest[c.len_utf8()..];
        }

        if tokens == 0 {
            return Err(invalid("no date or time tokens".into()));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            chrono,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, at: &DateTime<Utc>) -> String {
        at.format(&self.chrono).to_string()
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            chrono: "%Y%m%d%H%M%S".to_string(),
        }
    }
}

impl TryFrom<String> for TimestampFormat {
    type Error = ConfigError;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::parse(&pattern)
    }
}

impl From<TimestampFormat> for String {
    fn from(format: TimestampFormat) -> Self {
        format.pattern
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
