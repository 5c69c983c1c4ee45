//! Blob-store keys for parsed series and raw upstream payloads.
//!
//! The two kinds live under separate prefixes so a raw payload can never
//! shadow a parsed document for the same date.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Parsed,
    Raw,
}

impl KeyKind {
    fn namespace(self) -> &'static str {
        match self {
            KeyKind::Parsed => "parsed",
            KeyKind::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    kind: KeyKind,
    date: NaiveDate,
    path: String,
}

impl StorageKey {
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Derives keys from a source prefix and a calendar date.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    prefix: String,
}

impl KeyScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `parsed/<prefix>-YYYY-MM-DD.json`
    pub fn parsed(&self, date: NaiveDate) -> StorageKey {
        self.key(KeyKind::Parsed, date, "json")
    }

    /// `raw/<prefix>-YYYY-MM-DD.<extension>`
    pub fn raw(&self, date: NaiveDate, extension: &str) -> StorageKey {
        self.key(KeyKind::Raw, date, extension)
    }

    fn key(&self, kind: KeyKind, date: NaiveDate, extension: &str) -> StorageKey {
        StorageKey {
            kind,
            date,
            path: format!(
                "{}/{}-{}.{}",
                kind.namespace(),
                self.prefix,
                date.format("%Y-%m-%d"),
                extension
            ),
        }
    }
}
