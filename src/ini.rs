//! INI documents read with `rust-ini`.
//!
//! Sections and keys keep their file order and spelling. Repeated sections
//! and repeated keys are kept as separate entries, and values are taken
//! verbatim: no escape sequences, no quote stripping.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use ::ini::{Ini, ParseOption};

use crate::error::{KovriError, KovriResult};

/// One `[name]` block and its `key = value` lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed INI file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Keys that appear before the first section header
    pub globals: Vec<(String, String)>,
    pub sections: Vec<Section>,
}

/// Read and parse the INI file at `path`
pub fn read(path: &Path) -> KovriResult<Document> {
    let content = std::fs::read_to_string(path).map_err(|source| KovriError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, path)
}

/// Parse INI `content`; `path` only names the origin in errors
pub fn parse(content: &str, path: &Path) -> KovriResult<Document> {
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(content, options).map_err(|e| KovriError::Syntax {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut document = Document::default();
    for (name, properties) in ini.iter() {
        let entries = properties
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()));
        match name {
            None => document.globals.extend(entries),
            Some(name) => document.sections.push(Section {
                name: name.to_string(),
                entries: entries.collect(),
            }),
        }
    }
    Ok(document)
}

/// First key that occurs more than once in `entries`
pub fn repeated_key(entries: &[(String, String)]) -> Option<&str> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(|(key, _)| key.as_str())
        .find(|key| !seen.insert(*key))
}

/// Path label used when a document is parsed from memory
pub(crate) fn inline_origin() -> PathBuf {
    PathBuf::from("<inline>")
}
