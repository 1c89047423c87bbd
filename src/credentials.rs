//! Loading of `KEY=VALUE` credential files.
//!
//! A credentials file is plain UTF-8 text with one assignment per line.
//! There is no quoting, escaping or comment syntax: every line is stripped
//! of surrounding whitespace, lines without an `=` are ignored, and the rest
//! are split at the first `=`.

use std::{convert::Infallible, fmt, fs, path::Path, str::FromStr};

use tracing::debug;

use crate::error::CredentialError;

pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub key: String,
    pub value: String,
}

/// Ordered mapping of credential keys to values.
///
/// Keys are unique. Re-inserting a key keeps its original position and
/// replaces the value, so the last occurrence in a file wins.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    entries: Vec<CredentialEntry>,
}

impl CredentialSet {
    pub fn new() -> CredentialSet {
        CredentialSet::default()
    }

    /// Parses credential text. Never fails: malformed lines are skipped.
    ///
    /// `\n`, `\r\n` and a bare `\r` all end a line.
    pub fn parse(text: &str) -> CredentialSet {
        let mut set = CredentialSet::new();
        for line in text.split(['\n', '\r']) {
            if let Some((key, value)) = line.trim().split_once('=') {
                set.insert(key, value);
            }
        }
        set
    }

    fn insert(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value.to_string(),
            None => self.entries.push(CredentialEntry {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CredentialEntry> {
        self.entries.iter()
    }
}

// Values are secrets, only keys are printed.
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.key, "<redacted>")))
            .finish()
    }
}

impl FromStr for CredentialSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CredentialSet::parse(s))
    }
}

impl<'a> IntoIterator for &'a CredentialSet {
    type Item = &'a CredentialEntry;
    type IntoIter = std::slice::Iter<'a, CredentialEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Reads and parses the credentials file at `path`.
///
/// The file is read in a single call, so the handle is closed before this
/// returns on every path. Either the whole file parses or an error is
/// returned; there is no partial result.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<CredentialSet, CredentialError> {
    let path = path.as_ref();

    let bytes = fs::read(path).map_err(|source| CredentialError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let text = std::str::from_utf8(&bytes).map_err(|source| CredentialError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;

    let set = CredentialSet::parse(text.strip_prefix('\u{feff}').unwrap_or(text));
    debug!(path = %path.display(), entries = set.len(), "loaded credentials");
    Ok(set)
}

pub fn load_default_credentials() -> Result<CredentialSet, CredentialError> {
    load_credentials(DEFAULT_CREDENTIALS_PATH)
}
