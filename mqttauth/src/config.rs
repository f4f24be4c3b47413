//! Backend configuration.
//!
//! The broker hands plug-ins a flat table of string options (in mosquitto
//! these are the `auth_opt_<key> <value>` lines). [`Config`] is that table;
//! [`SqliteConfig`] is the validated view the SQLite backend needs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Path to the SQLite database file.
pub const KEY_DB_PATH: &str = "dbpath";
/// User lookup query: `?1` = username, column 0 = password hash.
pub const KEY_USER_QUERY: &str = "sqliteuserquery";
/// ACL query: `?1` = username, `?2` = access mode, column 0 = topic pattern.
pub const KEY_ACL_QUERY: &str = "sqliteaclquery";

const MOSQUITTO_OPT_PREFIX: &str = "auth_opt_";

/// Plug-in option table. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct Config {
    options: BTreeMap<String, String>,
}

impl Config {
    /// Create an empty option table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            options: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up an option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Overlay another table on top of this one.
    pub fn merge(&mut self, other: Config) {
        self.options.extend(other.options);
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if no option is set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Collect the `auth_opt_*` lines of a mosquitto configuration.
    ///
    /// The value is everything after the first run of whitespace, so queries
    /// may contain spaces. Comments and unrelated directives are skipped.
    pub fn parse_mosquitto_conf(text: &str) -> Self {
        let mut config = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(rest) = line.strip_prefix(MOSQUITTO_OPT_PREFIX) else {
                continue;
            };
            let (key, value) = match rest.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (rest, ""),
            };
            if !key.is_empty() {
                config.set(key, value);
            }
        }
        config
    }

    /// Parse a flat YAML mapping of string options.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a flat JSON object of string options.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load options from a file.
    ///
    /// `.yaml` / `.yml` and `.json` files hold flat string maps; anything else
    /// is read as a mosquitto configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
            "yaml" | "yml" => Self::from_yaml_str(&text),
            "json" => Self::from_json_str(&text),
            _ => Ok(Self::parse_mosquitto_conf(&text)),
        }
    }
}

/// Validated SQLite backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file, opened read-only with shared cache.
    pub db_path: PathBuf,
    /// User lookup query.
    pub user_query: String,
    /// ACL query. `None` disables ACL filtering: every check is allowed.
    pub acl_query: Option<String>,
}

impl SqliteConfig {
    /// Extract and validate the SQLite keys.
    ///
    /// `dbpath` and `sqliteuserquery` are mandatory; an empty value counts as
    /// missing. `sqliteaclquery` is optional but must not be empty when given.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = required(config, KEY_DB_PATH)?;
        let user_query = required(config, KEY_USER_QUERY)?;
        let acl_query = match config.get(KEY_ACL_QUERY) {
            None => None,
            Some(q) if q.trim().is_empty() => {
                return Err(Error::InvalidConfig(format!("`{}` is empty", KEY_ACL_QUERY)));
            }
            Some(q) => Some(q.to_string()),
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            user_query: user_query.to_string(),
            acl_query,
        })
    }
}

fn required<'a>(config: &'a Config, key: &'static str) -> Result<&'a str> {
    match config.get(key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::MissingConfig(key)),
    }
}
