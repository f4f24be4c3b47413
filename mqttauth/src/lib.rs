//! SQLite-backed authentication and ACL backend for MQTT brokers.
//!
//! The backend answers two questions for the broker, both against a single
//! SQLite file opened read-only with shared cache:
//!
//! - **Connect**: which password hash is on record for a user
//!   ([`SqliteBackend::get_user`]). The broker verifies the password itself.
//! - **Publish / Subscribe**: may a user access a topic with a given mode
//!   ([`SqliteBackend::acl_check`]).
//!
//! Every answer is a [`Verdict`]. `Defer` means "no opinion", so several
//! backends can be chained ([`BackendChain`]).
//!
//! ## Configuration
//!
//! | key | required | meaning |
//! |-----|----------|---------|
//! | `dbpath` | yes | path to the SQLite database |
//! | `sqliteuserquery` | yes | `?1` = username, column 0 = password hash |
//! | `sqliteaclquery` | no | `?1` = username, `?2` = access mode, column 0 = topic pattern |
//!
//! ACL patterns may contain `%c` (client id) and `%u` (username), and the MQTT
//! wildcards `+` and `#`.
//!
//! ## Example
//!
//! ```no_run
//! use giztoy_mqttauth::{Config, SqliteBackend, SqliteConfig, Verdict};
//!
//! fn main() -> giztoy_mqttauth::Result<()> {
//!     let config = Config::from_pairs([
//!         ("dbpath", "/var/lib/mosquitto/auth.db"),
//!         ("sqliteuserquery", "SELECT pw FROM users WHERE username = ?"),
//!         ("sqliteaclquery", "SELECT topic FROM acls WHERE username = ? AND (rw & ?) != 0"),
//!     ]);
//!     let backend = SqliteBackend::open(&SqliteConfig::from_config(&config)?)?;
//!
//!     let (_, hash) = backend.get_user("alice");
//!     println!("hash on record: {:?}", hash);
//!
//!     let verdict = backend.acl_check("client-1", "alice", "sensors/temp", 1);
//!     assert_eq!(verdict, Verdict::Allow);
//!     Ok(())
//! }
//! ```

mod backend;
pub mod config;
mod error;
pub mod expand;
pub mod plugin;
mod sqlite;
mod stmt;
pub mod topic;
mod verdict;

pub use backend::{Backend, BackendChain, UserLookup};
pub use config::{Config, SqliteConfig};
pub use error::{Error, Result};
pub use expand::{Placeholders, TopicExpander};
pub use sqlite::{SqliteBackend, SqliteBackendBuilder};
pub use stmt::QueryStats;
pub use topic::{MqttTopicMatcher, TopicMatcher, topic_matches_sub};
pub use verdict::{ACCESS_READ, ACCESS_SUBSCRIBE, ACCESS_WRITE, Verdict};
