//! mqttauth - Query the SQLite MQTT auth backend from the command line.
//!
//! Loads the same options the broker plug-in receives and runs one callback,
//! which makes it easy to check user and ACL queries before deploying them.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use giztoy_mqttauth::expand::{Placeholders, TopicExpander};
use giztoy_mqttauth::topic::{topic_matches_sub, validate_filter};
use giztoy_mqttauth::{
    ACCESS_READ, ACCESS_SUBSCRIBE, ACCESS_WRITE, Config, SqliteBackend, Verdict, plugin,
};

/// Query the SQLite MQTT auth backend.
#[derive(Parser, Debug)]
#[command(name = "mqttauth")]
#[command(about = "Query the SQLite MQTT auth backend")]
struct Cli {
    /// Options file: mosquitto conf (auth_opt_* lines), YAML or JSON
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Option override, e.g. -o dbpath=/tmp/auth.db (repeatable)
    #[arg(short = 'o', long = "opt", value_name = "KEY=VALUE", global = true)]
    opts: Vec<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up the stored password hash of a user
    Getuser {
        username: String,
        #[arg(long, default_value = "")]
        client_id: String,
    },
    /// Run the superuser check
    Superuser { username: String },
    /// Check topic access for a user
    Acl {
        username: String,
        topic: String,
        #[arg(long, default_value = "")]
        client_id: String,
        /// read, write, subscribe or a raw integer
        #[arg(short, long, default_value = "read")]
        access: String,
    },
    /// Match a topic against a subscription filter
    Match { filter: String, topic: String },
    /// Expand %c / %u placeholders in an ACL pattern
    Expand {
        pattern: String,
        #[arg(long, default_value = "")]
        client_id: String,
        #[arg(long, default_value = "")]
        username: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Match { filter, topic } => {
            if !validate_filter(filter) {
                bail!("invalid topic filter: {}", filter);
            }
            println!("{}", topic_matches_sub(filter, topic));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Expand {
            pattern,
            client_id,
            username,
        } => {
            println!("{}", Placeholders.expand(client_id, username, pattern));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Getuser {
            username,
            client_id,
        } => {
            let backend = open_backend(&cli)?;
            let (code, hash) = plugin::get_user(Some(&backend), username, "", client_id);
            println!("hash: {}", hash.as_deref().unwrap_or("(none)"));
            report(code, backend)
        }
        Commands::Superuser { username } => {
            let backend = open_backend(&cli)?;
            let code = plugin::superuser(Some(&backend), username);
            report(code, backend)
        }
        Commands::Acl {
            username,
            topic,
            client_id,
            access,
        } => {
            let access = parse_access(access)?;
            let backend = open_backend(&cli)?;
            let code = plugin::acl_check(Some(&backend), client_id, username, topic, access);
            report(code, backend)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::new(),
    };
    for opt in &cli.opts {
        let Some((key, value)) = opt.split_once('=') else {
            bail!("invalid option {:?}, expected KEY=VALUE", opt);
        };
        config.set(key.trim(), value);
    }
    Ok(config)
}

fn open_backend(cli: &Cli) -> Result<SqliteBackend> {
    let config = load_config(cli)?;
    match plugin::init(&config)? {
        Some(backend) => Ok(backend),
        None => bail!("failed to open the database"),
    }
}

fn parse_access(s: &str) -> Result<i32> {
    match s {
        "read" => Ok(ACCESS_READ),
        "write" => Ok(ACCESS_WRITE),
        "subscribe" => Ok(ACCESS_SUBSCRIBE),
        _ => s
            .parse::<i32>()
            .with_context(|| format!("invalid access mode: {}", s)),
    }
}

fn report(code: i32, backend: SqliteBackend) -> Result<ExitCode> {
    plugin::destroy(Some(backend));
    let verdict = Verdict::from_code(code).unwrap_or(Verdict::Error);
    println!("verdict: {}", verdict);
    Ok(if verdict == Verdict::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_access() {
        assert_eq!(parse_access("read").unwrap(), ACCESS_READ);
        assert_eq!(parse_access("subscribe").unwrap(), ACCESS_SUBSCRIBE);
        assert_eq!(parse_access("6").unwrap(), 6);
        assert!(parse_access("admin").is_err());
    }

    #[test]
    fn test_opt_overrides() {
        let cli = Cli::parse_from([
            "mqttauth",
            "-o",
            "dbpath=/tmp/a.db",
            "-o",
            "sqliteuserquery=SELECT pw FROM users WHERE name = ?",
            "getuser",
            "alice",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.get("dbpath"), Some("/tmp/a.db"));
        assert_eq!(
            config.get("sqliteuserquery"),
            Some("SELECT pw FROM users WHERE name = ?")
        );
    }

    #[test]
    fn test_bad_opt() {
        let cli = Cli::parse_from(["mqttauth", "-o", "dbpath", "superuser", "alice"]);
        assert!(load_config(&cli).is_err());
    }
}
