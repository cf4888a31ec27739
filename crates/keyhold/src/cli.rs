//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand};
use keyhold_core::ConfigOverrides;
use std::path::PathBuf;

pub use crate::commands::keygen::KeygenArgs;
pub use crate::commands::lock::LockArgs;
pub use crate::commands::object::{KeyArgs, ListArgs, LoadArgs, StatArgs, StoreArgs};

/// keyhold - encrypted key/value storage and distributed locks on object storage
#[derive(Parser, Debug)]
#[command(name = "keyhold")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to keyhold.yaml config file
    #[arg(short, long, global = true, env = "KEYHOLD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that take precedence over the config file
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Bucket name (overrides config)
    #[arg(long, global = true, env = "KEYHOLD_BUCKET")]
    pub bucket: Option<String>,

    /// Region (overrides config)
    #[arg(long, global = true, env = "KEYHOLD_REGION")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (overrides config)
    #[arg(long, global = true, env = "KEYHOLD_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Access key id (overrides config)
    #[arg(long, global = true, env = "KEYHOLD_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Access key secret (overrides config)
    #[arg(long, global = true, env = "KEYHOLD_ACCESS_KEY_SECRET", hide_env_values = true)]
    pub access_key_secret: Option<String>,

    /// Encryption key file (overrides config)
    #[arg(long, global = true, env = "KEYHOLD_KEY_FILE")]
    pub key_file: Option<PathBuf>,
}

impl From<&OverrideArgs> for ConfigOverrides {
    fn from(args: &OverrideArgs) -> Self {
        ConfigOverrides {
            bucket: args.bucket.clone(),
            region: args.region.clone(),
            endpoint: args.endpoint.clone(),
            access_key_id: args.access_key_id.clone(),
            access_key_secret: args.access_key_secret.clone(),
            key_file: args.key_file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypt and store a value
    Store(StoreArgs),

    /// Load and decrypt a value
    Load(LoadArgs),

    /// Delete a key (succeeds if it is already gone)
    Delete(KeyArgs),

    /// Exit with status 0 if a key exists, 1 otherwise
    Exists(KeyArgs),

    /// Show metadata for a key
    Stat(StatArgs),

    /// List keys under a prefix
    List(ListArgs),

    /// Acquire a lock and hold it
    Lock(LockArgs),

    /// Release a lock
    Unlock(KeyArgs),

    /// Generate a new encryption key file
    Keygen(KeygenArgs),

    /// Check configuration and bucket access
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_store_requires_one_source() {
        assert!(Cli::try_parse_from(["keyhold", "store", "k"]).is_err());
        assert!(
            Cli::try_parse_from(["keyhold", "store", "k", "--value", "v", "--stdin"]).is_err()
        );

        let cli = parse(&["keyhold", "store", "certs/a.pem", "--value", "PEM"]);
        match cli.command {
            Commands::Store(args) => {
                assert_eq!(args.key, "certs/a.pem");
                assert_eq!(args.value.as_deref(), Some("PEM"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = parse(&[
            "keyhold",
            "list",
            "certs",
            "-r",
            "--bucket",
            "staging",
            "--key-file",
            "/tmp/master.key",
            "-vv",
        ]);

        assert_eq!(cli.verbose, 2);
        let overrides = ConfigOverrides::from(&cli.overrides);
        assert_eq!(overrides.bucket.as_deref(), Some("staging"));
        assert_eq!(overrides.key_file, Some(PathBuf::from("/tmp/master.key")));
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.prefix, "certs");
                assert!(args.recursive);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_list_prefix_defaults_to_root() {
        match parse(&["keyhold", "list"]).command {
            Commands::List(args) => {
                assert_eq!(args.prefix, "");
                assert!(!args.recursive);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_lock_hold_secs() {
        match parse(&["keyhold", "lock", "renew/example.com", "--hold-secs", "30"]).command {
            Commands::Lock(args) => {
                assert_eq!(args.key, "renew/example.com");
                assert_eq!(args.hold_secs, Some(30));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
