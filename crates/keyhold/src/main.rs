//! keyhold CLI - encrypted key/value storage and locks on object storage
//!
//! This is the main entry point for the keyhold command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use keyhold_core::ConfigOverrides;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let settings = Settings {
        config: cli.config,
        overrides: ConfigOverrides::from(&cli.overrides),
    };

    match cli.command {
        Commands::Store(args) => commands::object::store(&settings.connect().await?, args).await,
        Commands::Load(args) => commands::object::load(&settings.connect().await?, args).await,
        Commands::Delete(args) => commands::object::delete(&settings.connect().await?, args).await,
        Commands::Exists(args) => {
            if !commands::object::exists(&settings.connect().await?, args).await {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Stat(args) => commands::object::stat(&settings.connect().await?, args).await,
        Commands::List(args) => commands::object::list(&settings.connect().await?, args).await,
        Commands::Lock(args) => commands::lock::lock(&settings.connect().await?, args).await,
        Commands::Unlock(args) => commands::lock::unlock(&settings.connect().await?, args).await,
        Commands::Keygen(args) => commands::keygen::run(args),
        Commands::Check => commands::check::run(&settings).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so `load` output can be piped
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
