//! Encryption key generation

use anyhow::{Context, Result};
use clap::Args;
use keyhold_storage::generate_key_file;
use std::path::PathBuf;

use crate::output;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output key file path
    pub path: PathBuf,

    /// Overwrite existing key file
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: KeygenArgs) -> Result<()> {
    let written = generate_key_file(&args.path, args.force)
        .with_context(|| format!("Failed to generate key file {}", args.path.display()))?;

    output::success(&format!("Encryption key saved to {}", written.display()));
    output::warning("Keep this key secure and backed up; stored values cannot be read without it");
    output::info("Reference it from keyhold.yaml:");
    eprintln!("  encryption:\n    key_file: {}", written.display());
    Ok(())
}
