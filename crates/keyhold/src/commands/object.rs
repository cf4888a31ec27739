//! Key/value commands

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use keyhold_storage::Storage;
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::output;

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["value", "from_file", "stdin"])
))]
pub struct StoreArgs {
    /// Key to store under
    pub key: String,

    /// Value to store
    #[arg(long)]
    pub value: Option<String>,

    /// Read value from file
    #[arg(long)]
    pub from_file: Option<PathBuf>,

    /// Read value from stdin
    #[arg(long)]
    pub stdin: bool,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Key to load
    pub key: String,

    /// Write the value to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key to operate on
    pub key: String,
}

#[derive(Args, Debug)]
pub struct StatArgs {
    /// Key to inspect
    pub key: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Prefix to list under (treated as a directory)
    #[arg(default_value = "")]
    pub prefix: String,

    /// Include keys in nested directories
    #[arg(short, long)]
    pub recursive: bool,
}

pub async fn store(storage: &Storage, args: StoreArgs) -> Result<()> {
    let value = if args.stdin {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read value from stdin")?;
        buffer
    } else if let Some(path) = &args.from_file {
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?
    } else {
        args.value.unwrap_or_default().into_bytes()
    };

    storage
        .store(&args.key, &value)
        .await
        .with_context(|| format!("Failed to store {}", args.key))?;

    output::success(&format!("Stored {} ({} bytes)", args.key, value.len()));
    Ok(())
}

pub async fn load(storage: &Storage, args: LoadArgs) -> Result<()> {
    let value = storage
        .load(&args.key)
        .await
        .with_context(|| format!("Failed to load {}", args.key))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &value)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            output::success(&format!(
                "Wrote {} ({} bytes) to {}",
                args.key,
                value.len(),
                path.display()
            ));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&value)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

pub async fn delete(storage: &Storage, args: KeyArgs) -> Result<()> {
    storage
        .delete(&args.key)
        .await
        .with_context(|| format!("Failed to delete {}", args.key))?;

    output::success(&format!("Deleted {}", args.key));
    Ok(())
}

/// Returns whether the key exists; the caller maps this to an exit status
pub async fn exists(storage: &Storage, args: KeyArgs) -> bool {
    let found = storage.exists(&args.key).await;
    if found {
        output::success(&format!("{} exists", args.key));
    } else {
        output::info(&format!("{} does not exist", args.key));
    }
    found
}

pub async fn stat(storage: &Storage, args: StatArgs) -> Result<()> {
    let info = storage
        .stat(&args.key)
        .await
        .with_context(|| format!("Failed to stat {}", args.key))?;

    if args.json {
        let json = serde_json::json!({
            "key": info.key,
            "modified": info.modified.to_rfc3339(),
            "size": info.size,
            "is_terminal": info.is_terminal,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        output::header(&info.key);
        output::kv("Modified", &info.modified.to_rfc3339());
        output::kv("Size", &format!("{} bytes", info.size));
        output::kv("Terminal", &info.is_terminal.to_string());
    }

    Ok(())
}

pub async fn list(storage: &Storage, args: ListArgs) -> Result<()> {
    let keys = storage
        .list(&args.prefix, args.recursive)
        .await
        .with_context(|| format!("Failed to list '{}'", args.prefix))?;

    let mut stdout = std::io::stdout().lock();
    for key in &keys {
        writeln!(stdout, "{}", key)?;
    }
    drop(stdout);

    tracing::debug!("{} keys under '{}'", keys.len(), args.prefix);
    Ok(())
}
