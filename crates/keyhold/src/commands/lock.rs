//! Lock commands
//!
//! `lock` holds the lease from the command line, which is mostly useful for
//! scripting around other tools and for inspecting contention by hand.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use keyhold_storage::{lock_key, CancellationToken, Storage};
use std::time::Duration;

use super::object::KeyArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct LockArgs {
    /// Key to lock
    pub key: String,

    /// Release after this many seconds (default: hold until Ctrl-C)
    #[arg(long)]
    pub hold_secs: Option<u64>,
}

pub async fn lock(storage: &Storage, args: LockArgs) -> Result<()> {
    let token = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(token.clone());

    let result = acquire_and_hold(storage, &args, &token).await;
    interrupt.abort();
    result
}

pub async fn unlock(storage: &Storage, args: KeyArgs) -> Result<()> {
    storage
        .unlock(&args.key)
        .await
        .with_context(|| format!("Failed to release lock on {}", args.key))?;

    output::success(&format!("Released {}", lock_key(&args.key)));
    Ok(())
}

async fn acquire_and_hold(
    storage: &Storage,
    args: &LockArgs,
    token: &CancellationToken,
) -> Result<()> {
    let lease = storage.locker().config().lease_expiration();
    if let Some(secs) = args.hold_secs {
        if Duration::from_secs(secs) > lease {
            output::warning(&format!(
                "Holding for {}s exceeds the {}s lease; other processes may reclaim the lock",
                secs,
                lease.as_secs()
            ));
        }
    }

    output::info(&format!("Waiting for {}", lock_key(&args.key)));
    match storage.lock(&args.key, token).await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {
            return Err(anyhow!("Interrupted while waiting for lock on {}", args.key));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to acquire lock on {}", args.key));
        }
    }
    output::success(&format!("Acquired {}", lock_key(&args.key)));

    hold(args.hold_secs, token).await;

    storage
        .unlock(&args.key)
        .await
        .with_context(|| format!("Failed to release lock on {}", args.key))?;
    output::success(&format!("Released {}", lock_key(&args.key)));
    Ok(())
}

/// Wait out the hold period or until interrupted
async fn hold(hold_secs: Option<u64>, token: &CancellationToken) {
    match hold_secs {
        Some(secs) => {
            tokio::select! {
                _ = token.cancelled() => output::info("Interrupted, releasing early"),
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => {
            output::info("Holding until Ctrl-C");
            token.cancelled().await;
        }
    }
}

fn spawn_interrupt_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}
