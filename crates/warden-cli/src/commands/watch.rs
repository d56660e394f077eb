use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;
use warden_policy::{PolicyChange, PolicyWatcher, ReloadConfig};

use super::Context;
use crate::cli::WatchArgs;
use crate::observability::apply_logging_level;
use crate::output::{print_error, print_json, print_success, print_warning};

fn print_change(ctx: &Context, change: &PolicyChange) -> Result<()> {
    if ctx.is_json() {
        let event = match change {
            PolicyChange::Reloaded {
                generation,
                fingerprint,
            } => serde_json::json!({
                "event": "reloaded",
                "generation": generation,
                "fingerprint": fingerprint,
            }),
            PolicyChange::ReloadFailed { generation, error } => serde_json::json!({
                "event": "reloadFailed",
                "generation": generation,
                "error": error,
            }),
        };
        return print_json(&event);
    }
    match change {
        PolicyChange::Reloaded {
            generation,
            fingerprint,
        } => print_success(&format!(
            "Generation {generation} published ({})",
            &fingerprint[..fingerprint.len().min(12)]
        )),
        PolicyChange::ReloadFailed { generation, error } => {
            print_error(&format!("Reload failed, generation {generation} kept: {error}"))
        }
    }
    Ok(())
}

pub async fn run(ctx: &Context, args: &WatchArgs) -> Result<()> {
    if !ctx.config.reload.enabled {
        bail!("Reloading is disabled (reload.enabled = false)");
    }
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.poll_interval());
    if interval.is_zero() {
        bail!("--interval must be > 0");
    }

    // reload outcomes are logged at info
    if std::env::var("RUST_LOG").is_err()
        && matches!(ctx.config.logging.level.as_str(), "warn" | "error" | "off")
    {
        apply_logging_level("info");
    }

    let service = Arc::new(ctx.open_service().await?);
    let mut events = service.notifier().subscribe();
    let handle = PolicyWatcher::new(service.clone(), ReloadConfig::with_interval(interval)).spawn();

    println!(
        "{} {} every {}s (generation {}), Ctrl-C to stop",
        "Watching".cyan(),
        ctx.root,
        interval.as_secs(),
        service.snapshot().generation
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(change) => print_change(ctx, &change)?,
                Err(RecvError::Lagged(missed)) => {
                    print_warning(&format!("Missed {missed} policy event(s)"));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.stop().await;
    Ok(())
}
