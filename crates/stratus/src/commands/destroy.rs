use crate::context::{Context, key_name, matches_filter, stored_backend};
use crate::output;
use colored::Colorize;
use std::collections::BTreeSet;

pub async fn handle(ctx: &Context, filter: Option<&str>, yes: bool) -> anyhow::Result<()> {
    let lock = ctx.state.acquire_lock().await?;
    let mut state = ctx.state.load().await?;

    let targets: Vec<_> = state
        .resources
        .iter()
        .rev()
        .filter(|(key, _)| filter.is_none_or(|f| matches_filter(key, key_name(key), f)))
        .map(|(key, stored)| (key.clone(), stored.clone()))
        .collect();

    if targets.is_empty() {
        lock.release().await?;
        if let Some(filter) = filter {
            anyhow::bail!("resource '{}' is not in state", filter);
        }
        println!("{}", "No resources in state".dimmed());
        return Ok(());
    }

    println!("{}", "The following resources will be destroyed:".red().bold());
    for (key, stored) in &targets {
        println!(
            "  - {} ({})",
            key.cyan(),
            stored.record.backend_tag().unwrap_or("?")
        );
    }
    if !yes && !output::confirm("Continue?")? {
        lock.release().await?;
        println!("{}", "Cancelled".dimmed());
        return Ok(());
    }

    let backends = targets
        .iter()
        .map(|(_, stored)| stored_backend(stored))
        .collect::<anyhow::Result<BTreeSet<_>>>()?;
    let dispatcher = ctx.live_dispatcher(&backends).await?;

    let mut failures = 0;
    for (key, stored) in targets {
        println!("{} {}", key.cyan(), "destroying...".red());
        match dispatcher.delete(stored.kind, &stored.record).await {
            Ok(reconciled) => {
                output::print_diagnostics(&reconciled.diagnostics);
                state.remove(stored.kind, key_name(&key));
                ctx.state.save(&state).await?;
                println!("  {} destroyed", "✓".green().bold());
            }
            Err(e) => {
                output::print_engine_error(&e);
                failures += 1;
            }
        }
    }

    lock.release().await?;
    if failures > 0 {
        anyhow::bail!("{} resource(s) could not be destroyed", failures);
    }
    println!("{}", "✓ Destroy complete".green().bold());
    Ok(())
}
