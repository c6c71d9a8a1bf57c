use super::{Action, action};
use crate::context::{Context, key_name, stored_backend};
use crate::output;
use colored::Colorize;
use std::collections::BTreeSet;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    println!("{}", "Refreshing state".blue());

    let lock = ctx.state.acquire_lock().await?;
    let mut state = ctx.state.load().await?;
    if state.resources.is_empty() {
        println!("{}", "No resources in state".dimmed());
        lock.release().await?;
        return Ok(());
    }

    let backends = state
        .resources
        .values()
        .map(stored_backend)
        .collect::<anyhow::Result<BTreeSet<_>>>()?;
    let dispatcher = ctx.live_dispatcher(&backends).await?;
    // Chains are pure, so declarations are planned without credentials
    let planner = ctx.simulated_dispatcher(&ctx.declared_backends()?)?;

    let stored: Vec<_> = state
        .resources
        .iter()
        .map(|(key, s)| (key.clone(), s.clone()))
        .collect();

    let mut failures = 0;
    for (key, stored) in stored {
        let name = key_name(&key);
        println!("{}", key.cyan());

        let reconciled = match dispatcher.read(stored.kind, &stored.record).await {
            Ok(reconciled) => reconciled,
            Err(e) => {
                output::print_engine_error(&e);
                failures += 1;
                continue;
            }
        };
        output::print_diagnostics(&reconciled.diagnostics);

        let Some(record) = reconciled.value else {
            state.remove(stored.kind, name);
            println!("  {}", "removed from state".yellow());
            continue;
        };
        state.set_record(stored.kind, name, record);

        let Some(decl) = ctx.definition.resource(stored.kind, name) else {
            tracing::warn!("{} is in state but no longer declared", key);
            println!("  {}", "exists (not declared; `stratus destroy` removes it)".yellow());
            continue;
        };
        match planner.plan(decl.kind, &decl.to_spec()) {
            Ok((normalized, _)) => match action(state.get(decl.kind, name), &normalized) {
                Action::Replace(keys) => {
                    tracing::warn!("{} drifted from its declaration: {}", key, keys.join(", "));
                    println!("  {} {}", "drift:".yellow(), keys.join(", "));
                }
                _ => println!("  {}", "in sync".green()),
            },
            Err(e) => output::print_engine_error(&e),
        }
    }

    ctx.state.save(&state).await?;
    lock.release().await?;

    if failures > 0 {
        anyhow::bail!("{} resource(s) could not be read", failures);
    }
    println!("{}", "✓ Refresh complete".green().bold());
    Ok(())
}
