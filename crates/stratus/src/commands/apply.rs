use super::{Action, action};
use crate::context::{Context, stored_backend};
use crate::output;
use colored::Colorize;
use stratus_engine::GlobalState;

pub async fn handle(ctx: &Context, filter: Option<&str>, simulate: bool) -> anyhow::Result<()> {
    let decls = ctx.select(filter)?;
    let mut backends = ctx.declared_backends()?;

    // Simulation starts from an empty state and never writes it
    let (dispatcher, mut state, lock) = if simulate {
        println!("{}", "Simulating against in-memory backends".blue());
        let dispatcher = ctx.simulated_dispatcher(&backends)?;
        (dispatcher, GlobalState::new(), None)
    } else {
        println!("{}", "Applying definition".blue());
        let lock = ctx.state.acquire_lock().await?;
        let state = ctx.state.load().await?;
        for decl in &decls {
            if let Some(stored) = state.get(decl.kind, &decl.name) {
                backends.insert(stored_backend(stored)?);
            }
        }
        let dispatcher = ctx.live_dispatcher(&backends).await?;
        (dispatcher, state, Some(lock))
    };

    let mut changed = 0;
    let mut failed = None;
    for decl in decls {
        let spec = decl.to_spec();
        let label = format!("{} {}", decl.kind, decl.name.cyan());

        let (normalized, _) = match dispatcher.plan(decl.kind, &spec) {
            Ok(planned) => planned,
            Err(e) => {
                println!("{}", label);
                output::print_engine_error(&e);
                failed = Some(decl.key());
                break;
            }
        };

        let stored = state.get(decl.kind, &decl.name);
        let result = match action(stored, &normalized) {
            Action::Unchanged => {
                println!("{} {}", label, "up to date".dimmed());
                continue;
            }
            Action::Create => {
                println!("{} {}", label, "creating...".green());
                dispatcher.create(decl.kind, &spec).await
            }
            Action::Replace(keys) => {
                println!(
                    "{} {} (changed: {})",
                    label,
                    "replacing...".yellow(),
                    keys.join(", ")
                );
                let record = stored.map(|s| s.record.clone()).unwrap_or_default();
                dispatcher.update(decl.kind, &record, &spec).await
            }
        };

        match result {
            Ok(reconciled) => {
                output::print_diagnostics(&reconciled.diagnostics);
                println!(
                    "  {} {}",
                    "✓".green().bold(),
                    reconciled.value.id().unwrap_or("(no id)")
                );
                state.set_record(decl.kind, &decl.name, reconciled.value);
                changed += 1;
                if !simulate {
                    ctx.state.save(&state).await?;
                }
            }
            Err(e) => {
                output::print_engine_error(&e);
                failed = Some(decl.key());
                break;
            }
        }
    }

    if let Some(lock) = lock {
        lock.release().await?;
    }

    println!();
    if let Some(key) = failed {
        anyhow::bail!("apply stopped at {} ({} resource(s) changed before it)", key, changed);
    }
    println!(
        "{} {} resource(s) changed",
        "✓ Apply complete:".green().bold(),
        changed
    );
    if simulate {
        for (key, stored) in &state.resources {
            println!("  {}", key.cyan());
            output::print_record(&stored.record);
        }
    }
    Ok(())
}
