use super::{Action, action};
use crate::context::Context;
use crate::output;
use colored::Colorize;

pub async fn handle(ctx: &Context, filter: Option<&str>) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "Planning".blue(),
        ctx.definition_path.display().to_string().cyan()
    );

    let decls = ctx.select(filter)?;
    let dispatcher = ctx.simulated_dispatcher(&ctx.declared_backends()?)?;
    let state = ctx.state.load().await?;

    let mut failures = 0;
    for decl in decls {
        println!();
        println!(
            "{} {} ({})",
            decl.kind.to_string().bold(),
            decl.name.cyan(),
            decl.backend
        );

        let (normalized, chain) = match dispatcher.plan(decl.kind, &decl.to_spec()) {
            Ok(planned) => planned,
            Err(e) => {
                output::print_engine_error(&e);
                failures += 1;
                continue;
            }
        };

        match action(state.get(decl.kind, &decl.name), &normalized) {
            Action::Create => println!("  {}", "+ create".green()),
            Action::Replace(keys) => {
                println!("  {} (changed: {})", "~ replace".yellow(), keys.join(", "))
            }
            Action::Unchanged => println!("  {}", "= up to date".dimmed()),
        }
        output::print_chain(&chain);
    }

    println!();
    if failures > 0 {
        anyhow::bail!("{} resource(s) cannot be planned", failures);
    }
    println!("{}", "✓ Plan complete".green().bold());
    Ok(())
}
