use crate::context::{Context, key_name, matches_filter};
use colored::Colorize;

pub async fn list(ctx: &Context) -> anyhow::Result<()> {
    let state = ctx.state.load().await?;
    println!(
        "{} {}",
        "State of".blue(),
        ctx.root.join(".stratus").display().to_string().cyan()
    );

    if state.resources.is_empty() {
        println!("{}", "No resources in state".dimmed());
        return Ok(());
    }

    for (key, stored) in &state.resources {
        println!(
            "  {} {} {} {}",
            key.cyan(),
            stored.record.backend_tag().unwrap_or("?"),
            stored.record.id().unwrap_or("(no id)"),
            stored
                .updated_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
    }
    println!("{} resource(s)", state.resources.len());
    Ok(())
}

pub async fn show(ctx: &Context, resource: &str) -> anyhow::Result<()> {
    let state = ctx.state.load().await?;
    let stored = state
        .resources
        .iter()
        .find(|(key, _)| matches_filter(key, key_name(key), resource))
        .map(|(_, stored)| stored);

    match stored {
        Some(stored) => {
            println!("{}", serde_json::to_string_pretty(stored)?);
            Ok(())
        }
        None => anyhow::bail!("resource '{}' is not in state", resource),
    }
}
