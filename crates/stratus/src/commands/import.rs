use crate::context::Context;
use crate::output;
use colored::Colorize;
use std::collections::BTreeSet;
use stratus_engine::{Backend, ResourceKind};

pub async fn handle(
    ctx: &Context,
    kind: &str,
    name: &str,
    backend: &str,
    id: &str,
) -> anyhow::Result<()> {
    let kind: ResourceKind = kind.parse()?;
    let parsed = Backend::parse(backend)?;

    let lock = ctx.state.acquire_lock().await?;
    let mut state = ctx.state.load().await?;
    if state.get(kind, name).is_some() {
        lock.release().await?;
        anyhow::bail!("{}:{} is already in state", kind, name);
    }

    println!("{} {} {} from {}", "Importing".blue(), kind, name.cyan(), parsed);
    let dispatcher = ctx.live_dispatcher(&BTreeSet::from([parsed])).await?;

    let reconciled = match dispatcher.import(kind, backend, id).await {
        Ok(reconciled) => reconciled,
        Err(e) => {
            output::print_engine_error(&e);
            lock.release().await?;
            anyhow::bail!("import of {} failed", id);
        }
    };
    output::print_diagnostics(&reconciled.diagnostics);

    let mut record = reconciled.value;
    // Adopt the declared attributes so the next apply sees no change
    if let Some(decl) = ctx.definition.resource(kind, name)
        && Backend::parse(&decl.backend)? == parsed
    {
        let (normalized, _) = dispatcher.plan(kind, &decl.to_spec())?;
        for (key, value) in normalized.attributes {
            record.attributes.entry(key).or_insert(value);
        }
    }
    record
        .attributes
        .entry("name".to_string())
        .or_insert_with(|| name.into());

    output::print_record(&record);
    state.set_record(kind, name, record);
    ctx.state.save(&state).await?;
    lock.release().await?;

    println!("{}", "✓ Import complete".green().bold());
    Ok(())
}
