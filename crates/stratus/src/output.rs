//! Terminal output helpers

use colored::Colorize;
use std::io::Write;
use stratus_engine::{
    Chain, ChainStep, Completion, Diagnostic, EngineError, ResourceRecord, ReusePolicy, Severity,
    Teardown,
};

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let label = match diagnostic.severity {
            Severity::Warning => "warning".yellow().bold(),
            Severity::Error => "error".red().bold(),
        };
        println!("    {}: {}", label, diagnostic.summary);
        if let Some(detail) = &diagnostic.detail {
            println!("      {}", detail.dimmed());
        }
    }
}

/// Print an engine failure with its diagnostics
pub fn print_engine_error(err: &EngineError) {
    println!("  {} {}", "✗".red().bold(), err);
    let diagnostics = err.diagnostics();
    print_diagnostics(&diagnostics);
    if err.is_retryable() {
        println!("    {}", "(transient; running the command again may succeed)".dimmed());
    }
}

fn step_flags(step: &ChainStep) -> String {
    let mut flags = Vec::new();
    if step.completion == Completion::Poll {
        flags.push("async");
    }
    if step.reuse == ReusePolicy::ReuseIfPresent {
        flags.push("reuse");
    }
    if step.teardown == Teardown::Retain {
        flags.push("retained");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    }
}

pub fn print_chain(chain: &Chain) {
    for step in chain.steps() {
        let target = step.target.as_deref().unwrap_or("(assigned by backend)");
        println!(
            "    {}. {} → {} {}{}",
            step.index + 1,
            step.kind.to_string().cyan(),
            step.output_key,
            target.dimmed(),
            step_flags(step).dimmed()
        );
    }
}

pub fn print_record(record: &ResourceRecord) {
    for (key, value) in &record.attributes {
        println!("    {} = {}", key, value.to_string().cyan());
    }
}

/// Ask on stdin; anything but `y` declines
pub fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", question);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
