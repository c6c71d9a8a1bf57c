mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Provision one resource definition on AWS, Azure or Google Cloud", long_about = None)]
struct Cli {
    /// Definition file (otherwise discovered from the current directory)
    #[arg(short, long, global = true, env = "STRATUS_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sub-resource chain of every declared resource
    Plan {
        /// Only this resource (`kind:name` or `name`)
        resource: Option<String>,
    },
    /// Create declared resources, replacing those whose declaration changed
    Apply {
        /// Only this resource (`kind:name` or `name`)
        resource: Option<String>,
        /// Run against in-memory backends; state is left untouched
        #[arg(long)]
        simulate: bool,
    },
    /// Read every stored resource back and report drift
    Refresh,
    /// Tear down stored resources
    Destroy {
        /// Only this resource (`kind:name` or `name`)
        resource: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Adopt an existing backend resource into state
    Import {
        /// Resource kind (bucket, network, instance, ...)
        kind: String,
        /// Name to store the resource under
        name: String,
        /// Backend tag (aws, azure, gcp)
        backend: String,
        /// Backend identifier of the primary sub-resource
        id: String,
    },
    /// Inspect the state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List stored resources
    List,
    /// Show one stored record as JSON
    Show {
        /// `kind:name` or `name`
        resource: String,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Version needs no definition file
    if matches!(cli.command, Commands::Version) {
        println!("stratus {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = match context::Context::load(cli.config.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Plan { resource } => commands::plan::handle(&ctx, resource.as_deref()).await,
        Commands::Apply { resource, simulate } => {
            commands::apply::handle(&ctx, resource.as_deref(), simulate).await
        }
        Commands::Refresh => commands::refresh::handle(&ctx).await,
        Commands::Destroy { resource, yes } => {
            commands::destroy::handle(&ctx, resource.as_deref(), yes).await
        }
        Commands::Import {
            kind,
            name,
            backend,
            id,
        } => commands::import::handle(&ctx, &kind, &name, &backend, &id).await,
        Commands::State { command } => match command {
            StateCommands::List => commands::state::list(&ctx).await,
            StateCommands::Show { resource } => commands::state::show(&ctx, &resource).await,
        },
        Commands::Version => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
