mod commands;
mod script;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tessera_engine::{Framework, FrameworkConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = FrameworkConfig::load_or_default(cli.config.as_deref());
    let framework = Framework::new(config).context("failed to start the framework")?;
    tessera_plugins::register_builtin_algorithms(framework.factory())
        .context("failed to register built-in algorithms")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = match cli.command {
        Commands::List => commands::list(&framework, &mut out),
        Commands::Describe(args) => commands::describe(&framework, &args.name, args.version, &mut out),
        Commands::Run(args) => commands::run(
            &framework,
            &args.name,
            args.version,
            &args.properties,
            &mut out,
        ),
        Commands::Script(args) => execute_script(&framework, args, &mut out),
    };
    out.flush().ok();

    let shutdown = framework.shutdown();
    outcome?;
    shutdown.context("failed to release algorithms")?;
    Ok(())
}

#[derive(Parser)]
#[command(author, version, about = "Runs Tessera algorithms from the command line")]
struct Cli {
    /// Framework configuration file (JSON). Defaults to the per-user file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered algorithms.
    List,
    /// Show the properties an algorithm declares.
    Describe(DescribeArgs),
    /// Run a single algorithm.
    Run(RunArgs),
    /// Run a JSON list of algorithm steps against one data service.
    Script(ScriptArgs),
}

#[derive(Args)]
struct DescribeArgs {
    name: String,
    /// Specific version; the highest registered one by default.
    #[arg(long)]
    version: Option<u32>,
}

#[derive(Args)]
struct RunArgs {
    name: String,
    #[arg(long)]
    version: Option<u32>,
    /// Property assignments such as `Factor=2`.
    #[arg(value_parser = commands::parse_assignment)]
    properties: Vec<(String, String)>,
}

#[derive(Args)]
struct ScriptArgs {
    /// Path to the script (JSON array of steps).
    script: PathBuf,
    /// Write the execution history to this file as JSON.
    #[arg(long)]
    history: Option<PathBuf>,
}

fn execute_script(framework: &Framework, args: ScriptArgs, out: &mut dyn Write) -> Result<()> {
    let steps = script::load(&args.script)?;
    script::run(framework, &steps, out)?;
    if let Some(path) = args.history {
        let json = framework
            .history()
            .to_json()
            .context("failed to serialise the history")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write history to {}", path.display()))?;
        writeln!(out, "History written to {}", path.display())?;
    }
    Ok(())
}
