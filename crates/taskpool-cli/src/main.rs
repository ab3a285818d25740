#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use std::process;
use taskpool_core::config::{EffectiveConfig, resolve_config};
use taskpool_core::error::ErrorCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tp: inspect and exercise the taskpool hydration engine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format; overrides `--json`, `FORMAT` and the config file.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Config file to use instead of `./taskpool.toml` or the user config.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Parse or format locations",
        long_about = "Show how a URL maps to a route, whether the address bar would be\n\
                      rewritten, and the canonical URL of a route.",
        after_help = "EXAMPLES:\n    # Where does a legacy link land?\n    tp route parse '/#/admin/invites'\n\n\
                      # Machine-readable output\n    tp route parse '/app/pool?project=3' --json"
    )]
    Route(cmd::route::RouteArgs),

    #[command(
        about = "Show the fetches a page needs",
        long_about = "Run the hydration planner for a URL against a resource snapshot.\n\
                      Without --snapshot the session is fresh and only the user is fetched.",
        after_help = "EXAMPLES:\n    # Fresh session\n    tp plan /app/pool\n\n\
                      # Against a saved snapshot\n    tp plan '/config/members?project=2' --snapshot snap.json\n\n\
                      # Snapshot from stdin\n    cat snap.json | tp plan /org/metrics --snapshot -"
    )]
    Plan(cmd::plan::PlanArgs),

    #[command(
        about = "Replay a scripted session through the dispatcher",
        long_about = "Feed messages and canned replies to the dispatcher and print the\n\
                      effects of every step and the final state.",
        after_help = "EXAMPLES:\n    # Full step log\n    tp replay session.json\n\n\
                      # Final state only, as JSON\n    tp replay session.json --summary --json"
    )]
    Replay(cmd::replay::ReplayArgs),

    #[command(
        about = "Run deterministic simulation campaigns",
        long_about = "Drive the engine with a simulated user, network and backend across\n\
                      many seeds and check every settled run against the oracle.",
        after_help = "EXAMPLES:\n    # 100 seeds with default faults\n    tp sim\n\n\
                      # Heavier faults and session expiry\n    tp sim --seeds 500 --reorder 60 --duplicate 20 --expiry 3\n\n\
                      # Replay a failing seed\n    tp sim --replay 42 --json"
    )]
    Sim(cmd::sim::SimArgs),

    #[command(
        about = "Show configuration",
        after_help = "EXAMPLES:\n    tp config show\n    tp config defaults > taskpool.toml"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    tp completions zsh > ~/.zfunc/_tp"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TASKPOOL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "taskpool=debug,info"
        } else {
            "taskpool=info,warn"
        })
    });

    let format = env::var("TASKPOOL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, effective: EffectiveConfig, output: OutputMode) -> anyhow::Result<()> {
    match cli.command {
        Commands::Route(args) => cmd::route::run_route(&args, output),
        Commands::Plan(args) => cmd::plan::run_plan(&args, output),
        Commands::Replay(args) => cmd::replay::run_replay(&args, effective.app, output),
        Commands::Sim(args) => cmd::sim::run_sim(&args, output),
        Commands::Config(args) => cmd::config::run_config(&args, &effective, output),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

/// Report the error in the active output mode and exit non-zero.
fn fail(output: OutputMode, err: &anyhow::Error) -> ! {
    if render_error(output, &CliError::from_anyhow(err)).is_err() {
        eprintln!("error: {err:#}");
    }
    process::exit(1);
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    // Used only if the config itself cannot be loaded.
    let early_output = cli.format.unwrap_or(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    });

    let working_dir = env::current_dir()?;
    let effective = match resolve_config(cli.config.as_deref(), &working_dir, cli.json)
        .context(ErrorCode::ConfigParseError)
    {
        Ok(effective) => effective,
        Err(err) => fail(early_output, &err),
    };
    let output = resolve_output_mode(cli.format, &effective.resolved_output);

    if let Err(err) = run(cli, effective, output) {
        fail(output, &err);
    }
    Ok(())
}
