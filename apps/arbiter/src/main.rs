mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand};
use commands::Command;
use obs::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arbiter")]
#[command(
    about = "Arbiter: LLM-driven trading decisions against a simulated market",
    version,
    arg_required_else_help = true
)]
#[command(
    after_help = "Examples:\n  arbiter run --config configs/sample.toml --out runs/\n  arbiter run --steps 20 --json\n  arbiter validate --config configs/sample.toml\n  arbiter prompt --config configs/scripted.toml\n\nConfig path falls back to env ARBITER_CONFIG, then to built-in defaults.\nLog filter can be overridden with env ARBITER_LOG.\n"
)]
struct Cli {
    /// Default log level when ARBITER_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the observe, decide, score and learn loop.
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides run.strategy (simulated).
        #[arg(long)]
        strategy: Option<String>,
        /// Overrides run.steps.
        #[arg(long)]
        steps: Option<u64>,
        /// Writes run artifacts under <out>/<run_id>/.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the final summary as a single JSON line instead of human output.
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Expose Prometheus metrics on host:port while the run is active.
        #[arg(long)]
        metrics_addr: Option<String>,
    },
    /// Load and validate a config without running.
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the first decision prompt for the simulated market.
    Prompt {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = obs::init_tracing(&cli.log_level, cli.log_format) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Run {
            config,
            strategy,
            steps,
            out,
            json,
            metrics_addr,
        } => Command::Run {
            config,
            strategy,
            steps,
            out,
            json,
            metrics_addr,
        },
        CliCommand::Validate { config } => Command::Validate { config },
        CliCommand::Prompt { config } => Command::Prompt { config },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
