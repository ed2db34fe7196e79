//! durastep CLI entry point.
//!
//! Binary name: `durastep`
//!
//! Parses CLI arguments, initializes logging, configuration and the
//! checkpoint store, then dispatches to the command handler.

mod cli;
mod onboarding;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use durastep_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "durastep", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.data_dir.clone()).await?;
    let output = cli.output_mode();

    let result = match cli.command {
        Commands::Onboard {
            run_id,
            employee,
            crash_in,
        } => cli::onboard::onboard(&state, run_id, employee, crash_in, output).await,

        Commands::Steps { run_id } => cli::steps::list_steps(&state, &run_id, output).await,

        Commands::Runs => cli::steps::list_runs(&state, output).await,

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    state.close().await;
    shutdown_tracing();
    result
}
