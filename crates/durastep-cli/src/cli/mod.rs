//! CLI command definitions for the `durastep` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod onboard;
pub mod steps;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::onboarding::STEP_IDS;

/// Run crash-safe, checkpointed workflows.
#[derive(Parser)]
#[command(name = "durastep", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding durastep.toml and the checkpoint database.
    #[arg(long, global = true, env = "DURASTEP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors (`--json` output is still printed).
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_flags(self.json, self.quiet)
    }
}

/// How command handlers report results on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Tables and coloured text.
    Styled,
    /// Pretty-printed JSON; wins over `--quiet`.
    Json,
    /// Nothing on stdout.
    Silent,
}

impl OutputMode {
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        match (json, quiet) {
            (true, _) => OutputMode::Json,
            (false, true) => OutputMode::Silent,
            (false, false) => OutputMode::Styled,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run (or resume) the employee onboarding workflow.
    Onboard {
        /// Run identity. Reuse it to resume a crashed run; a new one is
        /// generated when omitted.
        run_id: Option<String>,

        /// Name of the employee being onboarded.
        #[arg(long)]
        employee: String,

        /// Kill the process inside this step, after its side effect but
        /// before its checkpoint is committed.
        #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(STEP_IDS))]
        crash_in: Option<String>,
    },

    /// Show every checkpointed step of a run.
    Steps {
        /// Run identity.
        run_id: String,
    },

    /// List runs with their pending and completed step counts.
    #[command(alias = "ls")]
    Runs,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
