// ledgerfuse CLI - revenue and expense fusion runs

mod exit_codes;
mod fuse;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ledgerfuse_fusion::FusionError;

use exit_codes::{fusion_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "lfuse")]
#[command(about = "Fuse revenue and expense sources into validated per-entity ledgers")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuse revenue sources
    #[command(after_help = "\
Examples:
  lfuse revenue revenue.toml
  lfuse revenue revenue.toml --json
  lfuse revenue revenue.toml --output fused.json --rollup-dir rollups/
  lfuse revenue revenue.toml --partial --output fused.json")]
    Revenue {
        /// Path to the revenue config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write per-year entity and donor rollups plus contributor trends
        #[arg(long)]
        rollup_dir: Option<PathBuf>,

        /// Keep the years that passed validation instead of failing the run
        #[arg(long)]
        partial: bool,
    },

    /// Fuse expense sources
    #[command(after_help = "\
Examples:
  lfuse expenses expenses.toml --json
  lfuse expenses expenses.toml --output expenses.json")]
    Expenses {
        /// Path to the expense config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Keep the years that passed validation instead of failing the run
        #[arg(long)]
        partial: bool,
    },

    /// Validate a config and its reference tables without loading sources
    Check {
        /// Path to a revenue or expense config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and succeed.
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Revenue { config, json, output, rollup_dir, partial } => {
            fuse::cmd_revenue(config, json, output, rollup_dir, partial)
        }
        Commands::Expenses { config, json, output, partial } => {
            fuse::cmd_expenses(config, json, output, partial)
        }
        Commands::Check { config, json } => fuse::cmd_check(config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Error from the engine with its registry exit code.
    pub fn fusion(err: &FusionError) -> Self {
        let hint = match err {
            FusionError::MissingColumn { .. } => {
                Some("column names are matched exactly; check the [sources.*.columns] tables")
            }
            FusionError::Coverage { .. } => Some("narrow [years] or add the missing source rows"),
            FusionError::Reconciliation { .. } | FusionError::Sanity { .. } => {
                Some("use --partial to keep the years that passed")
            }
            _ => None,
        };
        Self {
            code: fusion_exit_code(err),
            message: err.to_string(),
            hint: hint.map(str::to_string),
        }
    }
}

impl From<FusionError> for CliError {
    fn from(err: FusionError) -> Self {
        Self::fusion(&err)
    }
}
