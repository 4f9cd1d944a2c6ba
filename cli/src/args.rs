//! Command-line surface of `omr`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "omr", version)]
#[command(about = "omr: inspect, validate and update model registry data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Provider whose overrides apply (default: OMR_PROVIDER, then openai)
    #[arg(long, global = true, value_name = "NAME")]
    pub provider: Option<String>,

    /// Output format. Default: table on a terminal, json otherwise
    #[arg(long, global = true, value_enum, value_name = "FORMAT")]
    pub format: Option<Format>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging (same as -vv)
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Cli {
    /// Log level used when `RUST_LOG` is unset. `--debug` beats `-q`, which beats `-v`.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            return "debug";
        }
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
    Yaml,
    Csv,
}

impl Format {
    /// `table` when stdout is a terminal, `json` when it is piped.
    pub fn detect() -> Self {
        use std::io::IsTerminal;
        if std::io::stdout().is_terminal() {
            Format::Table
        } else {
            Format::Json
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Table => "table",
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Csv => "csv",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect data sources and configuration
    #[command(subcommand)]
    Data(DataCommand),
    /// List and inspect models
    #[command(subcommand)]
    Models(ModelsCommand),
    /// List providers and show the active one
    #[command(subcommand)]
    Providers(ProvidersCommand),
    /// Check for, validate and install data releases
    #[command(subcommand)]
    Update(UpdateCommand),
    /// Inspect or clear data installed in the user data directory
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Show candidate sources, the active one and related files
    Paths,
    /// Show OMR_* environment variables
    Env,
    /// Dump the loaded data
    Dump(DumpArgs),
}

/// Raw documents or the provider's effective view; effective is the default.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ViewArgs {
    /// As loaded, before provider overrides
    #[arg(long, conflicts_with = "effective")]
    pub raw: bool,
    /// With the provider's overrides applied (default)
    #[arg(long)]
    pub effective: bool,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List models with their aliases and lifecycle status
    List {
        /// Case-insensitive substring of the model id or one of its aliases
        #[arg(long, value_name = "TEXT")]
        filter: Option<String>,
    },
    /// Show one model (alias or dated id)
    Get(GetArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub model: String,
    #[command(flatten)]
    pub view: ViewArgs,
    /// Only the parameter constraints
    #[arg(long)]
    pub parameters_only: bool,
    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ProvidersCommand {
    /// Providers known to the loaded data
    List,
    /// The provider commands resolve against
    Current,
}

#[derive(Subcommand, Debug)]
pub enum UpdateCommand {
    /// Compare local data with the newest release (exit code 10 when one is available)
    Check,
    /// Download, verify and install the newest release
    Apply {
        /// Install even when the local data is already current
        #[arg(long)]
        force: bool,
    },
    /// Check, verify and install in one step
    Refresh {
        /// Download and verify only; nothing is written
        #[arg(long)]
        validate_only: bool,
        /// Proceed even when the local data is already current
        #[arg(long)]
        force: bool,
    },
    /// Show the effective update settings
    ShowConfig,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show installed data files
    Info,
    /// Delete installed data files; the registry falls back to bundled data
    Clear {
        /// Do not prompt (required when stdin is not a terminal)
        #[arg(long)]
        yes: bool,
    },
}
