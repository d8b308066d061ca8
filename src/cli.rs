use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "plugin-intake")]
#[command(about = "Extract plugin metadata from a jar and scan its bytecode for risky API usage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Default log filter; `RUST_LOG` takes precedence.
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Metadata and scan findings together.
    Inspect {
        /// Archive path, or `-` for stdin.
        archive: PathBuf,

        #[arg(long, value_name = "ID")]
        id: Option<String>,

        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Metadata only.
    Meta {
        archive: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Scan findings only.
    Scan {
        archive: PathBuf,

        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the active checks.
    Checks {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
