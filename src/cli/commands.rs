use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `xing` - offline tools for inspecting agent execution plans.
#[derive(Parser, Debug)]
#[command(name = "xing")]
#[command(version)]
#[command(about = "Plan validation and decomposition tooling.", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of ~/.xing/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a saved execution plan and print its execution order
    Validate {
        /// Path to the plan JSON
        plan: PathBuf,

        /// Fail on dependencies that name unknown steps instead of dropping them
        #[arg(long)]
        reject_dangling: bool,
    },

    /// Parse a saved reasoner response into an execution plan
    Decompose {
        /// File holding the raw model output
        input: PathBuf,

        /// Task description the plan is for
        #[arg(long)]
        task: Option<String>,
    },

    /// Print the effective configuration
    Config,
}
