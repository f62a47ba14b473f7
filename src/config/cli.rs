use crate::config::toml_config::{DigConfig, DEFAULT_CONFIG_PATH};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "digtool")]
#[command(about = "DigTool - OSINT email presence checker")]
pub struct CliArgs {
    /// Email address to check
    #[arg(required_unless_present = "list")]
    pub email: Option<String>,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Specific probes to run (default: all registered)
    #[arg(short, long, num_args = 1..)]
    pub modules: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Report format written to stdout
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Minimum seconds between two requests
    #[arg(long)]
    pub rate_limit: Option<f64>,

    /// Number of probes running at once
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Stop the scan after this many seconds and report what finished
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// List registered probes and exit
    #[arg(long)]
    pub list: bool,
}

impl CliArgs {
    /// Command line values win over the file.
    pub fn apply_to(&self, config: &mut DigConfig) {
        if !self.modules.is_empty() {
            config.modules = self.modules.clone();
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(rate_limit) = self.rate_limit {
            config.rate_limit_seconds = rate_limit;
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
    }
}
