use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Optional path to worker config file (YAML)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the RECmd task once
    Run(RunArgs),
    /// Print task registration metadata as JSON
    Metadata,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input archive (repeatable); openrelik-config.zip is picked up by name
    #[arg(short, long = "input-file")]
    pub input_files: Vec<PathBuf>,

    /// Base64-encoded result of an upstream task
    #[arg(long)]
    pub pipe_result: Option<String>,

    /// Directory receiving extraction logs and the RECmd report
    #[arg(short, long)]
    pub output_path: PathBuf,

    /// Workflow identifier used for log and result correlation
    #[arg(long)]
    pub workflow_id: Option<String>,

    /// Password for the input archives
    #[arg(long)]
    pub archive_password: Option<String>,

    /// Print the result as plain JSON instead of the base64 pipe encoding
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
