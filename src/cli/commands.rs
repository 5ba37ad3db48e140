use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(name = "xsltprobe", version, about = "Adaptive XSS discovery for XSLT stylesheets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe stylesheets for XSS
    Scan(ScanArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
    /// List the analyzer rules this build ships
    Rules,
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Stylesheet files or glob patterns
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Processing mode: full, schema-only, xss-only
    #[arg(long, default_value = "full")]
    pub mode: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory for reports
    #[arg(short, long)]
    pub output: Option<String>,

    /// Comma-separated analyzer rule ids
    #[arg(long)]
    pub rules: Option<String>,

    /// Directory holding `<stylesheet>.schema.json` files
    #[arg(long)]
    pub schema_dir: Option<String>,

    /// Concurrent tasks
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seed for reproducible documents
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
