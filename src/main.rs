use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;
use xsltprobe::analysis::RuleRegistry;
use xsltprobe::cli::{self, Cli, Commands};
use xsltprobe::config;
use xsltprobe::errors::XsltProbeError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, 0) => "warn",
        (_, 0) => "info",
        (_, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_writer(std::io::stderr)
            .init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let result = match cli.command {
        Commands::Scan(args) => cli::scan::handle_scan(args, cli.quiet).await,
        Commands::Validate(args) => handle_validate(args).await,
        Commands::Rules => {
            handle_rules();
            Ok(())
        }
    };

    if let Err(e) = result {
        let class = e.classify();
        eprintln!("{} {}", style("Error:").red().bold(), e);
        let exit_code = match &e {
            XsltProbeError::Aborted(_) => 3,
            _ if class.configuration => 2,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn handle_validate(args: cli::commands::ValidateArgs) -> Result<(), XsltProbeError> {
    let path = std::path::PathBuf::from(&args.config);
    let config = config::parse_config(&path).await?;
    if let Some(rules) = config.analysis.as_ref().and_then(|a| a.rules.as_ref()) {
        RuleRegistry::from_ids(rules)?;
    }
    println!("Configuration is valid: {}", args.config);
    Ok(())
}

fn handle_rules() {
    for id in RuleRegistry::available() {
        println!("{}", id);
    }
}
