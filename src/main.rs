//! Command line interface for one-shot app analysis

use clap::Parser;
use colored::Colorize;
use privacylens::{logging, Config, Pipeline};
use std::process;

#[derive(Parser)]
#[command(name = "privacylens")]
#[command(author, version, about = "Analyze a mobile app's privacy posture", long_about = None)]
struct Cli {
    /// App name or package identifier (e.g. "signal" or "org.thoughtcrime.securesms")
    query: String,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> privacylens::Result<()> {
    let config = Config::from_env();
    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.analyze(&cli.query).await?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", rendered);
    Ok(())
}
