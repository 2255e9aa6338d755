use anyhow::Result;
use clap::{Parser, ValueEnum};
use ns_logger::{Level, LogQuery, LoggerConfig};
use std::path::PathBuf;

mod demo;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "ns-logger-demo")]
#[command(about = "Captures a burst of demo logs and prints what the record store holds")]
struct Cli {
    /// Logger configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only print records of these namespaces
    #[arg(short, long)]
    namespace: Vec<String>,

    /// Only print records of these levels (error, warn, info, log)
    #[arg(short, long)]
    level: Vec<Level>,

    /// Only print records whose message contains this text
    #[arg(short, long)]
    search: Option<String>,

    /// How to print the records
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LoggerConfig::from_file(path)?,
        None => LoggerConfig::default(),
    };

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let app = demo::DemoApp::new(config, filter)?;
    app.generate_demo_logs();

    let query = LogQuery::all()
        .namespaces(cli.namespace)
        .levels(cli.level)
        .search(cli.search.unwrap_or_default());
    let records = app.logger.get_logs(query)?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            for record in &records {
                println!("{}", record.format_display());
            }
            app.print_statistics();
        }
    }

    Ok(())
}
