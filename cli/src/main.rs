use std::{io::Write, process::ExitCode, time::Duration};

use clap::Parser;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;

#[derive(Parser, Debug)]
#[command(name = "demoscan")]
#[command(about = "Decode CS2 demos and score every player for signs of cheating")]
struct Args {
    /// Demo files to analyse
    #[arg(required = true)]
    paths: Vec<String>,

    /// Pretty print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Give up on a demo after this many seconds, 0 disables the limit
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Suspicious activities reported per player
    #[arg(long, default_value_t = analysis::Config::default().max_activities)]
    max_activities: usize,

    /// Log level, repeat for more output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let max_level = level(args.verbose);
    let registry = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::filter_fn(move |meta| {
            let target = meta.target();
            *meta.level() <= max_level
                && (target.starts_with("demoscan")
                    || target.starts_with("analysis")
                    || target.starts_with("demofile"))
        }));
    tracing::subscriber::set_global_default(registry)?;

    tracing::info!(files = args.paths.len(), "Starting...");

    let config = analysis::Config {
        max_activities: args.max_activities,
        ..Default::default()
    };
    let timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
    let storage = demoscan::storage::FileStorage::new(".");

    let reports = demoscan::analyse_all(args.paths, &storage, &config, timeout).await;
    let failed = reports.iter().filter(|r| !r.is_ok()).count();

    let mut stdout = std::io::stdout().lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut stdout, &reports)?;
    } else {
        serde_json::to_writer(&mut stdout, &reports)?;
    }
    writeln!(stdout)?;

    tracing::info!(failed, "Done");

    if failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
