//! CLI for RelayMQ
//!
//! Subcommands:
//! - `inspect`: recover a durable log and list its records
//! - `replay`: replay the configured publish journal into a fresh broker

use std::path::PathBuf;

use clap::Parser;
use relaymq::config::load_config;
use relaymq::persistence::{DurableLog, Journal, LogOptions};
use relaymq::utils::logging;
use relaymq::Broker;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "relaymq")]
enum Command {
    /// Open a log file (recovering it) and print every record
    Inspect {
        /// Path to the log file
        #[arg(long)]
        path: PathBuf,
        /// Stop at the first record whose checksum does not match
        #[arg(long)]
        verify: bool,
    },
    /// Replay the journal from the configured data directory
    Replay,
}

fn main() {
    dotenvy::dotenv().ok();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    let result = match Command::parse() {
        Command::Inspect { path, verify } => inspect(path, verify),
        Command::Replay => replay(settings),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn inspect(path: PathBuf, verify: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log = DurableLog::open_with(&path, LogOptions { verify_checksums: verify })?;
    info!(path = %path.display(), records = log.len(), end = log.end(), "Log opened");

    for record in log.iter() {
        let (position, payload) = record?;
        match std::str::from_utf8(&payload) {
            Ok(text) => println!("{position:>10}  {text}"),
            Err(_) => println!("{position:>10}  <{} bytes>", payload.len()),
        }
    }
    Ok(())
}

fn replay(settings: relaymq::config::Settings) -> Result<(), Box<dyn std::error::Error>> {
    let journal = Journal::open(settings.log.path(), settings.log.options())?;
    let broker = Broker::new(settings.broker).with_journal(journal);

    let count = broker.replay_journal()?;
    println!("replayed {count} message(s)");
    for name in broker.list_topics() {
        let depth = broker.topic(&name)?.len();
        println!("{name:<32} {depth}");
    }

    broker.close();
    Ok(())
}
