use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use cadence::calendar::{Event, TimeWindow, DEFAULT_MAX_INSTANCES};
use cadence::datetime::{self, OutputFormat, UtcDateTime};
use cadence::recurrence::{expand_recurring_events, validate_recurrence_rules};

/// Recurring-event engine: validate rules, expand events, convert datetimes.
#[derive(Debug, Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate RRULE:/EXDATE:/RDATE: entries and print them parsed.
    Validate {
        #[arg(required = true)]
        rules: Vec<String>,
    },
    /// Expand an event (or a JSON array of events) into occurrences.
    Expand {
        /// Read the event JSON from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Inclusive lower bound (ISO 8601).
        #[arg(long)]
        time_min: Option<String>,
        /// Exclusive upper bound (ISO 8601).
        #[arg(long)]
        time_max: Option<String>,
        /// Maximum occurrences per event.
        #[arg(long, default_value_t = DEFAULT_MAX_INSTANCES)]
        max_instances: usize,
    },
    /// Convert a local or offset-qualified datetime to naive UTC plus offset.
    ToUtc {
        date_time: String,
        #[arg(long)]
        time_zone: Option<String>,
    },
    /// Convert a naive UTC datetime back to local time.
    ToLocal {
        date_time: String,
        #[arg(long)]
        offset: String,
        #[arg(long)]
        time_zone: Option<String>,
    },
    /// Print the UTC offset of a timezone at a naive wall-clock time.
    Offset { date_time: String, time_zone: String },
    /// Parse a datetime in any common layout and re-render it.
    Normalize {
        value: String,
        #[arg(short, long, default_value_t = OutputFormat::IsoUtcZ)]
        format: OutputFormat,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventInput {
    Many(Vec<Event>),
    One(Box<Event>),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    };

    // stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Validate { rules } => print_json(&validate_recurrence_rules(&rules)?),
        Command::Expand {
            input,
            time_min,
            time_max,
            max_instances,
        } => {
            let window = TimeWindow::parse(time_min.as_deref(), time_max.as_deref(), max_instances)
                .context("Invalid time window")?;
            let events = match read_events(input.as_ref())? {
                EventInput::Many(events) => events,
                EventInput::One(event) => vec![*event],
            };
            tracing::info!(events = events.len(), "Expanding events");
            print_json(&expand_recurring_events(&events, &window)?)
        }
        Command::ToUtc {
            date_time,
            time_zone,
        } => print_json(&datetime::local_to_utc(&date_time, time_zone.as_deref())?),
        Command::ToLocal {
            date_time,
            offset,
            time_zone,
        } => print_json(&datetime::utc_to_local(&UtcDateTime {
            date_time,
            offset,
            time_zone,
        })?),
        Command::Offset {
            date_time,
            time_zone,
        } => {
            println!("{}", datetime::timezone_to_offset(&date_time, &time_zone)?);
            Ok(())
        }
        Command::Normalize { value, format } => {
            let normalized = datetime::normalize_datetime(&value, format)
                .with_context(|| format!("Cannot parse datetime: '{value}'"))?;
            println!("{normalized}");
            Ok(())
        }
    }
}

fn read_events(input: Option<&PathBuf>) -> Result<EventInput> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Failed to parse event JSON")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
