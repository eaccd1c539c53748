//! trainlog CLI
//!
//! Command-line interface over the training logbook:
//! - Add and look up daily entries
//! - Search with filters
//! - Import spreadsheets, markdown notes and daily reports
//! - Track personal bests and lung capacity
//! - Show statistics

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use trainlog::config::generate_default_config;
use trainlog::records::parse_measurements;
use trainlog::storage::parse_date;
use trainlog::{
    BatchReport, Config, DateRange, Entry, Logbook, PersonalBest, SearchFilter, SortOrder, Summary,
};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "trainlog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Training log indexing, search and personal records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a training entry
    Add {
        /// Date (YYYY-MM-DD)
        date: String,
        #[arg(short = 't', long = "type", default_value = "")]
        training_type: String,
        #[arg(short, long, default_value = "")]
        location: String,
        /// Duration in minutes
        #[arg(short, long)]
        duration: Option<f64>,
        #[arg(short = 'C', long, default_value = "")]
        content: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Metrics in key=value format
        #[arg(short, long)]
        metric: Vec<String>,
        /// Replace an existing entry for the date
        #[arg(long)]
        overwrite: bool,
    },

    /// Show the entry for a date
    Get {
        date: String,
    },

    /// Search entries
    Search {
        /// Exact date
        #[arg(long)]
        date: Option<String>,
        /// Range start (inclusive)
        #[arg(long)]
        from: Option<String>,
        /// Range end (inclusive)
        #[arg(long)]
        to: Option<String>,
        /// Calendar month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        /// Last N days up to today
        #[arg(long)]
        last: Option<u32>,
        #[arg(short = 't', long = "type")]
        training_type: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        /// Case-insensitive text match
        #[arg(long)]
        contains: Option<String>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,
    },

    /// Import training entries from a CSV file
    ImportCsv {
        path: PathBuf,
        #[arg(long)]
        overwrite: bool,
    },

    /// Import lung-capacity measurements from a CSV file
    ImportLungCsv {
        path: PathBuf,
    },

    /// Import a markdown note or a directory of notes
    ImportMd {
        path: PathBuf,
        #[arg(long)]
        overwrite: bool,
        /// Year for dates written as MM月DD日
        #[arg(long)]
        year: Option<i32>,
    },

    /// Scan the reports directory into the record database
    ScanReports {
        /// Clear the cache first
        #[arg(long)]
        rebuild: bool,
        /// Reports directory, overrides the config file
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Personal bests
    Pb {
        #[command(subcommand)]
        command: PbCommands,
    },

    /// Lung capacity
    Lung {
        #[command(subcommand)]
        command: LungCommands,
    },

    /// Show statistics for a window
    Stats {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Last N days up to today
        #[arg(long, default_value = "30")]
        last: u32,
    },

    /// Rebuild the derived index from the training log
    RebuildIndex,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PbCommands {
    /// Show all personal bests
    Show,
    /// Offer a new result (no-op unless it beats the record)
    Update {
        /// DNF, DYN, DYNB or STA
        event: String,
        /// Metres, or m:ss / seconds for STA
        value: String,
        /// Date (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long, default_value = "")]
        location: String,
    },
}

#[derive(Subcommand)]
pub enum LungCommands {
    /// Record measurements (ml) for a date
    Add {
        date: String,
        /// Comma or space separated, e.g. "6428,6462,6632"
        measurements: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Show the personal best and recent records
    Show {
        #[arg(long, default_value = "30")]
        last: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing config to {:?}", path))?;
                println!("Wrote default config to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().to_string();
    }

    init_logging(&config)?;
    tracing::debug!("trainlog v{}", env!("CARGO_PKG_VERSION"));

    run(cli, config)
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("trainlog={}", config.logging.level).into());

    let writer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }
    Ok(())
}

fn run(cli: Cli, mut config: Config) -> Result<()> {
    let json = cli.format == "json";
    let today = Local::now().date_naive();

    // Flags that change how documents are opened
    match &cli.command {
        Commands::ImportCsv { overwrite, .. } => config.ingest.overwrite |= *overwrite,
        Commands::ImportMd { overwrite, year, .. } => {
            config.ingest.overwrite |= *overwrite;
            if year.is_some() {
                config.ingest.reference_year = *year;
            }
        }
        Commands::ScanReports { dir: Some(dir), .. } => {
            config.ingest.reports_dir = Some(dir.to_string_lossy().to_string());
        }
        _ => {}
    }

    let book = Logbook::open(config)?;

    match cli.command {
        Commands::Add {
            date,
            training_type,
            location,
            duration,
            content,
            notes,
            metric,
            overwrite,
        } => {
            let mut entry = Entry::new(parse_date(&date)?, training_type, location)
                .content(content)
                .notes(notes);
            if let Some(minutes) = duration {
                entry = entry.duration(minutes);
            }
            for pair in &metric {
                let (key, value) = parse_metric(pair)?;
                entry = entry.metric(key, value);
            }

            let stored = book.add(entry, overwrite)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else {
                println!("Stored entry for {}", stored.date);
            }
        }

        Commands::Get { date } => {
            let entry = book.get(parse_date(&date)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_entry_detail(&entry);
            }
        }

        Commands::Search {
            date,
            from,
            to,
            month,
            last,
            training_type,
            location,
            contains,
            limit,
            order,
        } => {
            let mut filter = SearchFilter::new();
            if let Some(date) = date {
                filter = filter.date(parse_date(&date)?);
            }
            if let Some(range) = window(from.as_deref(), to.as_deref(), month.as_deref(), last, today)? {
                filter = filter.date_range(range);
            }
            filter.training_type = training_type;
            filter.location = location;
            filter.content_contains = contains;
            filter.limit = limit;

            let entries = book.search(&filter, order)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_entries(&entries);
            }
        }

        Commands::ImportCsv { path, .. } => {
            let report = book.import_spreadsheet(&path)?;
            print_report(&report, json)?;
        }

        Commands::ImportLungCsv { path } => {
            let report = book.import_lung_spreadsheet(&path)?;
            print_report(&report, json)?;
        }

        Commands::ImportMd { path, .. } => {
            if !path.exists() {
                bail!("Path not found: {:?}", path);
            }
            let report = book.import_markdown(&path)?;
            print_report(&report, json)?;
        }

        Commands::ScanReports { rebuild, .. } => {
            let report = if rebuild {
                book.rebuild_reports()?
            } else {
                book.scan_reports()?
            };
            print_report(&report, json)?;
        }

        Commands::Pb { command } => match command {
            PbCommands::Show => {
                let records = book.all_personal_bests()?;
                if json {
                    let map: BTreeMap<String, &PersonalBest> = records
                        .iter()
                        .map(|(event, record)| (event.to_string(), record))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&map)?);
                } else {
                    println!("{:<6} {:<8} {:<12} {}", "Event", "Best", "Date", "Location");
                    println!("{}", "-".repeat(44));
                    for (event, record) in records {
                        println!(
                            "{:<6} {:<8} {:<12} {}",
                            event,
                            record.display_value(),
                            record.date().map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                            record.location().unwrap_or("-")
                        );
                    }
                }
            }
            PbCommands::Update {
                event,
                value,
                date,
                location,
            } => {
                let date = match date {
                    Some(d) => parse_date(&d)?,
                    None => today,
                };
                let outcome = book.update_personal_best(&event, &value, date, &location)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                } else if outcome.improved {
                    println!("New {} personal best: {}", outcome.event, outcome.record.display_value());
                } else {
                    println!(
                        "{} unchanged, best is still {}",
                        outcome.event,
                        outcome.record.display_value()
                    );
                }
            }
        },

        Commands::Lung { command } => match command {
            LungCommands::Add {
                date,
                measurements,
                notes,
            } => {
                let values = parse_measurements(&measurements)?;
                let record = book.add_lung_capacity(parse_date(&date)?, &values, &notes)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                } else {
                    println!(
                        "{}: {:?} (max {} ml)",
                        record.date, record.measurements, record.max_today
                    );
                }
            }
            LungCommands::Show { last } => {
                let (pb, pb_date) = book.lung_capacity().personal_best()?;
                let records = book
                    .lung_capacity()
                    .records_in(DateRange::last_days(today, last))?;
                if json {
                    let body = serde_json::json!({
                        "pb": pb,
                        "pb_date": pb_date,
                        "records": records,
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                } else {
                    match pb_date {
                        Some(date) => println!("Personal best: {} ml ({})", pb, date),
                        None => println!("Personal best: {} ml", pb),
                    }
                    println!();
                    for record in records {
                        println!("{}  max {:>5} ml  {:?}", record.date, record.max_today, record.measurements);
                    }
                }
            }
        },

        Commands::Stats { from, to, last } => {
            let range = window(from.as_deref(), to.as_deref(), None, Some(last), today)?
                .unwrap_or_else(|| DateRange::last_days(today, last));
            let summary = book.summarize(range)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }

        Commands::RebuildIndex => {
            let stats = book.rebuild_index()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "Rebuilt index: {} days, {} types, {} locations",
                    stats.total_days, stats.training_types, stats.locations
                );
            }
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Resolve the date window flags; explicit from/to wins over month, month over last
fn window(
    from: Option<&str>,
    to: Option<&str>,
    month: Option<&str>,
    last: Option<u32>,
    today: NaiveDate,
) -> Result<Option<DateRange>> {
    if from.is_some() || to.is_some() {
        let start = match from {
            Some(s) => parse_date(s)?,
            None => NaiveDate::MIN,
        };
        let end = match to {
            Some(s) => parse_date(s)?,
            None => today,
        };
        return Ok(Some(DateRange::new(start, end)));
    }

    if let Some(month) = month {
        let (year, mon) = month
            .split_once('-')
            .and_then(|(y, m)| Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?)))
            .with_context(|| format!("invalid month '{}' (expected YYYY-MM)", month))?;
        return Ok(Some(DateRange::month(year, mon)?));
    }

    Ok(last.map(|days| DateRange::last_days(today, days)))
}

fn parse_metric(pair: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("invalid metric '{}' (expected key=value)", pair);
    };
    let value = serde_json::from_str(raw.trim())
        .unwrap_or_else(|_| serde_json::Value::String(raw.trim().to_string()));
    Ok((key.trim().to_string(), value))
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No matching entries.");
        return;
    }

    println!("{:<12} {:<16} {:<16} {:>8}  {}", "Date", "Type", "Location", "Minutes", "Content");
    println!("{}", "-".repeat(80));
    for entry in entries {
        let minutes = entry
            .duration_minutes
            .map(|m| format!("{:.0}", m))
            .unwrap_or_else(|| "-".into());
        let first_line = entry.content.lines().next().unwrap_or("");
        println!(
            "{:<12} {:<16} {:<16} {:>8}  {}",
            entry.date, entry.training_type, entry.location, minutes, first_line
        );
    }
    println!();
    println!("{} entries", entries.len());
}

fn print_entry_detail(entry: &Entry) {
    println!("Date:      {}", entry.date);
    println!("Type:      {}", entry.training_type);
    println!("Location:  {}", entry.location);
    if let Some(minutes) = entry.duration_minutes {
        println!("Duration:  {} min", minutes);
    }
    for (key, value) in &entry.metrics {
        println!("{:<10} {}", format!("{}:", key), value);
    }
    if !entry.content.is_empty() {
        println!();
        println!("{}", entry.content);
    }
    if !entry.notes.is_empty() {
        println!();
        println!("Notes: {}", entry.notes);
    }
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Imported: {}", report.imported);
    println!("Skipped:  {}", report.skipped.len());
    if !report.skipped.is_empty() {
        println!();
        println!("Skipped items (first 10):");
        for item in report.skipped.iter().take(10) {
            println!("  {}", item);
        }
    }
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("Window: {} ({} days)", summary.range, summary.range.num_days());
    println!("Entries: {}", summary.total_entries);
    println!("Training time: {:.0} min", summary.total_duration_minutes);

    if !summary.by_type.is_empty() {
        println!();
        println!("By type:");
        for (label, count) in &summary.by_type {
            println!("  {:<20} {}", label, count);
        }
    }
    if !summary.by_location.is_empty() {
        println!();
        println!("By location:");
        for (label, count) in &summary.by_location {
            println!("  {:<20} {}", label, count);
        }
    }

    let lung = &summary.lung_capacity;
    println!();
    println!("Lung capacity ({} records):", lung.records);
    println!("  Mean:   {:.0} ml", lung.mean);
    println!("  Max:    {} ml", lung.max);
    println!("  Recent: {:?}", lung.recent);
    println!("  Trend:  {}", lung.trend);
}
