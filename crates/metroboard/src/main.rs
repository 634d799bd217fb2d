//! metroboard - Transit ride analytics dashboard
//!
//! Command-line front end over the metroboard-core engine: monthly station
//! metrics, station comparison, ride trends, and dataset management.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metroboard_core::models::MetricsReport;
use metroboard_core::{Dashboard, Month};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "metroboard",
    version,
    about = "Transit ride analytics dashboard",
    long_about = "Monthly station metrics over uploaded ride-event datasets.\n\
                  \n\
                  Datasets live under <root>/data/<year>/<YYYY-MM>.csv and the\n\
                  station registry under <root>/config/stations.json.\n\
                  \n\
                  Examples:\n\
                    metroboard months                          # List uploaded months\n\
                    metroboard upload 2025-06 rides.csv        # Upload a month's dataset\n\
                    metroboard metrics Heliopolis 2025-06      # Station metrics\n\
                    metroboard metrics Heliopolis 2025-06 --compare\n\
                    metroboard compare 2025-06 --export out.csv\n\
                    metroboard trend Heliopolis                # Rides across all months\n\
                    metroboard activity Heliopolis 2025-06     # Hourly / weekday profile\n\
                    metroboard add-station \"New Stop\" \"keyword\""
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root directory for data and config (default: current directory)
    #[arg(long, env = "METROBOARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show metrics for one station in one month
    Metrics {
        /// Station display name
        station: String,
        /// Month in YYYY-MM form
        month: Month,
        /// Include previous-month comparison
        #[arg(long)]
        compare: bool,
    },
    /// Compare all registered stations for one month
    Compare {
        /// Month in YYYY-MM form
        month: Month,
        /// Write the table to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Show the ride-count trend for a station across all uploaded months
    Trend {
        /// Station display name
        station: String,
    },
    /// Show when rides happen: per-hour and weekday-by-hour start counts
    Activity {
        /// Station display name
        station: String,
        /// Month in YYYY-MM form
        month: Month,
    },
    /// List months with an uploaded dataset
    Months,
    /// List registered stations
    Stations,
    /// Register a new station
    AddStation {
        /// Display name
        name: String,
        /// Case-insensitive substring matched against ride labels
        keyword: String,
    },
    /// Upload (or replace) a month's dataset from a CSV file
    Upload {
        /// Month in YYYY-MM form
        month: Month,
        /// CSV file with the required ride-event columns
        file: PathBuf,
    },
    /// Delete a month's dataset
    Delete {
        /// Month in YYYY-MM form
        month: Month,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Could not determine working directory")?,
    };
    let dashboard = Dashboard::with_root(&root);

    match cli.command {
        Command::Metrics {
            station,
            month,
            compare,
        } => run_metrics(&dashboard, &station, month, compare, cli.json).await,
        Command::Compare { month, export } => {
            run_compare(&dashboard, month, export, cli.json).await
        }
        Command::Trend { station } => run_trend(&dashboard, &station, cli.json).await,
        Command::Activity { station, month } => {
            run_activity(&dashboard, &station, month, cli.json).await
        }
        Command::Months => run_months(&dashboard, cli.json),
        Command::Stations => run_stations(&dashboard, cli.json),
        Command::AddStation { name, keyword } => {
            dashboard.add_station(&name, &keyword).await?;
            println!("Added station '{}' (keyword: '{}')", name.trim(), keyword.trim());
            Ok(())
        }
        Command::Upload { month, file } => run_upload(&dashboard, month, &file).await,
        Command::Delete { month } => {
            dashboard.delete_month(month).await?;
            println!("Deleted dataset for {month}");
            Ok(())
        }
    }
}

async fn run_metrics(
    dashboard: &Dashboard,
    station: &str,
    month: Month,
    compare: bool,
    json: bool,
) -> Result<()> {
    let report = dashboard.get_metrics(station, month, compare).await?;

    let Some(current) = report.current.as_deref() else {
        println!("No rides recorded for '{station}' in {month}.");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(current)?);
        return Ok(());
    }

    println!("{station} - {month}");
    println!("==============================");
    println!("Rides started:    {}{}", current.starts, delta_suffix(&report, |s| s.starts as f64));
    println!("Rides ended:      {}", current.ends);
    println!("Round trips:      {}", current.round_trips);
    println!("Unique riders:    {}{}", current.unique_riders, delta_suffix(&report, |s| s.unique_riders as f64));
    println!(
        "New signups:      {} ({:.1}% of riders)",
        current.new_signups, current.new_signup_pct
    );
    println!();
    println!("Rider loyalty:");
    println!("  One-time:       {}", current.one_time);
    println!("  Light:          {}", current.light);
    println!("  Heavy:          {}", current.heavy);
    println!();
    println!("Avg duration:     {}", fmt_opt(current.avg_duration, 1, " min"));
    println!(
        "Avg rating:       {} ({} ratings)",
        fmt_opt(current.avg_rating, 2, ""),
        current.total_ratings
    );
    println!("Positive ratings: {}", fmt_opt(current.positive_rating_pct, 1, "%"));

    if compare && report.previous.is_none() {
        println!();
        println!("(no data for {} to compare against)", month.prev());
    }

    Ok(())
}

async fn run_compare(
    dashboard: &Dashboard,
    month: Month,
    export: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let table = dashboard.comparison_table(month).await?;

    if table.rows.is_empty() {
        println!("No station had rides in {month}.");
        return Ok(());
    }

    if let Some(path) = export {
        metroboard_core::export_comparison_to_csv(&table, &path)?;
        println!("Exported {} stations to {}", table.rows.len(), path.display());
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("Station comparison - {month}");
    println!(
        "{:<20} {:>8} {:>8} {:>10} {:>8} {:>8}",
        "Station", "Starts", "Riders", "Avg Dur", "Rating", "Heavy"
    );
    for row in &table.rows {
        println!(
            "{:<20} {:>8} {:>8} {:>10} {:>8} {:>8}",
            row.station,
            row.total_starts,
            row.total_riders,
            fmt_opt(row.avg_duration, 1, ""),
            fmt_opt(row.avg_rating, 2, ""),
            row.heavy_users
        );
    }

    Ok(())
}

async fn run_trend(dashboard: &Dashboard, station: &str, json: bool) -> Result<()> {
    let series = dashboard.trend(station).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*series)?);
        return Ok(());
    }

    if series.is_empty() {
        println!("No uploaded months contain rides for '{station}'.");
        return Ok(());
    }

    println!("Ride trend - {station}");
    let max = series.points.iter().map(|p| p.starts).max().unwrap_or(1).max(1);
    for point in &series.points {
        let bar_len = point.starts * 40 / max;
        println!("{}  {:>6}  {}", point.month, point.starts, "#".repeat(bar_len));
    }

    if !series.is_chartable() {
        println!();
        println!("(single month; upload more data for a trend)");
    }

    Ok(())
}

async fn run_activity(
    dashboard: &Dashboard,
    station: &str,
    month: Month,
    json: bool,
) -> Result<()> {
    let Some(profile) = dashboard.activity_profile(station, month).await? else {
        println!("No rides recorded for '{station}' in {month}.");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&*profile)?);
        return Ok(());
    }

    println!("Ride activity - {station} - {month}");
    if profile.hourly.is_empty() {
        println!("No rides carry a start timestamp.");
        return Ok(());
    }

    let max = profile.hourly.iter().map(|p| p.rides).max().unwrap_or(1).max(1);
    println!("By hour:");
    for point in &profile.hourly {
        let bar_len = point.rides * 40 / max;
        println!("{:02}:00  {:>6}  {}", point.hour, point.rides, "#".repeat(bar_len));
    }

    println!();
    println!("By weekday:");
    for point in &profile.day_hour {
        println!("{:<9} {:02}:00  {:>6}", point.day, point.hour, point.rides);
    }

    println!();
    println!("({} of the station's rides carry a timestamp)", profile.timed_rides);
    Ok(())
}

fn run_months(dashboard: &Dashboard, json: bool) -> Result<()> {
    let months = dashboard.uploaded_months();

    if json {
        let list: Vec<String> = months.iter().map(Month::to_string).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if months.is_empty() {
        println!("No datasets uploaded yet.");
        return Ok(());
    }
    for month in months {
        println!("{month}");
    }
    Ok(())
}

fn run_stations(dashboard: &Dashboard, json: bool) -> Result<()> {
    let stations = dashboard.stations();

    if json {
        println!("{}", serde_json::to_string_pretty(&stations)?);
        return Ok(());
    }

    println!("{:<24} keyword", "Station");
    for station in stations {
        println!("{:<24} {}", station.name, station.keyword);
    }
    Ok(())
}

async fn run_upload(dashboard: &Dashboard, month: Month, file: &PathBuf) -> Result<()> {
    let payload = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read upload file: {}", file.display()))?;

    let rows = dashboard.upload_month(month, &payload).await?;
    println!("Uploaded {rows} rows for {month}");
    Ok(())
}

/// Render " (+12.5% vs prev)" when a previous snapshot is available.
fn delta_suffix(report: &MetricsReport, metric: impl Fn(&metroboard_core::models::StationMetricsSnapshot) -> f64) -> String {
    match report.delta(metric) {
        Some(delta) => format!(" ({delta:+.1}% vs {})", report.month.prev()),
        None => String::new(),
    }
}

fn fmt_opt(value: Option<f64>, precision: usize, suffix: &str) -> String {
    match value {
        Some(v) => format!("{v:.precision$}{suffix}"),
        None => "n/a".to_string(),
    }
}
