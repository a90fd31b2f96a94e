//! SIF granule downloader.
//!
//! Command line access to the OCO-2/OCO-3 GES DISC archive and to GOSIF
//! products:
//! - List datasets and their available dates
//! - Resolve single granules
//! - Download date ranges, in parallel by default
//! - Fetch and unpack GOSIF GeoTIFFs

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

use downloader::auth::{Credentials, TOKEN_URL};
use downloader::config::{
    directory_url, ArchiveConfig, DEFAULT_DATA_URL, DEFAULT_GOSIF_URL, DEFAULT_OPENDAP_URL,
};
use downloader::gosif::{download_gosif, GosifPeriod, DEFAULT_GOSIF_DATASET};
use downloader::{GesDiscClient, HttpTransport};

#[derive(Parser, Debug)]
#[command(name = "sif-download")]
#[command(about = "Download OCO-2/OCO-3 SIF granules and GOSIF products")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenDAP catalog root
    #[arg(long, env = "GESDISC_OPENDAP_URL", default_value = DEFAULT_OPENDAP_URL)]
    opendap_url: String,

    /// Direct data portal root
    #[arg(long, env = "GESDISC_DATA_URL", default_value = DEFAULT_DATA_URL)]
    data_url: String,

    /// Earthdata bearer token
    #[arg(long, env = "EARTHDATA_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Earthdata Login username, used when no token is given
    #[arg(long, env = "EARTHDATA_USERNAME")]
    username: Option<String>,

    /// Earthdata Login password
    #[arg(long, env = "EARTHDATA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List datasets on the archive
    Datasets,

    /// Show the first and last available dates of a dataset
    Timerange { dataset: String },

    /// Resolve the granule of a dataset for one date
    Granule { dataset: String, date: NaiveDate },

    /// Download every granule between two dates (inclusive)
    Download {
        dataset: String,
        start: NaiveDate,
        end: NaiveDate,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,

        /// Download one file at a time
        #[arg(long)]
        sequential: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Download a GOSIF product
    Gosif {
        year: i32,

        /// Month (1-12); alone selects the monthly product
        #[arg(long)]
        month: Option<u32>,

        /// Day of month with --month, else day of year; selects the 8-day product
        #[arg(long)]
        day: Option<u32>,

        #[arg(long, default_value = DEFAULT_GOSIF_DATASET)]
        dataset: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,

        /// Keep the .gz archive without decompressing it
        #[arg(long)]
        no_unpack: bool,

        /// GOSIF data store root
        #[arg(long, env = "GOSIF_BASE_URL", default_value = DEFAULT_GOSIF_URL)]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = ArchiveConfig::new(&cli.opendap_url, &cli.data_url)
        .context("Invalid archive URL")?;

    if let Command::Gosif {
        year,
        month,
        day,
        dataset,
        outdir,
        no_unpack,
        base_url,
    } = &cli.command
    {
        let base: Url = directory_url(base_url).context("Invalid GOSIF URL")?;
        let period = GosifPeriod::from_parts(*year, *month, *day)?;
        let transport = HttpTransport::new(&config, None)?;
        let path =
            download_gosif(&transport, &base, dataset, *year, period, outdir, !no_unpack).await?;
        println!("{}", path.display());
        return Ok(());
    }

    let credentials = Credentials::from_parts(cli.token, cli.username, cli.password);
    info!(credentials = ?credentials, "Starting SIF downloader");
    let token = credentials
        .resolve(TOKEN_URL)
        .await
        .context("Failed to obtain an Earthdata token")?;

    let transport = Arc::new(HttpTransport::new(&config, token)?);
    let client = GesDiscClient::new(transport, config);

    match cli.command {
        Command::Datasets => {
            for name in client.list_datasets().await? {
                println!("{}", name);
            }
        }
        Command::Timerange { dataset } => {
            let (start, end) = client.dataset_timerange(&dataset).await?;
            println!("{} {}", start, end);
        }
        Command::Granule { dataset, date } => {
            let granule = client.granule_by_date(&dataset, date).await?;
            println!("{}", serde_json::to_string_pretty(&granule)?);
        }
        Command::Download {
            dataset,
            start,
            end,
            outdir,
            sequential,
            yes,
        } => {
            let plan = client.plan_timerange(&dataset, start, end, &outdir).await?;
            if plan.granules.is_empty() {
                println!("No granules found between {} and {}", start, end);
                return Ok(());
            }

            let prompt = format!(
                "This will add {} MB of data to {}. Continue? (y/N): ",
                plan.pending_megabytes(),
                outdir.display()
            );
            if !yes && !confirm(&prompt)? {
                println!("Download cancelled");
                return Ok(());
            }

            let report = client.download(&plan, !sequential).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.failed.is_empty() {
                anyhow::bail!("{} granule(s) failed to download", report.failed.len());
            }
        }
        Command::Gosif { .. } => {}
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
