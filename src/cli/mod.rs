//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    /// Pipeline configuration file
    #[arg(short, long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Product, scenario and month. Missing values come from the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// temp, bio, prec, tmax or tmin
    #[arg(short, long)]
    pub product: Option<String>,
    /// e.g. ACCESS1-0_rcp45
    #[arg(short, long)]
    pub scenario: Option<String>,
    /// Month name or number
    #[arg(short, long)]
    pub month: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download, crop, summarise and upload a climatology
    Run {
        #[command(flatten)]
        selection: Selection,
        /// Process every month of the scenario
        #[arg(long)]
        all_months: bool,
    },
    /// Show the steps a run would take without executing them
    Plan {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        all_months: bool,
    },
    /// Download the boundary shapefile and write it as GeoJSON
    Boundaries {},
    /// Load countries from a CSV into the database
    Countries {
        /// CSV with iso3_code, iso2_code and adm0_name columns
        csv: PathBuf,
    },
    /// Save a scenario's yearly aggregate as parquet
    Export {
        #[command(flatten)]
        selection: Selection,
    },
    /// Serve the dashboard
    Dashboard {
        /// temp, bio, prec, tmax or tmin
        #[arg(short, long)]
        product: Option<String>,
        #[arg(long, default_value_t = 8050)]
        port: u16,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let bar = ProgressBar::new(size).with_message(message);
    if let Ok(style) = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}") {
        bar.set_style(style.progress_chars("##-"));
    }

    bar
}

// -- Tests -------------------------------------------------------------------
