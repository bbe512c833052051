mod config;
mod evaluator;
mod fetcher;
mod model;
mod normalizer;
mod pipeline;
mod storage;
mod utils;

use clap::{Parser, Subcommand};
use config::{load_config, AppConfig};
use evaluator::EvaluatorImpl;
use fetcher::{FileSource, HttpSource, PayloadSource};
use model::{OfferFilter, PaymentInstrument};
use pipeline::QueryParams;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use storage::SqliteStorage;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "bank-offer-sniper",
    version,
    about = "Normalize bank payment offers and find the best discount"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Overrides `db_path` from the config
    #[arg(long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize one vendor payload and store its offers
    Ingest {
        /// JSON file to read, `-` for stdin
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,
        /// URL to fetch; defaults to `feed_url` from the config
        #[arg(long)]
        url: Option<String>,
    },
    /// Find the highest applicable discount for a payment
    Best {
        #[arg(long = "amount")]
        amount_to_pay: String,
        #[arg(long = "bank")]
        bank_name: String,
        #[arg(long = "instrument")]
        payment_instrument: Option<String>,
    },
    /// List stored offers, newest first
    List {
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        instrument: Option<String>,
        /// Show deactivated offers instead of active ones
        #[arg(long)]
        inactive: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is read before logging so the level can come from it
    let (config, config_error) = match load_config(&cli.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e.to_string())),
    };
    tracing_subscriber::fmt()
        .with_max_level(config.max_level())
        .with_writer(std::io::stderr)
        .init();

    if let Some(e) = config_error {
        warn!("Config {} not loaded ({}), using defaults", cli.config, e);
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    let storage = match SqliteStorage::new(&db_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage at {}: {}", db_path, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Ingest { file, url } => run_ingest(file, url, &config, storage).await,
        Command::Best {
            amount_to_pay,
            bank_name,
            payment_instrument,
        } => {
            let params = QueryParams {
                amount_to_pay: Some(amount_to_pay),
                bank_name: Some(bank_name),
                payment_instrument,
            };
            run_best(&params, storage).await
        }
        Command::List {
            bank,
            instrument,
            inactive,
        } => run_list(bank, instrument, inactive, storage).await,
    }
}

async fn run_ingest(
    file: Option<PathBuf>,
    url: Option<String>,
    config: &AppConfig,
    storage: Arc<Mutex<SqliteStorage>>,
) -> ExitCode {
    let source: Box<dyn PayloadSource> = match (file, url.or_else(|| config.feed_url.clone())) {
        (Some(path), _) => Box::new(FileSource::new(path)),
        (None, Some(url)) => match HttpSource::new(&url, config.request_timeout_seconds) {
            Ok(source) => Box::new(source),
            Err(e) => {
                error!("Failed to build HTTP client: {}", e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) => {
            error!("Nothing to ingest: pass --file or --url, or set feed_url in the config");
            return ExitCode::FAILURE;
        }
    };

    let body = match source.fetch().await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to fetch payload: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match pipeline::ingest(&body, storage).await {
        Ok(report) => {
            if report.identified == 0 {
                info!("No offers found in the provided payload");
            }
            print_json(&report)
        }
        Err(e) => {
            error!("Ingestion failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_best(params: &QueryParams, storage: Arc<Mutex<SqliteStorage>>) -> ExitCode {
    let query = match pipeline::build_query(params, chrono::Utc::now()) {
        Ok(query) => query,
        Err(e) => {
            error!("Invalid query: {}", e);
            return ExitCode::from(2);
        }
    };

    match pipeline::best_discount(&query, storage, &EvaluatorImpl::new()).await {
        Ok(result) => print_json(&result),
        Err(e) => {
            error!("Error calculating highest discount: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_list(
    bank: Option<String>,
    instrument: Option<String>,
    inactive: bool,
    storage: Arc<Mutex<SqliteStorage>>,
) -> ExitCode {
    let payment_instrument = match instrument.map(|i| i.parse::<PaymentInstrument>()).transpose() {
        Ok(instrument) => instrument,
        Err(e) => {
            error!("Invalid filter: {}", e);
            return ExitCode::from(2);
        }
    };
    let filter = OfferFilter {
        bank_name: bank,
        payment_instrument,
        is_active: !inactive,
    };

    match pipeline::list_offers(&filter, storage).await {
        Ok(offers) => print_json(&serde_json::json!({
            "offers": offers,
            "count": offers.len(),
        })),
        Err(e) => {
            error!("Error fetching offers: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}
