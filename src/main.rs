// Async HTTP boilerplate based on
// https://github.com/daboross/futures-example-2019/

pub use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics::describe_counter;
use mongodb::Client as MongoClient;
use opinionated_metrics::Mode;
use tracing::{info, info_span, warn};
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

use winds_mobi_ingest::adapters;
use winds_mobi_ingest::admin;
use winds_mobi_ingest::cache::EngineCache;
use winds_mobi_ingest::config::Config;
use winds_mobi_ingest::engine::Engine;
use winds_mobi_ingest::errors::display_causes_and_backtrace;
use winds_mobi_ingest::scheduler::{Pool, Scheduler, Trigger};
use winds_mobi_ingest::store::{MongoStationStore, StationStore};

/// Admin job default parameters, mirroring `run_scheduler.py`'s hard-coded
/// call sites (§4.3-§4.5).
const PRUNE_OLDER_THAN_DAYS: i64 = 60;
const DUPLICATE_DISTANCE_METERS: f64 = 50.0;
const CLUSTER_MIN_STATIONS: i64 = 20;
const CLUSTER_NUM_LEVELS: i64 = 3;

/// Our command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about = "harvest wind and weather observations into the winds.mobi store")]
struct Opt {
    /// Labels to attach to reported metrics. Recommended: "source=$SOURCE".
    #[arg(long = "metrics-label", value_name = "KEY=VALUE")]
    metrics_labels: Vec<MetricsLabel>,

    /// Command to run.
    #[command(subcommand)]
    cmd: Option<Command>,
}

/// Key/value pairs used to annotate reported metrics, of the form
/// `KEY=VALUE`.
#[derive(Clone, Debug)]
struct MetricsLabel {
    key: String,
    value: String,
}

impl std::str::FromStr for MetricsLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some((key, value)) = s.split_once('=') {
            Ok(MetricsLabel { key: key.to_owned(), value: value.to_owned() })
        } else {
            Err(anyhow::format_err!("expected \"key=value\", found {:?}", s))
        }
    }
}

/// Subcommands for winds-mobi-ingest.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler forever: adapters on their own intervals, admin
    /// jobs on their own daily cron triggers.
    Serve,
    /// Run the station-pruning admin job once and exit.
    Prune {
        /// Delete stations not seen in this many days.
        #[arg(long, default_value_t = PRUNE_OLDER_THAN_DAYS)]
        days: i64,
        /// Restrict pruning to one provider code.
        #[arg(long)]
        provider: Option<String>,
    },
    /// Run the near-duplicate-detection admin job once and exit.
    Duplicates {
        /// Distance, in meters, within which two stations are considered
        /// duplicates of one another.
        #[arg(long, default_value_t = DUPLICATE_DISTANCE_METERS)]
        distance: f64,
    },
    /// Run the cluster-level-assignment admin job once and exit.
    Clusters {
        /// Smallest cluster count to assign representatives for.
        #[arg(long, default_value_t = CLUSTER_MIN_STATIONS)]
        min: i64,
        /// Number of geometrically-spaced cluster-count levels.
        #[arg(long, default_value_t = CLUSTER_NUM_LEVELS)]
        num: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let config = Config::from_env()?;

    let _sentry_guard = config.sentry_url.as_ref().map(|url| {
        sentry::init((
            url.as_str(),
            sentry::ClientOptions {
                environment: Some(config.environment.clone().into()),
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt_layer)
        .with(sentry_tracing::layer())
        .init();
    let _span = info_span!("winds-mobi-ingest").entered();
    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut metrics_builder = opinionated_metrics::Builder::new(Mode::Cli);
    for label in &opt.metrics_labels {
        metrics_builder = metrics_builder.add_global_label(&label.key, &label.value);
    }
    let metrics_handle = metrics_builder.install()?;
    describe_counter!(
        "winds_mobi.stations_failed.count",
        "Stations an adapter could not process, by provider"
    );

    let store: Arc<dyn StationStore> = Arc::new(mongo_station_store(&config).await?);
    let key_value_store = <dyn winds_mobi_ingest::key_value_stores::KeyValueStore>::new_from_url(
        config.redis_url.clone(),
        "winds_mobi:".to_owned(),
    )
    .await?;
    let cache = Arc::new(EngineCache::new(key_value_store));
    let engine = Arc::new(Engine::new(Arc::clone(&store), cache, config.google_api_key.clone())?);

    let result = match opt.cmd.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, &engine, Arc::clone(&store)).await,
        Command::Prune { days, provider } => {
            admin::delete_stations(store.as_ref(), days, provider.as_deref())
                .await
                .map(|deleted| info!(deleted, "prune complete"))
                .map_err(Into::into)
        }
        Command::Duplicates { distance } => admin::find_duplicates(store.as_ref(), distance)
            .await
            .map_err(Into::into),
        Command::Clusters { min, num } => admin::save_clusters(store.as_ref(), min, num)
            .await
            .map_err(Into::into),
    };

    if let Err(err) = metrics_handle.report().await {
        warn!("could not report metrics: {:?}", err);
    }

    if let Err(err) = &result {
        display_causes_and_backtrace(err);
    }
    result
}

async fn mongo_station_store(config: &Config) -> Result<MongoStationStore> {
    let client = MongoClient::with_uri_str(&config.mongodb_url).await?;
    let db_name = mongodb::options::ClientOptions::parse(&config.mongodb_url)
        .await?
        .default_database
        .unwrap_or_else(|| "winds_mobi".to_owned());
    Ok(MongoStationStore::new(client.database(&db_name)))
}

/// Run every enabled adapter on its own interval and every admin job on its
/// own daily cron trigger, forever (§4.6).
async fn serve(config: &Config, engine: &Arc<Engine>, store: Arc<dyn StationStore>) -> Result<()> {
    let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
    let mut scheduler = Scheduler::new().await?;

    for adapter in adapters::all(engine, http) {
        if !config.provider_enabled(adapter.provider_code()) {
            info!(provider = adapter.provider_code(), "adapter disabled, skipping");
            continue;
        }
        let adapter: Arc<dyn adapters::Adapter> = Arc::from(adapter);
        let name = format!("adapter:{}", adapter.provider_code());
        let trigger = Trigger::FixedInterval { every: adapter.poll_interval() };
        scheduler
            .add_job(&name, Pool::Provider, trigger, move || {
                let adapter = Arc::clone(&adapter);
                async move {
                    if let Err(err) = adapter.run().await {
                        warn!(provider = adapter.provider_code(), error = %err, "adapter run failed");
                    }
                }
            })
            .await?;
    }

    {
        let store = Arc::clone(&store);
        scheduler
            .add_job("prune", Pool::Admin, Trigger::DailyAtUtc { hour: 3, minute: 0 }, move || {
                let store = Arc::clone(&store);
                async move {
                    if let Err(err) = admin::delete_stations(store.as_ref(), PRUNE_OLDER_THAN_DAYS, None).await {
                        warn!(error = %err, "prune job failed");
                    }
                }
            })
            .await?;
    }
    {
        let store = Arc::clone(&store);
        scheduler
            .add_job(
                "duplicates",
                Pool::Admin,
                Trigger::DailyAtUtc { hour: 4, minute: 0 },
                move || {
                    let store = Arc::clone(&store);
                    async move {
                        if let Err(err) = admin::find_duplicates(store.as_ref(), DUPLICATE_DISTANCE_METERS).await {
                            warn!(error = %err, "duplicates job failed");
                        }
                    }
                },
            )
            .await?;
    }
    {
        let store = Arc::clone(&store);
        scheduler
            .add_job("clusters", Pool::Admin, Trigger::DailyAtUtc { hour: 4, minute: 30 }, move || {
                let store = Arc::clone(&store);
                async move {
                    if let Err(err) = admin::save_clusters(store.as_ref(), CLUSTER_MIN_STATIONS, CLUSTER_NUM_LEVELS).await
                    {
                        warn!(error = %err, "clusters job failed");
                    }
                }
            })
            .await?;
    }

    scheduler.start().await?;
    info!("scheduler started");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.shutdown().await?;
    Ok(())
}
