#[macro_use]
extern crate tracing;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use observation_loader::{
    core::{
        self,
        args::{ArgsParser, Cmd, RunArgs},
        config::{self, Config},
    },
    loader::{BatchOutcome, BulkWriter, Jitter, LoadError, RandomJitter, RetryBudget},
    source::{JsonFileSource, ObservationSource},
    store::{MemoryStore, ObservationStore},
};
use tokio::runtime;

fn main() -> ExitCode {
    match stage0_delegate() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            eprintln!("Error: Failed to complete - please check logs");
            ExitCode::FAILURE
        }
    }
}

fn stage0_delegate() -> Result<()> {
    let args = ArgsParser::parse();
    let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
    match args.cmd {
        Cmd::CheckConfig { config } => {
            let cfg = runtime.block_on(config::open(&config))?;
            println!("{}", cfg.serialize_redacted());
            Ok(())
        }
        Cmd::Run { args } => {
            println!("Reading configuration from {:?}", args.config);
            let cfg = runtime.block_on(config::open(&args.config))?;
            let _guard = core::init_logging(&cfg.log.level, cfg.log.dir.clone())?;
            debug!("Effective configuration:\n{}", cfg.serialize_redacted());
            runtime.block_on(async_main(cfg, args))
        }
    }
}

#[instrument(skip_all, fields(run = %uuid::Uuid::new_v4()))]
async fn async_main(cfg: Config, args: RunArgs) -> Result<()> {
    let budget = RetryBudget::new(args.max_retries.unwrap_or(cfg.loader.max_retries));
    let jitter = match cfg.loader.jitter_seed {
        Some(seed) => {
            RandomJitter::seeded(seed, cfg.loader.jitter_min_ms, cfg.loader.jitter_max_ms)
        }
        None => RandomJitter::new(cfg.loader.jitter_min_ms, cfg.loader.jitter_max_ms),
    };

    let store: Box<dyn ObservationStore> = if args.dry_run {
        warn!("Dry run: loading into an in-memory store, the data store is not touched");
        Box::new(MemoryStore::new())
    } else {
        connect(&cfg).await?
    };

    let observations = JsonFileSource::new(cfg.source.path.clone())
        .load_observations()
        .await?;

    let mut writer = BulkWriter::new(store, jitter);
    load(&mut writer, observations, budget, !args.no_check).await
}

async fn load<S: ObservationStore, J: Jitter>(
    writer: &mut BulkWriter<S, J>,
    observations: Vec<observation_loader::observations::WeatherStationObservation>,
    budget: RetryBudget,
    perform_check: bool,
) -> Result<()> {
    match writer.write(observations, budget, perform_check).await {
        Ok(BatchOutcome::Empty) => info!("No observations to load"),
        Ok(BatchOutcome::AlreadyPresent) => info!("Observations were already loaded"),
        Ok(BatchOutcome::Written { records, attempts }) => {
            info!("Loaded {records} observations in {attempts} attempt(s)")
        }
        Err(e) => {
            report(&e);
            return Err(e.into());
        }
    }
    Ok(())
}

fn report(err: &LoadError) {
    error!("Load failed: {err}");
    for e in err.write_errors() {
        error!(
            index = e.index,
            code = e.error_code,
            retriable = e.is_retriable(),
            "outstanding record error: {}",
            e.details
        );
    }
}

#[cfg(feature = "mongo")]
async fn connect(cfg: &Config) -> Result<Box<dyn ObservationStore>> {
    use observation_loader::store::MongoStore;

    Ok(Box::new(MongoStore::connect(&cfg.datastore).await?))
}

#[cfg(not(feature = "mongo"))]
async fn connect(cfg: &Config) -> Result<Box<dyn ObservationStore>> {
    error!(
        "Cannot connect to {}/{}: built without the `mongo` feature",
        cfg.datastore.database_name, cfg.datastore.collection_name
    );
    anyhow::bail!("no data store support compiled in (rebuild with `--features mongo`, or use --dry-run)")
}
