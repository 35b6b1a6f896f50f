use crate::candidate::FriendsOfFriends;
use crate::config::types::{Config, StoreKeys, ThresholdConfig};
use crate::engine::thresholds;
use crate::engine::{
    BatchResult, CatalogError, DatedNameGenerator, DecisionEngine, EngineSettings, SourceCatalog, StoreTrigger,
    TriggerState,
};
use crate::output::{OutputAggregator, OutputReport};
use crate::status::{GulpStatus, StatusReporter};
use crate::store::{self, MonitorStore, StoreError};
use crate::sync::{CloseDelimitedReader, CycleOutcome, Gulp, GulpSynchronizer, PayloadReader, SyncError, Validation};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that stop the pipeline from starting. Nothing inside the cycle loop
/// is fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("source catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("cannot create output directory '{path}': {source}")]
    OutputDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// What happened in one cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub status: Option<GulpStatus>,
    pub gulp_id: Option<i64>,
    pub batch: Option<BatchResult>,
    pub output: Option<OutputReport>,
}

/// Synchronizer, decision engine, output and status wired into one loop.
pub struct Pipeline<R = CloseDelimitedReader> {
    synchronizer: GulpSynchronizer<R>,
    engine: DecisionEngine,
    state: TriggerState,
    store: Arc<dyn MonitorStore>,
    status: StatusReporter,
    aggregator: Option<OutputAggregator>,
    keys: StoreKeys,
    thresholds: ThresholdConfig,
    cycles: u64,
}

impl Pipeline<CloseDelimitedReader> {
    /// Build everything from config, including the configured store.
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let store = store::from_config(&config.store)?;
        Self::with_store(config, store).await
    }

    /// Build from config against an already constructed store.
    pub async fn with_store(config: &Config, store: Arc<dyn MonitorStore>) -> Result<Self, PipelineError> {
        let synchronizer = GulpSynchronizer::from_config(&config.sources, &config.sync)?;
        let engine = build_engine(config, store.clone())?;
        Pipeline::new(synchronizer, engine, store, config).await
    }
}

fn build_engine(config: &Config, store: Arc<dyn MonitorStore>) -> Result<DecisionEngine, PipelineError> {
    let catalog = match &config.trigger.source_catalog {
        Some(path) => {
            let catalog = SourceCatalog::load(path, config.trigger.catalog_dm_tolerance)?;
            info!(path = %path.display(), sources = catalog.len(), "Loaded known-source catalog");
            catalog
        }
        None => SourceCatalog::empty(),
    };

    if let Some(root) = &config.output.root {
        std::fs::create_dir_all(root).map_err(|source| PipelineError::OutputDir {
            path: root.clone(),
            source,
        })?;
    }

    let trigger = StoreTrigger::new(
        &config.trigger,
        Box::new(DatedNameGenerator),
        catalog,
        store,
        config.store.keys.clone(),
        config.output.root.clone(),
    );

    Ok(DecisionEngine::new(
        Box::new(FriendsOfFriends::new(&config.clustering)),
        Box::new(trigger),
        EngineSettings::new(&config.trigger, config.pipeline.errors.on_parse_error),
    ))
}

impl<R: PayloadReader> Pipeline<R> {
    pub async fn new(
        synchronizer: GulpSynchronizer<R>,
        engine: DecisionEngine,
        store: Arc<dyn MonitorStore>,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        let keys = config.store.keys.clone();
        let last_name = recover_last_name(store.as_ref(), &keys.last_name_key).await;
        if let Some(name) = &last_name {
            info!(name = %name, "Continuing candidate names");
        }

        Ok(Self {
            synchronizer,
            engine,
            state: TriggerState::new(Utc::now(), last_name, config.trigger.window_capacity),
            status: StatusReporter::new(store.clone(), keys.clone(), &config.status),
            store,
            aggregator: config.output.root.clone().map(OutputAggregator::new),
            keys,
            thresholds: config.thresholds.clone(),
            cycles: 0,
        })
    }

    /// Open the listening endpoints ahead of the first cycle.
    pub async fn bind(&mut self) -> usize {
        self.synchronizer.bind().await
    }

    pub fn local_addrs(&self) -> Vec<Option<SocketAddr>> {
        self.synchronizer.local_addrs()
    }

    pub fn synchronizer(&self) -> &GulpSynchronizer<R> {
        &self.synchronizer
    }

    pub fn trigger_state(&self) -> &TriggerState {
        &self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        info!(sources = self.local_addrs().len(), "Pipeline started");
        while self.run_cycle(cancel).await.is_some() {}
        info!(cycles = self.cycles, resyncs = self.synchronizer.resync_count(), "Pipeline stopped");
    }

    /// Run a single cycle. Returns `None` if cancelled before an outcome was
    /// reached, in which case no status is published.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Option<CycleReport> {
        self.status.heartbeat(Utc::now()).await;

        let validation = match self.synchronizer.next_cycle(cancel).await {
            CycleOutcome::Cancelled => return None,
            CycleOutcome::Completed(validation) => validation,
        };
        self.cycles += 1;

        let mut report = CycleReport {
            gulp_id: validation.gulp_id(),
            ..CycleReport::default()
        };

        let status = match validation {
            Validation::Incomplete { parsed, expected } => {
                warn!(parsed = parsed, expected = expected, "Incomplete gulp, skipping");
                GulpStatus::Incomplete
            }
            Validation::Divergent { .. } => GulpStatus::Divergent,
            Validation::Empty { gulp_id } => {
                self.status.gulp_received(Utc::now()).await;
                debug!(gulp = gulp_id, "Gulp carried no candidates");
                GulpStatus::Ok
            }
            Validation::Usable(gulp) => {
                self.status.gulp_received(Utc::now()).await;
                self.process(gulp, &mut report).await
            }
        };

        self.status.report(status, Utc::now()).await;
        report.status = Some(status);
        Some(report)
    }

    async fn process(&mut self, gulp: Gulp, report: &mut CycleReport) -> GulpStatus {
        let thresholds = thresholds::resolve(self.store.as_ref(), &self.keys, &self.thresholds).await;
        let now = Utc::now();

        let batch = match self
            .engine
            .process(&mut self.state, gulp.gulp_id, &gulp.merged_body(), &thresholds, now)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!(gulp = gulp.gulp_id, error = %e, "Could not process gulp");
                return GulpStatus::Overflow;
            }
        };

        info!(
            gulp = gulp.gulp_id,
            candidates = batch.candidate_count,
            clusters = batch.peaks.len(),
            survivors = batch.survivors.len(),
            "Processed gulp"
        );

        if let Some(aggregator) = self.aggregator.as_mut() {
            if !batch.peaks.is_empty() {
                match aggregator.record(&batch.peaks, thresholds.min_snr_t2out, thresholds.filter.max_ncl, now) {
                    Ok(written) => report.output = written,
                    Err(e) => error!(gulp = gulp.gulp_id, error = %e, "Could not write candidate output"),
                }
            }
        }

        report.batch = Some(batch);
        GulpStatus::Ok
    }
}

async fn recover_last_name(store: &dyn MonitorStore, key: &str) -> Option<String> {
    match store.get_dict(key).await {
        Ok(value) => value.get("name").and_then(|n| n.as_str()).map(str::to_string),
        Err(e) => {
            debug!(key = %key, error = %e, "No previous candidate name");
            None
        }
    }
}
