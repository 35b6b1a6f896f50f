use crate::candidate::CandidateRow;
use crate::config::types::{StoreKeys, TriggerConfig};
use crate::engine::catalog::SourceCatalog;
use crate::engine::naming::NameGenerator;
use crate::output::write_atomic;
use crate::store::MonitorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything the trigger step needs to judge the brightest surviving candidate.
#[derive(Debug, Clone)]
pub struct TriggerRequest<'a> {
    /// Filtered candidates, brightest first. Never empty.
    pub candidates: &'a [CandidateRow],
    pub enabled: bool,
    pub previous_name: Option<&'a str>,
    pub gulp_id: i64,
    /// Beam count summed over the recent-gulp window.
    pub beam_activity: usize,
    pub frac_wide: f64,
    pub prev_trigger_time: DateTime<Utc>,
    pub min_interval: Duration,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Suppression {
    Debounce { elapsed: chrono::Duration },
    KnownSource(String),
    RfiStorm { beam_activity: usize, frac_wide: f64 },
    PublishFailed(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerDecision {
    /// Name given to the candidate, when one was handed out.
    pub name: Option<String>,
    /// The candidate the name belongs to.
    pub candidate: Option<CandidateRow>,
    /// Set only when a trigger actually fired.
    pub fired_at: Option<DateTime<Utc>>,
    pub suppressed: Option<Suppression>,
}

impl TriggerDecision {
    fn suppressed(reason: Suppression) -> Self {
        Self {
            suppressed: Some(reason),
            ..Self::default()
        }
    }
}

/// Names a candidate and, when allowed, fires a trigger for it.
#[async_trait]
pub trait TriggerStep: Send + Sync {
    async fn evaluate(&self, request: TriggerRequest<'_>) -> TriggerDecision;
}

/// Debounce, known-source and RFI-storm vetoes, then a trigger command through
/// the shared store plus a JSON record of the candidate.
pub struct StoreTrigger {
    namer: Box<dyn NameGenerator>,
    catalog: SourceCatalog,
    store: Arc<dyn MonitorStore>,
    keys: StoreKeys,
    output_root: Option<PathBuf>,
    storm_beam_threshold: usize,
    storm_max_frac_wide: f64,
}

impl StoreTrigger {
    pub fn new(
        config: &TriggerConfig,
        namer: Box<dyn NameGenerator>,
        catalog: SourceCatalog,
        store: Arc<dyn MonitorStore>,
        keys: StoreKeys,
        output_root: Option<PathBuf>,
    ) -> Self {
        Self {
            namer,
            catalog,
            store,
            keys,
            output_root,
            storm_beam_threshold: config.storm_beam_threshold,
            storm_max_frac_wide: config.storm_max_frac_wide,
        }
    }

    fn write_record(&self, name: &str, row: &CandidateRow, gulp_id: i64, beam_activity: usize, frac_wide: f64) {
        let Some(root) = &self.output_root else {
            return;
        };

        let record = json!({
            name: {
                "mjds": row.mjds,
                "snr": row.snr,
                "ibox": row.ibox,
                "dm": row.dm,
                "ibeam": row.ibeam,
                "cntb": row.cntb,
                "cntc": row.cntc,
                "specnum": row.specnum,
                "itime": row.itime,
                "gulp": gulp_id,
                "beam_activity": beam_activity,
                "frac_wide": frac_wide,
            }
        });

        let path = root.join(format!("{}.json", name));
        let result = serde_json::to_vec_pretty(&record)
            .map_err(std::io::Error::from)
            .and_then(|bytes| write_atomic(&path, &bytes));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write trigger record");
        }
    }
}

#[async_trait]
impl TriggerStep for StoreTrigger {
    async fn evaluate(&self, request: TriggerRequest<'_>) -> TriggerDecision {
        let Some(row) = request.candidates.first() else {
            return TriggerDecision::default();
        };

        let elapsed = request.now - request.prev_trigger_time;
        // A previous trigger in the future (clock step) also counts as too recent.
        let too_soon = elapsed.to_std().map_or(true, |e| e < request.min_interval);
        if too_soon {
            info!(elapsed_secs = elapsed.num_seconds(), "Within debounce interval, not triggering");
            return TriggerDecision::suppressed(Suppression::Debounce { elapsed });
        }

        if let Some(known) = self.catalog.matching(row) {
            info!(source = %known.name, ibeam = row.ibeam, dm = row.dm, "Candidate matches known source");
            return TriggerDecision::suppressed(Suppression::KnownSource(known.name.clone()));
        }

        if request.beam_activity > self.storm_beam_threshold && request.frac_wide >= self.storm_max_frac_wide {
            info!(
                beam_activity = request.beam_activity,
                frac_wide = request.frac_wide,
                "RFI storm, not triggering"
            );
            return TriggerDecision::suppressed(Suppression::RfiStorm {
                beam_activity: request.beam_activity,
                frac_wide: request.frac_wide,
            });
        }

        let name = self.namer.next_name(request.previous_name, request.now);
        self.write_record(&name, row, request.gulp_id, request.beam_activity, request.frac_wide);

        let mut decision = TriggerDecision {
            name: Some(name.clone()),
            candidate: Some(row.clone()),
            fired_at: None,
            suppressed: None,
        };

        if !request.enabled {
            info!(name = %name, snr = row.snr, dm = row.dm, "Named candidate, triggering disabled");
            return decision;
        }

        let command = json!({ "cmd": "trigger", "val": format!("{}-{}-", row.itime, name) });
        if let Err(e) = self.store.put_dict(&self.keys.trigger_key, command).await {
            warn!(name = %name, error = %e, "Failed to send trigger command");
            decision.suppressed = Some(Suppression::PublishFailed(e.to_string()));
            return decision;
        }

        if let Err(e) = self.store.put_dict(&self.keys.last_name_key, json!({ "name": name })).await {
            warn!(error = %e, "Failed to persist last candidate name");
        }

        info!(name = %name, gulp = request.gulp_id, snr = row.snr, dm = row.dm, ibeam = row.ibeam, "Triggered");
        decision.fired_at = Some(request.now);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::naming::DatedNameGenerator;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn trigger(store: Arc<MemoryStore>, catalog: SourceCatalog, root: Option<PathBuf>) -> StoreTrigger {
        StoreTrigger::new(
            &TriggerConfig::default(),
            Box::new(DatedNameGenerator),
            catalog,
            store,
            StoreKeys::default(),
            root,
        )
    }

    fn request<'a>(candidates: &'a [CandidateRow], prev: DateTime<Utc>) -> TriggerRequest<'a> {
        TriggerRequest {
            candidates,
            enabled: true,
            previous_name: Some("261016aaa"),
            gulp_id: 42,
            beam_activity: 3,
            frac_wide: 0.0,
            prev_trigger_time: prev,
            min_interval: Duration::from_secs(60),
            now: now(),
        }
    }

    #[tokio::test]
    async fn test_fires_and_publishes() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let step = trigger(store.clone(), SourceCatalog::empty(), Some(dir.path().to_path_buf()));
        let rows = vec![CandidateRow::new(15.0, 1234, 4, 500.0, 30)];

        let decision = step.evaluate(request(&rows, now() - chrono::Duration::seconds(61))).await;

        assert_eq!(decision.name.as_deref(), Some("261016aab"));
        assert_eq!(decision.fired_at, Some(now()));
        assert_eq!(store.get("/cmd/corr/0").unwrap()["val"], "1234-261016aab-");
        assert_eq!(store.get("/mon/T2/lastname").unwrap()["name"], "261016aab");
        assert!(dir.path().join("261016aab.json").exists());
    }

    #[tokio::test]
    async fn test_debounce_suppresses() {
        let store = Arc::new(MemoryStore::new());
        let step = trigger(store.clone(), SourceCatalog::empty(), None);
        let rows = vec![CandidateRow::new(15.0, 1234, 4, 500.0, 30)];

        let decision = step.evaluate(request(&rows, now() - chrono::Duration::seconds(59))).await;

        assert!(decision.fired_at.is_none());
        assert!(decision.name.is_none());
        assert!(matches!(decision.suppressed, Some(Suppression::Debounce { .. })));
        assert!(store.get("/cmd/corr/0").is_none());
    }

    #[tokio::test]
    async fn test_known_source_suppresses() {
        let store = Arc::new(MemoryStore::new());
        let catalog = SourceCatalog::parse("B0531+21 30 501.0\n", 5.0).unwrap();
        let step = trigger(store, catalog, None);
        let rows = vec![CandidateRow::new(15.0, 1234, 4, 500.0, 30)];

        let decision = step.evaluate(request(&rows, now() - chrono::Duration::hours(1))).await;
        assert_eq!(decision.suppressed, Some(Suppression::KnownSource("B0531+21".to_string())));
    }

    #[tokio::test]
    async fn test_rfi_storm_only_suppresses_wide_events() {
        let store = Arc::new(MemoryStore::new());
        let step = trigger(store, SourceCatalog::empty(), None);
        let rows = vec![CandidateRow::new(15.0, 1234, 4, 500.0, 30)];

        let mut storm = request(&rows, now() - chrono::Duration::hours(1));
        storm.beam_activity = 250;
        storm.frac_wide = 0.9;
        let decision = step.evaluate(storm.clone()).await;
        assert!(matches!(decision.suppressed, Some(Suppression::RfiStorm { .. })));

        storm.frac_wide = 0.2;
        let decision = step.evaluate(storm).await;
        assert!(decision.fired_at.is_some());
    }

    #[tokio::test]
    async fn test_disabled_names_without_firing() {
        let store = Arc::new(MemoryStore::new());
        let step = trigger(store.clone(), SourceCatalog::empty(), None);
        let rows = vec![CandidateRow::new(15.0, 1234, 4, 500.0, 30)];

        let mut req = request(&rows, now() - chrono::Duration::hours(1));
        req.enabled = false;
        let decision = step.evaluate(req).await;

        assert_eq!(decision.name.as_deref(), Some("261016aab"));
        assert!(decision.fired_at.is_none());
        assert!(store.get("/cmd/corr/0").is_none());
    }
}
