use crate::candidate::filter::{
    beam_count, boxcar_saturated, filter_clustered, peak_rows, wide_fraction,
};
use crate::candidate::{parse_candidates, CandidateRow, Clusterer, ProcessingError};
use crate::config::types::{ParseErrorStrategy, TriggerConfig};
use crate::engine::state::TriggerState;
use crate::engine::thresholds::Thresholds;
use crate::engine::trigger::{TriggerDecision, TriggerRequest, TriggerStep};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Value of the `trigger` column for a peak row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TriggerMark {
    #[default]
    Untriggered,
    Triggered(String),
}

impl fmt::Display for TriggerMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMark::Untriggered => write!(f, "0"),
            TriggerMark::Triggered(name) => write!(f, "{}", name),
        }
    }
}

/// What the engine concluded about one gulp.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub gulp_id: i64,
    /// Number of candidate rows parsed from the gulp.
    pub candidate_count: usize,
    /// One row per cluster, in cluster order, with its trigger mark.
    pub peaks: Vec<(CandidateRow, TriggerMark)>,
    /// Peaks that passed every threshold, brightest first.
    pub survivors: Vec<CandidateRow>,
    pub beam_count: usize,
    pub beam_activity: usize,
    pub frac_wide: f64,
    pub boxcar_saturated: bool,
    pub trigger: Option<TriggerDecision>,
}

impl BatchResult {
    pub fn fired(&self) -> bool {
        self.trigger.as_ref().is_some_and(|t| t.fired_at.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub trigger_enabled: bool,
    pub debounce: Duration,
    pub wide_ibox_threshold: u32,
    pub saturation_ibox: u32,
    pub saturation_fraction: f64,
    pub saturation_min_peaks: usize,
    pub on_parse_error: ParseErrorStrategy,
}

impl EngineSettings {
    pub fn new(trigger: &TriggerConfig, on_parse_error: ParseErrorStrategy) -> Self {
        Self {
            trigger_enabled: trigger.enabled,
            debounce: trigger.debounce,
            wide_ibox_threshold: trigger.wide_ibox_threshold,
            saturation_ibox: trigger.saturation_ibox,
            saturation_fraction: trigger.saturation_fraction,
            saturation_min_peaks: trigger.saturation_min_peaks,
            on_parse_error,
        }
    }
}

/// Turns a gulp's candidate table into a trigger decision.
pub struct DecisionEngine {
    clusterer: Box<dyn Clusterer>,
    trigger: Box<dyn TriggerStep>,
    settings: EngineSettings,
}

impl DecisionEngine {
    pub fn new(clusterer: Box<dyn Clusterer>, trigger: Box<dyn TriggerStep>, settings: EngineSettings) -> Self {
        Self {
            clusterer,
            trigger,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Process one gulp body. `state` is updated with the beam count and, when
    /// a trigger fires, the new name and time.
    pub async fn process(
        &self,
        state: &mut TriggerState,
        gulp_id: i64,
        body: &str,
        thresholds: &Thresholds,
        now: DateTime<Utc>,
    ) -> Result<BatchResult, ProcessingError> {
        let mut rows = parse_candidates(body, self.settings.on_parse_error)?;
        let mut result = BatchResult {
            gulp_id,
            candidate_count: rows.len(),
            ..BatchResult::default()
        };
        if rows.is_empty() {
            return Ok(result);
        }

        self.clusterer.cluster(&mut rows)?;
        let peaks = peak_rows(&rows);

        result.beam_count = beam_count(&peaks);
        result.beam_activity = state
            .beams
            .total_after_push(result.beam_count)
            .ok_or_else(|| ProcessingError::Overflow {
                column: "ibeam",
                value: "beam activity sum".to_string(),
            })?;
        state.beams.push(result.beam_count);

        result.frac_wide = wide_fraction(&rows, self.settings.wide_ibox_threshold);
        result.boxcar_saturated = boxcar_saturated(
            &peaks,
            self.settings.saturation_ibox,
            self.settings.saturation_fraction,
            self.settings.saturation_min_peaks,
        );
        if result.boxcar_saturated {
            info!(gulp = gulp_id, peaks = peaks.len(), "Boxcar saturation filter, not triggering");
        }

        result.survivors = filter_clustered(&peaks, &thresholds.filter);
        debug!(
            gulp = gulp_id,
            candidates = rows.len(),
            clusters = peaks.len(),
            survivors = result.survivors.len(),
            beams = result.beam_count,
            frac_wide = result.frac_wide,
            "Clustered gulp"
        );

        let mut marks = vec![TriggerMark::Untriggered; peaks.len()];

        if !result.survivors.is_empty() && !result.boxcar_saturated {
            let decision = self
                .trigger
                .evaluate(TriggerRequest {
                    candidates: &result.survivors,
                    enabled: self.settings.trigger_enabled,
                    previous_name: state.prev_trigger_name(),
                    gulp_id,
                    beam_activity: result.beam_activity,
                    frac_wide: result.frac_wide,
                    prev_trigger_time: state.prev_trigger_time(),
                    min_interval: self.settings.debounce,
                    now,
                })
                .await;

            match (&decision.name, decision.fired_at) {
                (Some(name), Some(at)) => {
                    state.record_trigger(name.clone(), at);
                    if let Some(candidate) = &decision.candidate {
                        if let Some(idx) = peaks.iter().position(|p| p == candidate) {
                            marks[idx] = TriggerMark::Triggered(name.clone());
                        }
                    }
                }
                (Some(name), None) => state.record_name(name.clone()),
                _ => {}
            }

            result.trigger = Some(decision);
        }

        result.peaks = peaks.into_iter().zip(marks).collect();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::filter::FilterThresholds;
    use crate::candidate::FriendsOfFriends;
    use crate::config::types::ClusteringConfig;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Fires whenever the debounce interval has passed, recording each call.
    struct FakeTrigger {
        calls: Arc<Mutex<Vec<i64>>>,
    }

    #[async_trait]
    impl TriggerStep for FakeTrigger {
        async fn evaluate(&self, request: TriggerRequest<'_>) -> TriggerDecision {
            self.calls.lock().unwrap().push(request.gulp_id);
            let ready = (request.now - request.prev_trigger_time)
                .to_std()
                .map_or(false, |e| e >= request.min_interval);
            if !ready {
                return TriggerDecision::default();
            }
            TriggerDecision {
                name: Some(format!("cand{}", request.gulp_id)),
                candidate: request.candidates.first().cloned(),
                fired_at: Some(request.now),
                suppressed: None,
            }
        }
    }

    fn engine(calls: Arc<Mutex<Vec<i64>>>) -> DecisionEngine {
        DecisionEngine::new(
            Box::new(FriendsOfFriends::new(&ClusteringConfig::default())),
            Box::new(FakeTrigger { calls }),
            EngineSettings::new(&TriggerConfig::default(), ParseErrorStrategy::Drop),
        )
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            filter: FilterThresholds {
                min_snr: 8.0,
                min_snr_wide: 9.0,
                wide_ibox: 16,
                max_ibox: 65,
                min_dm: 50.0,
                max_ctb0: 30,
                max_ctb: 100,
                max_ncl: 10,
            },
            min_snr_t2out: 6.0,
        }
    }

    // snr if specnum mjds ibox idm dm ibeam
    const BRIGHT: &str = "15.0 1000 0 60234.5 4 400 500.0 30\n12.0 1010 0 60234.5 4 401 501.0 31\n";

    #[tokio::test]
    async fn test_trigger_marks_peak_and_updates_state() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(calls.clone());
        let now = Utc::now();
        let mut state = TriggerState::new(now - chrono::Duration::hours(1), None, 10);

        let result = engine.process(&mut state, 42, BRIGHT, &thresholds(), now).await.unwrap();

        assert!(result.fired());
        assert_eq!(result.peaks.len(), 1);
        assert_eq!(result.peaks[0].1, TriggerMark::Triggered("cand42".to_string()));
        assert_eq!(state.prev_trigger_time(), now);
        assert_eq!(state.prev_trigger_name(), Some("cand42"));
        assert_eq!(state.beams.len(), 1);
    }

    #[tokio::test]
    async fn test_debounce_blocks_second_trigger() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(calls.clone());
        let start = Utc::now();
        let mut state = TriggerState::new(start - chrono::Duration::hours(1), None, 10);

        let mut fired = 0;
        for i in 0..5 {
            let now = start + chrono::Duration::seconds(10 * i);
            let result = engine.process(&mut state, i, BRIGHT, &thresholds(), now).await.unwrap();
            if result.fired() {
                fired += 1;
            }
        }

        assert_eq!(fired, 1);
        assert_eq!(calls.lock().unwrap().len(), 5);
        assert_eq!(state.prev_trigger_time(), start);
    }

    #[tokio::test]
    async fn test_boxcar_saturation_skips_trigger() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(calls.clone());
        let now = Utc::now();
        let mut state = TriggerState::new(now - chrono::Duration::hours(1), None, 10);

        // Twenty well separated bright clusters, all at the widest boxcar.
        let body: String = (0..20)
            .map(|i| format!("20.0 {} 0 60234.5 64 {} 500.0 {}\n", i * 10_000, i * 100, i * 20))
            .collect();

        let result = engine.process(&mut state, 7, &body, &thresholds(), now).await.unwrap();

        assert!(result.boxcar_saturated);
        assert_eq!(result.survivors.len(), 10);
        assert!(result.trigger.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_records_without_trigger() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(calls.clone());
        let now = Utc::now();
        let mut state = TriggerState::new(now - chrono::Duration::hours(1), None, 10);

        let body = "7.0 1000 0 60234.5 4 400 500.0 30\n";
        let result = engine.process(&mut state, 3, body, &thresholds(), now).await.unwrap();

        assert_eq!(result.peaks.len(), 1);
        assert!(result.survivors.is_empty());
        assert!(result.trigger.is_none());
        assert_eq!(result.peaks[0].1, TriggerMark::Untriggered);
    }

    #[tokio::test]
    async fn test_overflow_is_reported() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(calls);
        let now = Utc::now();
        let mut state = TriggerState::new(now, None, 10);

        let body = "7.0 99999999999999999999 0 60234.5 4 400 500.0 30\n";
        let err = engine.process(&mut state, 3, body, &thresholds(), now).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Overflow { column: "if", .. }));
        assert!(state.beams.is_empty());
    }

    #[tokio::test]
    async fn test_beam_overflow_leaves_window_untouched() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(calls.clone());
        let now = Utc::now();
        let mut state = TriggerState::new(now - chrono::Duration::hours(1), None, 10);
        state.beams.push(usize::MAX);

        let err = engine.process(&mut state, 5, BRIGHT, &thresholds(), now).await.unwrap_err();

        assert!(matches!(err, ProcessingError::Overflow { column: "ibeam", .. }));
        assert_eq!(state.beams.len(), 1);
        assert_eq!(state.beams.total(), Some(usize::MAX));
        assert!(calls.lock().unwrap().is_empty());
    }
}
