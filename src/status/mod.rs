use crate::config::types::{StatusConfig, StoreKeys};
use crate::mjd::mjd;
use crate::store::MonitorStore;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome code published after every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GulpStatus {
    Ok,
    Incomplete,
    /// Sources disagreed and the endpoints were rebuilt.
    Divergent,
    Overflow,
}

impl GulpStatus {
    pub fn code(self) -> u8 {
        match self {
            GulpStatus::Ok => 0,
            GulpStatus::Incomplete => 1,
            GulpStatus::Divergent => 2,
            GulpStatus::Overflow => 3,
        }
    }
}

impl fmt::Display for GulpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GulpStatus::Ok => "ok",
            GulpStatus::Incomplete => "incomplete gulp",
            GulpStatus::Divergent => "divergent gulp",
            GulpStatus::Overflow => "processing overflow",
        };
        write!(f, "{} ({})", label, self.code())
    }
}

/// Publishes liveness and per-cycle outcome codes. Write failures are logged
/// and otherwise ignored.
pub struct StatusReporter {
    store: Arc<dyn MonitorStore>,
    keys: StoreKeys,
    process_id: u32,
    cadence_seconds: u64,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn MonitorStore>, keys: StoreKeys, config: &StatusConfig) -> Self {
        Self {
            store,
            keys,
            process_id: config.process_id,
            cadence_seconds: config.cadence_seconds,
        }
    }

    pub fn status_key(&self) -> String {
        format!("{}/{}", self.keys.status_prefix.trim_end_matches('/'), self.process_id)
    }

    /// Service liveness, written once per cycle.
    pub async fn heartbeat(&self, now: DateTime<Utc>) {
        let value = json!({ "cadence_seconds": self.cadence_seconds, "time_mjd": mjd(now) });
        self.put(&self.keys.service_key, value).await;
    }

    /// Liveness scoped to a gulp having arrived intact.
    pub async fn gulp_received(&self, now: DateTime<Utc>) {
        let value = json!({ "cadence_seconds": self.cadence_seconds, "time_mjd": mjd(now) });
        self.put(&self.keys.gulp_key, value).await;
    }

    pub async fn report(&self, status: GulpStatus, now: DateTime<Utc>) {
        let value = json!({
            "gulp_status": status.code(),
            "process_id": self.process_id,
            "time_mjd": mjd(now),
        });
        if status != GulpStatus::Ok {
            debug!(status = %status, "Reporting cycle outcome");
        }
        self.put(&self.status_key(), value).await;
    }

    async fn put(&self, key: &str, value: serde_json::Value) {
        if let Err(e) = self.store.put_dict(key, value).await {
            warn!(key = %key, error = %e, "Could not write status to store");
        }
    }
}
