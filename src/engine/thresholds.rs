use crate::candidate::filter::FilterThresholds;
use crate::config::types::{StoreKeys, ThresholdConfig};
use crate::store::MonitorStore;
use serde_json::Value;
use tracing::debug;

/// Thresholds in effect for one gulp.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub filter: FilterThresholds,
    pub min_snr_t2out: f64,
}

/// Read the dynamic thresholds from the store, falling back to the static
/// config for anything that cannot be retrieved.
pub async fn resolve(store: &dyn MonitorStore, keys: &StoreKeys, config: &ThresholdConfig) -> Thresholds {
    let dynamic = store.get_dict(&keys.config_key).await;
    if let Err(e) = &dynamic {
        debug!(key = %keys.config_key, error = %e, "Using static thresholds");
    }
    let dynamic = dynamic.ok();

    let min_snr = dynamic
        .as_ref()
        .and_then(|v| number(v, "min_snr"))
        .unwrap_or(config.min_snr);
    let min_snr_wide = dynamic
        .as_ref()
        .and_then(|v| number(v, "min_snr_wide"))
        .unwrap_or(config.min_snr_wide);
    let use_gal_dm = dynamic
        .as_ref()
        .and_then(|v| flag(v, "use_gal_dm"))
        .unwrap_or(config.use_gal_dm);

    let min_dm = if use_gal_dm {
        let gal_dm = store
            .get_dict(&keys.gal_dm_key)
            .await
            .ok()
            .and_then(|v| number(&v, "gal_dm"));
        dm_floor(config.min_dm, config.gal_dm_factor, gal_dm)
    } else {
        config.min_dm
    };

    Thresholds {
        filter: FilterThresholds {
            min_snr,
            min_snr_wide,
            wide_ibox: config.wide_ibox,
            max_ibox: config.max_ibox,
            min_dm,
            max_ctb0: config.max_ctb0,
            max_ctb: config.max_ctb,
            max_ncl: config.max_ncl,
        },
        min_snr_t2out: config.min_snr_t2out,
    }
}

/// The larger of the fixed floor and a fraction of the Galactic DM.
pub fn dm_floor(min_dm: f64, factor: f64, gal_dm: Option<f64>) -> f64 {
    match gal_dm {
        Some(dm) if dm.is_finite() => min_dm.max(dm * factor),
        _ => min_dm,
    }
}

fn number(value: &Value, field: &str) -> Option<f64> {
    value.get(field).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn flag(value: &Value, field: &str) -> Option<bool> {
    match value.get(field)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}
