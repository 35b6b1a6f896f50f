use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// One upstream detector process, reached through its own listening endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_bind_retry", with = "humantime_serde")]
    pub bind_retry: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            bind_retry: default_bind_retry(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    100_000_000
}

fn default_bind_retry() -> Duration {
    Duration::from_secs(1)
}

/// Static filtering thresholds. `min_snr` and `min_snr_wide` may be overridden
/// at runtime from the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub min_snr: f64,
    pub min_snr_wide: f64,
    pub wide_ibox: u32,
    pub max_ibox: u32,
    pub min_snr_t2out: f64,
    pub max_ncl: usize,
    pub max_ctb0: usize,
    pub max_ctb: usize,
    #[serde(default = "default_min_dm")]
    pub min_dm: f64,
    #[serde(default = "default_gal_dm_factor")]
    pub gal_dm_factor: f64,
    #[serde(default = "default_use_gal_dm")]
    pub use_gal_dm: bool,
}

fn default_min_dm() -> f64 {
    50.0
}

fn default_gal_dm_factor() -> f64 {
    0.75
}

fn default_use_gal_dm() -> bool {
    true
}

/// Friends-of-friends linking lengths, one per clustering feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_link_itime")]
    pub link_itime: f64,
    #[serde(default = "default_link_idm")]
    pub link_idm: f64,
    #[serde(default = "default_link_ibox")]
    pub link_ibox: f64,
    #[serde(default = "default_link_ibeam")]
    pub link_ibeam: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            link_itime: default_link_itime(),
            link_idm: default_link_idm(),
            link_ibox: default_link_ibox(),
            link_ibeam: default_link_ibeam(),
        }
    }
}

fn default_link_itime() -> f64 {
    250.0
}

fn default_link_idm() -> f64 {
    50.0
}

fn default_link_ibox() -> f64 {
    32.0
}

fn default_link_ibeam() -> f64 {
    8.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    #[serde(default = "default_wide_ibox_threshold")]
    pub wide_ibox_threshold: u32,
    #[serde(default = "default_saturation_ibox")]
    pub saturation_ibox: u32,
    #[serde(default = "default_saturation_fraction")]
    pub saturation_fraction: f64,
    #[serde(default = "default_saturation_min_peaks")]
    pub saturation_min_peaks: usize,
    #[serde(default = "default_storm_beam_threshold")]
    pub storm_beam_threshold: usize,
    #[serde(default = "default_storm_max_frac_wide")]
    pub storm_max_frac_wide: f64,
    pub source_catalog: Option<PathBuf>,
    #[serde(default = "default_catalog_dm_tolerance")]
    pub catalog_dm_tolerance: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce: default_debounce(),
            window_capacity: default_window_capacity(),
            wide_ibox_threshold: default_wide_ibox_threshold(),
            saturation_ibox: default_saturation_ibox(),
            saturation_fraction: default_saturation_fraction(),
            saturation_min_peaks: default_saturation_min_peaks(),
            storm_beam_threshold: default_storm_beam_threshold(),
            storm_max_frac_wide: default_storm_max_frac_wide(),
            source_catalog: None,
            catalog_dm_tolerance: default_catalog_dm_tolerance(),
        }
    }
}

fn default_debounce() -> Duration {
    Duration::from_secs(60)
}

fn default_window_capacity() -> usize {
    10
}

fn default_wide_ibox_threshold() -> u32 {
    32
}

fn default_saturation_ibox() -> u32 {
    64
}

fn default_saturation_fraction() -> f64 {
    0.85
}

fn default_saturation_min_peaks() -> usize {
    15
}

fn default_storm_beam_threshold() -> usize {
    100
}

fn default_storm_max_frac_wide() -> f64 {
    0.8
}

fn default_catalog_dm_tolerance() -> f64 {
    5.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for per-batch, day-keyed and aggregate files. Nothing is
    /// written when unset.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "type", default = "default_store_type")]
    pub store_type: StoreType,
    pub endpoint: Option<String>,
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub keys: StoreKeys,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            endpoint: None,
            timeout: default_store_timeout(),
            keys: StoreKeys::default(),
        }
    }
}

fn default_store_type() -> StoreType {
    StoreType::Memory
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Memory,
    Etcd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreKeys {
    pub config_key: String,
    pub gal_dm_key: String,
    pub service_key: String,
    pub gulp_key: String,
    pub status_prefix: String,
    pub trigger_key: String,
    pub last_name_key: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            config_key: "/cnf/t2".to_string(),
            gal_dm_key: "/mon/array/gal_dm".to_string(),
            service_key: "/mon/service/T2service".to_string(),
            gulp_key: "/mon/service/T2gulp".to_string(),
            status_prefix: "/mon/T2".to_string(),
            trigger_key: "/cmd/corr/0".to_string(),
            last_name_key: "/mon/T2/lastname".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_process_id")]
    pub process_id: u32,
    #[serde(default = "default_cadence_seconds")]
    pub cadence_seconds: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            process_id: default_process_id(),
            cadence_seconds: default_cadence_seconds(),
        }
    }
}

fn default_process_id() -> u32 {
    1
}

fn default_cadence_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub errors: ErrorConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorConfig {
    #[serde(default)]
    pub on_parse_error: ParseErrorStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseErrorStrategy {
    #[default]
    Drop,
    Abort,
}
