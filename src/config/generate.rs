pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# GULPD CONFIGURATION
# =============================================================================
# gulpd receives candidate gulps from every detector process, checks that all
# of them refer to the same gulp, decides whether to trigger, and keeps a
# rolling record of clustered candidates.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/gulpd/config.yml
#   3. /etc/gulpd/config.yml
#
# Values may reference environment variables with $env{NAME}.

# =============================================================================
# SOURCES
# =============================================================================
# One listening endpoint per detector process. Each cycle accepts exactly one
# connection per endpoint. Payload: first line is the gulp number, remaining
# lines are candidate rows; the sender closes the connection when done.

sources:
  - id: corr17
    listen: 0.0.0.0:5017
  - id: corr18
    listen: 0.0.0.0:5018
  - id: corr19
    listen: 0.0.0.0:5019
  - id: corr20
    listen: 0.0.0.0:5020

sync:
  # Upper bound on bytes read from a single connection
  max_payload_bytes: 100000000
  # Wait before retrying endpoints that failed to bind
  bind_retry: 1s

# =============================================================================
# THRESHOLDS
# =============================================================================
# Static defaults. min_snr, min_snr_wide and use_gal_dm are read from the
# store's config key first and fall back to these values.

thresholds:
  min_snr: 8.5
  min_snr_wide: 9.5
  wide_ibox: 17
  max_ibox: 33
  min_snr_t2out: 8.0
  max_ncl: 10
  max_ctb0: 8
  max_ctb: 10
  min_dm: 50.0
  gal_dm_factor: 0.75
  use_gal_dm: true

clustering:
  link_itime: 250.0
  link_idm: 50.0
  link_ibox: 32.0
  link_ibeam: 8.0

# =============================================================================
# TRIGGER
# =============================================================================

trigger:
  # Send trigger commands to the store. When false candidates are still named.
  enabled: false
  # Minimum time between two triggers
  debounce: 60s
  # Number of recent gulps whose beam counts are summed for storm detection
  window_capacity: 10
  wide_ibox_threshold: 32
  saturation_ibox: 64
  saturation_fraction: 0.85
  saturation_min_peaks: 15
  storm_beam_threshold: 100
  storm_max_frac_wide: 0.8
  # Lines of "name ibeam dm" for known persistent sources
  # source_catalog: ~/t2/source_catalog.txt
  catalog_dm_tolerance: 5.0

output:
  root: $env{HOME}/t2/

# =============================================================================
# STORE
# =============================================================================
# 'memory' keeps everything in process (no dynamic thresholds, no monitoring).
# 'etcd' talks to the etcd v3 JSON gateway.

store:
  type: memory
  # endpoint: http://etcdv3service:2379
  timeout: 2s

status:
  process_id: 1
  cadence_seconds: 60

pipeline:
  errors:
    # 'drop' skips malformed candidate rows, 'abort' abandons the gulp
    on_parse_error: drop
"#
    .to_string()
}
