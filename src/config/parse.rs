use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config_str(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    Ok(config)
}

/// Parse, expand and validate a config from its YAML text.
pub fn parse_config_str(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);

    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).expect("env var pattern is valid");
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    if let Some(root) = &config.output.root {
        config.output.root = Some(expand_tilde(root));
    }
    if let Some(catalog) = &config.trigger.source_catalog {
        config.trigger.source_catalog = Some(expand_tilde(catalog));
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_sources(&config.sources, &mut errors);
    validate_thresholds(&config.thresholds, &mut errors);
    validate_trigger(&config.trigger, &mut errors);
    validate_store(&config.store, &mut errors);

    if config.sync.max_payload_bytes == 0 {
        errors.push("sync.max_payload_bytes must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_sources(sources: &[SourceConfig], errors: &mut Vec<String>) {
    if sources.is_empty() {
        errors.push("config must list at least one source under 'sources'".to_string());
    }

    let mut ids = HashSet::new();
    let mut addrs = HashSet::new();
    for (i, source) in sources.iter().enumerate() {
        if source.id.is_empty() {
            errors.push(format!("sources[{}]: source ID cannot be empty", i));
        } else if !ids.insert(&source.id) {
            errors.push(format!("sources[{}]: duplicate source ID '{}'", i, source.id));
        }

        // Port 0 asks the OS for a free port, so only fixed ports can collide.
        if source.listen.port() != 0 && !addrs.insert(source.listen) {
            errors.push(format!(
                "sources[{}]: listen address {} is used by another source",
                i, source.listen
            ));
        }
    }
}

fn validate_thresholds(thresholds: &ThresholdConfig, errors: &mut Vec<String>) {
    for (name, value) in [
        ("min_snr", thresholds.min_snr),
        ("min_snr_wide", thresholds.min_snr_wide),
        ("min_snr_t2out", thresholds.min_snr_t2out),
        ("min_dm", thresholds.min_dm),
        ("gal_dm_factor", thresholds.gal_dm_factor),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(format!(
                "thresholds.{}: must be a finite non-negative number, got {}",
                name, value
            ));
        }
    }

    if thresholds.max_ncl == 0 {
        errors.push("thresholds.max_ncl must be at least 1".to_string());
    }
    if thresholds.wide_ibox > thresholds.max_ibox {
        errors.push(format!(
            "thresholds.wide_ibox ({}) cannot exceed thresholds.max_ibox ({})",
            thresholds.wide_ibox, thresholds.max_ibox
        ));
    }
}

fn validate_trigger(trigger: &TriggerConfig, errors: &mut Vec<String>) {
    if trigger.window_capacity == 0 {
        errors.push("trigger.window_capacity must be at least 1".to_string());
    }
    if !(0.0..=1.0).contains(&trigger.saturation_fraction) {
        errors.push(format!(
            "trigger.saturation_fraction must be within [0, 1], got {}",
            trigger.saturation_fraction
        ));
    }
    if !(0.0..=1.0).contains(&trigger.storm_max_frac_wide) {
        errors.push(format!(
            "trigger.storm_max_frac_wide must be within [0, 1], got {}",
            trigger.storm_max_frac_wide
        ));
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if store.store_type == StoreType::Etcd {
        match &store.endpoint {
            Some(endpoint) if !endpoint.is_empty() => {}
            _ => errors.push("store.endpoint is required when store.type is 'etcd'".to_string()),
        }
    }
}
