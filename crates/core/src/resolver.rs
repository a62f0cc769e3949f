//! Per-request configuration resolution.
//!
//! [`resolve`] merges raw caller overrides with the registered settings and
//! produces a fully-typed [`EffectiveConfig`] for one retrieval call.
//! Unparseable optional overrides degrade to the setting's default (logged,
//! never fatal); values that parse but violate a declared range fail the
//! call with `InvalidParameter`.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::settings::{
    find_setting, Setting, SettingValue, OVERRIDE_DISABLE_THRESHOLD, OVERRIDE_FILE_AGE,
    OVERRIDE_FILE_PATH, OVERRIDE_GC_ENABLED, OVERRIDE_GC_INTERVAL, OVERRIDE_TIMEOUT,
    SETTING_DISABLE_THRESHOLD, SETTING_FILE_AGE, SETTING_FILE_PATH, SETTING_GC_ENABLED,
    SETTING_GC_INTERVAL, SETTING_TIMEOUT,
};

/// Fully resolved, typed parameter set governing one retrieval call.
///
/// Created fresh per request and never persisted — persisted rows hold
/// settings, not effective configs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    /// Overall retrieval timeout, seconds. Always > 0.
    pub timeout_secs: i64,
    /// Disk utilization fraction above which retrieval fails fast. In (0, 1].
    pub disk_disable_threshold: f64,
    /// Artifact age before GC eligibility, seconds. >= 0.
    pub file_age_secs: i64,
    /// Interval between GC sweeps, seconds. >= 0.
    pub gc_interval_secs: i64,
    /// GC on/off switch.
    pub gc_enabled: bool,
    /// Staging directory for retrieved bundles. Non-empty, absolute.
    pub file_path: String,
}

/// Resolve raw caller overrides against the registered setting set.
///
/// For each recognized override key that is present and non-empty, the
/// value is parsed with the setting's declared kind. A parse failure
/// substitutes the setting's default and continues. Unknown keys are
/// ignored. A setting missing from `settings` entirely fails with
/// `MissingParameter`; there is no partially-resolved state.
pub fn resolve(
    overrides: &HashMap<String, String>,
    settings: &[Setting],
) -> Result<EffectiveConfig, CoreError> {
    let timeout = effective_value(overrides, OVERRIDE_TIMEOUT, SETTING_TIMEOUT, settings)?;
    let threshold = effective_value(
        overrides,
        OVERRIDE_DISABLE_THRESHOLD,
        SETTING_DISABLE_THRESHOLD,
        settings,
    )?;
    let file_age = effective_value(overrides, OVERRIDE_FILE_AGE, SETTING_FILE_AGE, settings)?;
    let gc_interval =
        effective_value(overrides, OVERRIDE_GC_INTERVAL, SETTING_GC_INTERVAL, settings)?;
    let gc_enabled = effective_value(overrides, OVERRIDE_GC_ENABLED, SETTING_GC_ENABLED, settings)?;
    let file_path = effective_value(overrides, OVERRIDE_FILE_PATH, SETTING_FILE_PATH, settings)?;

    let config = EffectiveConfig {
        timeout_secs: expect_i64(timeout, SETTING_TIMEOUT)?,
        disk_disable_threshold: expect_f64(threshold, SETTING_DISABLE_THRESHOLD)?,
        file_age_secs: expect_i64(file_age, SETTING_FILE_AGE)?,
        gc_interval_secs: expect_i64(gc_interval, SETTING_GC_INTERVAL)?,
        gc_enabled: expect_bool(gc_enabled, SETTING_GC_ENABLED)?,
        file_path: expect_text(file_path, SETTING_FILE_PATH)?,
    };

    validate_ranges(&config)?;
    Ok(config)
}

/// Resolve one field: override if present and parseable, default otherwise.
fn effective_value(
    overrides: &HashMap<String, String>,
    override_key: &str,
    setting_name: &str,
    settings: &[Setting],
) -> Result<SettingValue, CoreError> {
    let setting = find_setting(settings, setting_name).ok_or_else(|| {
        CoreError::MissingParameter {
            param: setting_name.to_string(),
        }
    })?;

    let raw = overrides
        .get(override_key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty());

    match raw {
        None => Ok(setting.default_value.clone()),
        Some(raw) => match setting.kind.parse(raw) {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(
                    override_key,
                    setting = setting_name,
                    raw,
                    default = %setting.default_value.canonical(),
                    "Unparseable override, falling back to default"
                );
                Ok(setting.default_value.clone())
            }
        },
    }
}

/// Range and shape checks on the assembled config.
///
/// These catch values that parsed cleanly but are affirmatively wrong:
/// a non-positive timeout, a threshold outside (0, 1], negative ages, or a
/// relative staging path.
fn validate_ranges(config: &EffectiveConfig) -> Result<(), CoreError> {
    if config.timeout_secs <= 0 {
        return Err(invalid(
            OVERRIDE_TIMEOUT,
            format!("timeout must be positive, got {}", config.timeout_secs),
        ));
    }
    // Finite-ness is checked explicitly: "NaN" and "inf" parse as f64.
    if !(config.disk_disable_threshold.is_finite()
        && config.disk_disable_threshold > 0.0
        && config.disk_disable_threshold <= 1.0)
    {
        return Err(invalid(
            OVERRIDE_DISABLE_THRESHOLD,
            format!(
                "threshold must be in (0, 1], got {}",
                config.disk_disable_threshold
            ),
        ));
    }
    if config.file_age_secs < 0 {
        return Err(invalid(
            OVERRIDE_FILE_AGE,
            format!("file age must not be negative, got {}", config.file_age_secs),
        ));
    }
    if config.gc_interval_secs < 0 {
        return Err(invalid(
            OVERRIDE_GC_INTERVAL,
            format!(
                "GC interval must not be negative, got {}",
                config.gc_interval_secs
            ),
        ));
    }
    if !config.file_path.starts_with('/') {
        return Err(invalid(
            OVERRIDE_FILE_PATH,
            format!("file path must be absolute, got '{}'", config.file_path),
        ));
    }
    Ok(())
}

fn invalid(param: &str, reason: String) -> CoreError {
    CoreError::InvalidParameter {
        param: param.to_string(),
        reason,
    }
}

fn expect_i64(value: SettingValue, name: &str) -> Result<i64, CoreError> {
    value
        .as_i64()
        .ok_or_else(|| CoreError::Internal(format!("setting '{name}' did not resolve to an integer")))
}

fn expect_f64(value: SettingValue, name: &str) -> Result<f64, CoreError> {
    value
        .as_f64()
        .ok_or_else(|| CoreError::Internal(format!("setting '{name}' did not resolve to a number")))
}

fn expect_bool(value: SettingValue, name: &str) -> Result<bool, CoreError> {
    value
        .as_bool()
        .ok_or_else(|| CoreError::Internal(format!("setting '{name}' did not resolve to a bool")))
}

fn expect_text(value: SettingValue, name: &str) -> Result<String, CoreError> {
    value
        .as_text()
        .map(|s| s.to_string())
        .ok_or_else(|| CoreError::Internal(format!("setting '{name}' did not resolve to text")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
