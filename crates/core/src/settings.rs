//! Typed, defaulted, overridable configuration settings.
//!
//! Each diagnostics setting is a [`Setting`]: a named value with a declared
//! scope, type tag, default, and description. All textual parsing goes
//! through [`SettingKind::parse`] — individual call sites never re-implement
//! string-to-value conversion.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Setting name constants
// ---------------------------------------------------------------------------

/// Overall retrieval timeout in seconds for one API call.
pub const SETTING_TIMEOUT: &str = "diagnostics.retrieval.timeout";
/// Disk utilization fraction above which retrieval is refused.
pub const SETTING_DISABLE_THRESHOLD: &str = "diagnostics.disable.threshold";
/// Artifact age in seconds before it is considered for garbage collection.
pub const SETTING_FILE_AGE: &str = "diagnostics.max.fileage";
/// Interval between garbage collection sweeps, in seconds.
pub const SETTING_GC_INTERVAL: &str = "diagnostics.gc.interval";
/// Garbage collection on/off switch.
pub const SETTING_GC_ENABLED: &str = "diagnostics.gc.enabled";
/// Staging directory on the management host for retrieved bundles.
pub const SETTING_FILE_PATH: &str = "diagnostics.filepath";

// ---------------------------------------------------------------------------
// Caller override keys
// ---------------------------------------------------------------------------

// These are the per-request parameter names accepted by the admin API;
// each maps onto exactly one setting above.

pub const OVERRIDE_TIMEOUT: &str = "timeout";
pub const OVERRIDE_DISABLE_THRESHOLD: &str = "disablethreshold";
pub const OVERRIDE_FILE_AGE: &str = "fileage";
pub const OVERRIDE_GC_INTERVAL: &str = "intervalgc";
pub const OVERRIDE_GC_ENABLED: &str = "enabledgc";
pub const OVERRIDE_FILE_PATH: &str = "filepath";

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Configuration scope a setting (or a persisted row backing it) applies to.
///
/// When multiple rows back the same setting, the narrowest defined scope
/// wins at resolution time: Account > StoragePool > Cluster > Zone > Global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingScope {
    Global,
    Zone,
    Cluster,
    StoragePool,
    Account,
}

impl SettingScope {
    /// Precedence rank; higher wins during scope resolution.
    pub fn rank(self) -> u8 {
        match self {
            Self::Global => 0,
            Self::Zone => 1,
            Self::Cluster => 2,
            Self::StoragePool => 3,
            Self::Account => 4,
        }
    }

    /// Parse from the database `scope` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "global" => Ok(Self::Global),
            "zone" => Ok(Self::Zone),
            "cluster" => Ok(Self::Cluster),
            "storagepool" => Ok(Self::StoragePool),
            "account" => Ok(Self::Account),
            other => Err(CoreError::InvalidParameter {
                param: "scope".to_string(),
                reason: format!("unknown scope '{other}'"),
            }),
        }
    }

    /// Database name value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Zone => "zone",
            Self::Cluster => "cluster",
            Self::StoragePool => "storagepool",
            Self::Account => "account",
        }
    }
}

// ---------------------------------------------------------------------------
// Kind and value
// ---------------------------------------------------------------------------

/// Type tag for a setting. Determines the canonical textual parse rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Int64,
    Float64,
    Bool,
    Text,
    /// A duration expressed as a whole number of seconds.
    DurationSecs,
}

/// A parsed, typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Text(String),
}

impl SettingKind {
    /// Parse `raw` according to this kind's canonical textual rule.
    ///
    /// - `Int64` / `DurationSecs`: decimal integer.
    /// - `Float64`: standard floating point.
    /// - `Bool`: `true` / `false`, case-insensitive.
    /// - `Text`: any non-empty string.
    pub fn parse(self, raw: &str) -> Result<SettingValue, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidParameter {
                param: "value".to_string(),
                reason: "empty value".to_string(),
            });
        }
        match self {
            Self::Int64 | Self::DurationSecs => trimmed
                .parse::<i64>()
                .map(SettingValue::Int64)
                .map_err(|_| CoreError::InvalidParameter {
                    param: "value".to_string(),
                    reason: format!("'{trimmed}' is not a valid integer"),
                }),
            Self::Float64 => trimmed
                .parse::<f64>()
                .map(SettingValue::Float64)
                .map_err(|_| CoreError::InvalidParameter {
                    param: "value".to_string(),
                    reason: format!("'{trimmed}' is not a valid number"),
                }),
            Self::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Ok(SettingValue::Bool(true)),
                "false" => Ok(SettingValue::Bool(false)),
                _ => Err(CoreError::InvalidParameter {
                    param: "value".to_string(),
                    reason: format!("'{trimmed}' is not 'true' or 'false'"),
                }),
            },
            Self::Text => Ok(SettingValue::Text(trimmed.to_string())),
        }
    }
}

impl SettingValue {
    /// Canonical textual form, round-trippable through [`SettingKind::parse`].
    pub fn canonical(&self) -> String {
        match self {
            Self::Int64(v) => v.to_string(),
            Self::Float64(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(v) => Some(*v),
            Self::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Setting
// ---------------------------------------------------------------------------

/// A single named, typed, defaulted, overridable configuration value.
///
/// Invariants: `name` is unique within `scope`; `default_value` matches
/// `kind`. [`validate`](Self::validate) checks the latter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub scope: SettingScope,
    pub kind: SettingKind,
    pub default_value: SettingValue,
    pub description: String,
    pub mutable: bool,
}

impl Setting {
    /// Check that the default value is consistent with the declared kind.
    pub fn validate(&self) -> Result<(), CoreError> {
        let ok = matches!(
            (self.kind, &self.default_value),
            (SettingKind::Int64, SettingValue::Int64(_))
                | (SettingKind::DurationSecs, SettingValue::Int64(_))
                | (SettingKind::Float64, SettingValue::Float64(_))
                | (SettingKind::Bool, SettingValue::Bool(_))
                | (SettingKind::Text, SettingValue::Text(_))
        );
        if ok {
            Ok(())
        } else {
            Err(CoreError::Internal(format!(
                "setting '{}' declares kind {:?} but defaults to {:?}",
                self.name, self.kind, self.default_value
            )))
        }
    }
}

/// The built-in diagnostics setting set with its shipped defaults.
///
/// Persisted configuration rows may override these defaults per scope;
/// the overlay happens in [`crate::query`].
pub fn builtin_settings() -> Vec<Setting> {
    vec![
        Setting {
            name: SETTING_TIMEOUT.to_string(),
            scope: SettingScope::Global,
            kind: SettingKind::DurationSecs,
            default_value: SettingValue::Int64(3600),
            description: "The timeout setting in seconds for the overall retrieval call"
                .to_string(),
            mutable: true,
        },
        Setting {
            name: SETTING_DISABLE_THRESHOLD.to_string(),
            scope: SettingScope::Global,
            kind: SettingKind::Float64,
            default_value: SettingValue::Float64(0.95),
            description: "The fraction of disk space used above which retrieval calls fail"
                .to_string(),
            mutable: true,
        },
        Setting {
            name: SETTING_FILE_AGE.to_string(),
            scope: SettingScope::Global,
            kind: SettingKind::DurationSecs,
            default_value: SettingValue::Int64(86_400),
            description: "The diagnostics file age in seconds before considered for garbage \
                          collection"
                .to_string(),
            mutable: true,
        },
        Setting {
            name: SETTING_GC_INTERVAL.to_string(),
            scope: SettingScope::Global,
            kind: SettingKind::DurationSecs,
            default_value: SettingValue::Int64(86_400),
            description: "The interval between garbage collection executions in seconds"
                .to_string(),
            mutable: true,
        },
        Setting {
            name: SETTING_GC_ENABLED.to_string(),
            scope: SettingScope::Global,
            kind: SettingKind::Bool,
            default_value: SettingValue::Bool(true),
            description: "Garbage collection on/off switch".to_string(),
            mutable: true,
        },
        Setting {
            name: SETTING_FILE_PATH.to_string(),
            scope: SettingScope::Global,
            kind: SettingKind::Text,
            default_value: SettingValue::Text("/tmp".to_string()),
            description: "File path to use on the management server for all temporary data"
                .to_string(),
            mutable: true,
        },
    ]
}

/// Find a setting by name in a resolved setting slice.
pub fn find_setting<'a>(settings: &'a [Setting], name: &str) -> Option<&'a Setting> {
    settings.iter().find(|s| s.name == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
