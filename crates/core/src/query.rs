//! Scope overlay and predicate filtering over the setting set.
//!
//! Persisted configuration rows are loaded by the db layer; the functions
//! here are pure. [`overlay_settings`] applies narrowest-scope-wins
//! resolution to produce effective defaults, [`resolve_settings`] builds
//! the queryable view, and [`find_settings`] answers conjunctive equality
//! queries with stable pagination.

use std::collections::HashMap;

use serde::Serialize;

use crate::settings::{Setting, SettingScope};

/// Default page size for configuration queries.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Hard cap on page size.
pub const MAX_PAGE_SIZE: i64 = 500;

/// Clamp a caller-supplied limit into `1..=max`, defaulting when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Clamp a caller-supplied offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// A persisted configuration row as seen by the overlay (a projection of
/// the db layer's entity; the db crate converts into this).
#[derive(Debug, Clone)]
pub struct PersistedRow {
    pub name: String,
    pub value: String,
    pub scope: SettingScope,
    pub scope_id: Option<i64>,
}

/// One setting with both its raw persisted value and its effective
/// (scope-resolved) value, which may differ from the shipped default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSetting {
    pub name: String,
    /// Scope of the winning row, or the setting's declared scope when no
    /// row overrides it.
    pub scope: SettingScope,
    /// Raw value of the winning persisted row, if any.
    pub persisted_value: Option<String>,
    /// Canonical textual form of the value actually in effect.
    pub effective_value: String,
    pub description: String,
}

/// The winning row for a setting: the one with the narrowest scope.
fn winning_row<'a>(rows: &'a [PersistedRow], name: &str) -> Option<&'a PersistedRow> {
    rows.iter()
        .filter(|row| row.name == name)
        .max_by_key(|row| row.scope.rank())
}

/// Apply persisted rows onto the built-in settings, producing the setting
/// set whose defaults reflect stored configuration.
///
/// A row whose value does not parse as the setting's kind is ignored with
/// a warning — a bad stored row must not take the whole service down.
pub fn overlay_settings(settings: &[Setting], rows: &[PersistedRow]) -> Vec<Setting> {
    settings
        .iter()
        .map(|setting| {
            let mut effective = setting.clone();
            if let Some(row) = winning_row(rows, &setting.name) {
                match setting.kind.parse(&row.value) {
                    Ok(value) => {
                        effective.default_value = value;
                        effective.scope = row.scope;
                    }
                    Err(_) => {
                        tracing::warn!(
                            setting = %setting.name,
                            scope = row.scope.name(),
                            raw = %row.value,
                            "Stored configuration row does not parse, keeping default"
                        );
                    }
                }
            }
            effective
        })
        .collect()
}

/// Build the queryable resolved view of the setting set.
pub fn resolve_settings(settings: &[Setting], rows: &[PersistedRow]) -> Vec<ResolvedSetting> {
    settings
        .iter()
        .map(|setting| {
            let row = winning_row(rows, &setting.name);
            let effective_value = row
                .and_then(|r| setting.kind.parse(&r.value).ok())
                .unwrap_or_else(|| setting.default_value.clone())
                .canonical();
            ResolvedSetting {
                name: setting.name.clone(),
                scope: row.map(|r| r.scope).unwrap_or(setting.scope),
                persisted_value: row.map(|r| r.value.clone()),
                effective_value,
                description: setting.description.clone(),
            }
        })
        .collect()
}

/// Conjunctive equality filtering with stable name-ordered pagination.
///
/// `predicates` maps setting name to expected effective value; an absent
/// key applies no filter. Returns the requested page and the unpaginated
/// match count.
pub fn find_settings(
    resolved: &[ResolvedSetting],
    predicates: &HashMap<String, String>,
    offset: Option<i64>,
    limit: Option<i64>,
) -> (Vec<ResolvedSetting>, usize) {
    let mut matches: Vec<ResolvedSetting> = resolved
        .iter()
        .filter(|setting| {
            predicates
                .get(&setting.name)
                .map(|expected| setting.effective_value == *expected)
                .unwrap_or(true)
        })
        .cloned()
        .collect();

    // Predicates on names not present in the resolved set can never be
    // satisfied: a conjunctive filter over a missing column matches nothing.
    let all_predicate_names_known = predicates
        .keys()
        .all(|name| resolved.iter().any(|s| s.name == *name));
    if !all_predicate_names_known {
        return (Vec::new(), 0);
    }

    matches.sort_by(|a, b| a.name.cmp(&b.name));
    let total = matches.len();

    let offset = clamp_offset(offset) as usize;
    let limit = clamp_limit(limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE) as usize;
    let page = matches.into_iter().skip(offset).take(limit).collect();

    (page, total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{builtin_settings, SETTING_GC_ENABLED, SETTING_TIMEOUT};

    fn row(name: &str, value: &str, scope: SettingScope) -> PersistedRow {
        PersistedRow {
            name: name.to_string(),
            value: value.to_string(),
            scope,
            scope_id: None,
        }
    }

    // -- overlay_settings -----------------------------------------------------

    #[test]
    fn overlay_replaces_default_with_stored_value() {
        let settings = builtin_settings();
        let rows = vec![row(SETTING_TIMEOUT, "7200", SettingScope::Global)];
        let effective = overlay_settings(&settings, &rows);
        let timeout = effective.iter().find(|s| s.name == SETTING_TIMEOUT).unwrap();
        assert_eq!(timeout.default_value.as_i64(), Some(7200));
    }

    #[test]
    fn overlay_narrowest_scope_wins() {
        let settings = builtin_settings();
        let rows = vec![
            row(SETTING_TIMEOUT, "7200", SettingScope::Global),
            row(SETTING_TIMEOUT, "600", SettingScope::Account),
            row(SETTING_TIMEOUT, "1800", SettingScope::Zone),
        ];
        let effective = overlay_settings(&settings, &rows);
        let timeout = effective.iter().find(|s| s.name == SETTING_TIMEOUT).unwrap();
        assert_eq!(timeout.default_value.as_i64(), Some(600));
        assert_eq!(timeout.scope, SettingScope::Account);
    }

    #[test]
    fn overlay_ignores_unparseable_row() {
        let settings = builtin_settings();
        let rows = vec![row(SETTING_TIMEOUT, "not-a-number", SettingScope::Global)];
        let effective = overlay_settings(&settings, &rows);
        let timeout = effective.iter().find(|s| s.name == SETTING_TIMEOUT).unwrap();
        assert_eq!(timeout.default_value.as_i64(), Some(3600));
    }

    // -- resolve_settings -----------------------------------------------------

    #[test]
    fn resolved_view_carries_raw_and_effective() {
        let settings = builtin_settings();
        let rows = vec![row(SETTING_GC_ENABLED, "false", SettingScope::Zone)];
        let resolved = resolve_settings(&settings, &rows);
        let gc = resolved.iter().find(|s| s.name == SETTING_GC_ENABLED).unwrap();
        assert_eq!(gc.persisted_value.as_deref(), Some("false"));
        assert_eq!(gc.effective_value, "false");
        assert_eq!(gc.scope, SettingScope::Zone);
    }

    #[test]
    fn resolved_view_without_rows_uses_defaults() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let timeout = resolved.iter().find(|s| s.name == SETTING_TIMEOUT).unwrap();
        assert!(timeout.persisted_value.is_none());
        assert_eq!(timeout.effective_value, "3600");
    }

    // -- find_settings --------------------------------------------------------

    #[test]
    fn no_predicates_matches_everything() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let (page, total) = find_settings(&resolved, &HashMap::new(), None, None);
        assert_eq!(total, resolved.len());
        assert_eq!(page.len(), resolved.len());
    }

    #[test]
    fn equality_predicate_filters() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let predicates: HashMap<String, String> =
            [(SETTING_TIMEOUT.to_string(), "3600".to_string())].into();
        let (page, total) = find_settings(&resolved, &predicates, None, None);
        assert_eq!(total, resolved.len());
        assert!(page.iter().any(|s| s.name == SETTING_TIMEOUT));
    }

    #[test]
    fn non_matching_predicate_excludes_row() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let predicates: HashMap<String, String> =
            [(SETTING_TIMEOUT.to_string(), "999".to_string())].into();
        let (page, total) = find_settings(&resolved, &predicates, None, None);
        assert!(!page.iter().any(|s| s.name == SETTING_TIMEOUT));
        assert_eq!(total, resolved.len() - 1);
    }

    #[test]
    fn unknown_predicate_name_matches_nothing() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let predicates: HashMap<String, String> =
            [("no.such.setting".to_string(), "1".to_string())].into();
        let (page, total) = find_settings(&resolved, &predicates, None, None);
        assert!(page.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn predicates_match_effective_not_default() {
        let settings = builtin_settings();
        let rows = vec![row(SETTING_TIMEOUT, "7200", SettingScope::Account)];
        let resolved = resolve_settings(&settings, &rows);
        let predicates: HashMap<String, String> =
            [(SETTING_TIMEOUT.to_string(), "7200".to_string())].into();
        let (_, total) = find_settings(&resolved, &predicates, None, None);
        assert_eq!(total, resolved.len());
    }

    #[test]
    fn pagination_is_stable_and_counts_all_matches() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let (first, total_a) = find_settings(&resolved, &HashMap::new(), Some(0), Some(2));
        let (second, total_b) = find_settings(&resolved, &HashMap::new(), Some(2), Some(2));
        assert_eq!(total_a, resolved.len());
        assert_eq!(total_b, resolved.len());
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(first[1].name < second[0].name);
    }

    #[test]
    fn offset_past_end_yields_empty_page() {
        let resolved = resolve_settings(&builtin_settings(), &[]);
        let (page, total) = find_settings(&resolved, &HashMap::new(), Some(100), Some(10));
        assert!(page.is_empty());
        assert_eq!(total, resolved.len());
    }

    // -- clamp helpers --------------------------------------------------------

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(None, 50, 500), 50);
        assert_eq!(clamp_limit(Some(0), 50, 500), 1);
        assert_eq!(clamp_limit(Some(9999), 50, 500), 500);
    }

    #[test]
    fn clamp_offset_floors_at_zero() {
        assert_eq!(clamp_offset(Some(-5)), 0);
        assert_eq!(clamp_offset(Some(7)), 7);
        assert_eq!(clamp_offset(None), 0);
    }
}
