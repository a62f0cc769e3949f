//! Final file-set computation for one retrieval request.

use std::collections::HashSet;

/// Union of role defaults and caller-supplied extras.
///
/// Defaults keep their registration order, extras follow in caller-given
/// order, and only the first occurrence of each file survives. Empty
/// entries are dropped.
pub fn merge_file_set(defaults: &[String], extras: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(defaults.len() + extras.len());
    let mut merged = Vec::with_capacity(defaults.len() + extras.len());

    for file in defaults.iter().chain(extras.iter()) {
        let trimmed = file.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed) {
            merged.push(trimmed.to_string());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_then_extras_in_order() {
        let merged = merge_file_set(
            &files(&["haproxy.log", "haproxy.cfg"]),
            &files(&["keepalived.log"]),
        );
        assert_eq!(merged, files(&["haproxy.log", "haproxy.cfg", "keepalived.log"]));
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let merged = merge_file_set(
            &files(&["a.log", "b.log"]),
            &files(&["b.log", "c.log", "a.log"]),
        );
        assert_eq!(merged, files(&["a.log", "b.log", "c.log"]));
    }

    #[test]
    fn empty_entries_dropped() {
        let merged = merge_file_set(&files(&["a.log", "", "  "]), &files(&["", "b.log"]));
        assert_eq!(merged, files(&["a.log", "b.log"]));
    }

    #[test]
    fn no_defaults_yields_extras_only() {
        let merged = merge_file_set(&[], &files(&["x.log"]));
        assert_eq!(merged, files(&["x.log"]));
    }

    #[test]
    fn both_empty_yields_empty() {
        assert!(merge_file_set(&[], &[]).is_empty());
    }
}
