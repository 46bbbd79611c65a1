// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lookup helpers shared by [`super::MaterializedState`]'s accessors.

use std::collections::HashMap;

/// Finds a value by exact key, or by unique key prefix if no exact match
/// exists (so a caller can address an analysis or task by a shortened id
/// the way `git` accepts a commit-hash prefix). Ambiguous prefixes match
/// nothing, deliberately: returning an arbitrary match would be worse than
/// returning none.
pub(super) fn find_by_prefix<'a, V>(map: &'a HashMap<String, V>, id: &str) -> Option<&'a V> {
    if let Some(exact) = map.get(id) {
        return Some(exact);
    }
    let mut matches = map.iter().filter(|(key, _)| key.starts_with(id));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_prefix_search() {
        let mut map = HashMap::new();
        map.insert("20260101-abcdef".to_string(), 1);
        map.insert("20260101-abcdeg".to_string(), 2);
        assert_eq!(find_by_prefix(&map, "20260101-abcdef"), Some(&1));
    }

    #[test]
    fn unique_prefix_resolves() {
        let mut map = HashMap::new();
        map.insert("20260101-abcdef".to_string(), 1);
        assert_eq!(find_by_prefix(&map, "20260101-abc"), Some(&1));
    }

    #[test]
    fn ambiguous_prefix_resolves_to_nothing() {
        let mut map = HashMap::new();
        map.insert("20260101-abcdef".to_string(), 1);
        map.insert("20260101-abcxyz".to_string(), 2);
        assert_eq!(find_by_prefix(&map, "20260101-abc"), None);
    }
}
