use rayon::prelude::*;
use tracing::{trace, warn};

use crate::columns::ColumnSpec;

/// Active filter text per column key, in the order the filters were first
/// set. Keys with empty text are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    values: Vec<(String, String)>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new state with `text` as filter for `key`. Changing an
    /// existing filter keeps its position, an empty text removes it.
    pub fn with_filter(&self, key: &str, text: &str) -> Self {
        let mut values = self.values.clone();
        let position = values.iter().position(|(k, _)| k == key);
        match (position, text.is_empty()) {
            (Some(idx), true) => {
                values.remove(idx);
            }
            (Some(idx), false) => values[idx].1 = text.to_string(),
            (None, true) => {}
            (None, false) => values.push((key.to_string(), text.to_string())),
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Indices of the matching rows, in input order.
    pub rows: Vec<usize>,
    /// Per column: how many rows reached that column's filter. Columns
    /// without an active filter see the fully filtered rows.
    pub pre_filtered: Vec<usize>,
}

pub fn matches_filter<R>(spec: &ColumnSpec<R>, row: &R, needle: &str, case_sensitive: bool) -> bool {
    let text = spec.value(row).to_string();
    if case_sensitive {
        text.contains(needle)
    } else {
        text.to_lowercase().contains(needle)
    }
}

/// Keeps the rows of `mask` matching every active filter. Filters run in the
/// order they were set, each one on the rows left by the filters before it.
pub fn apply_filters<R: Sync>(
    rows: &[R],
    mask: &[usize],
    specs: &[ColumnSpec<R>],
    state: &FilterState,
    case_sensitive: bool,
) -> FilterOutcome {
    let mut current: Vec<usize> = mask.to_vec();
    let mut reached: Vec<Option<usize>> = vec![None; specs.len()];

    for (key, term) in state.iter() {
        let Some(cidx) = specs.iter().position(|spec| spec.key == key) else {
            warn!("Ignoring filter on unknown column \"{key}\"");
            continue;
        };
        let spec = &specs[cidx];
        if !spec.filterable {
            warn!("Ignoring filter on non filterable column \"{key}\"");
            continue;
        }
        let needle = if case_sensitive {
            term.to_string()
        } else {
            term.to_lowercase()
        };
        let before = current.len();
        reached[cidx] = Some(before);
        current = current
            .par_iter()
            .copied()
            .filter(|&idx| {
                rows.get(idx)
                    .is_some_and(|row| matches_filter(spec, row, &needle, case_sensitive))
            })
            .collect();
        trace!(
            "Filter {}=\"{}\" kept {} of {} rows",
            spec.key,
            term,
            current.len(),
            before
        );
    }

    let remaining = current.len();
    FilterOutcome {
        rows: current,
        pre_filtered: reached
            .into_iter()
            .map(|count| count.unwrap_or(remaining))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::fixtures::{item, item_columns, items};

    fn all(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn empty_state_keeps_every_row() {
        let rows = items();
        let outcome = apply_filters(&rows, &all(3), &item_columns(), &FilterState::new(), false);
        assert_eq!(outcome.rows, vec![0, 1, 2]);
        assert_eq!(outcome.pre_filtered, vec![3, 3, 3, 3]);
    }

    #[test]
    fn empty_text_removes_filter() {
        let state = FilterState::new().with_filter("title", "Y").with_filter("title", "");
        assert!(state.is_empty());
        assert_eq!(state, FilterState::new());
    }

    #[test]
    fn with_filter_does_not_touch_original() {
        let original = FilterState::new().with_filter("group", "red");
        let changed = original.with_filter("title", "X");
        assert_eq!(original.len(), 1);
        assert_eq!(changed.len(), 2);
        assert_eq!(changed.get("group"), Some("red"));
    }

    #[test]
    fn substring_match_is_case_insensitive_by_default() {
        let rows = vec![item("A", "Wildfire", "g", 0.0), item("B", "Storm", "g", 0.0)];
        let state = FilterState::new().with_filter("title", "FIRE");
        let specs = item_columns();

        let insensitive = apply_filters(&rows, &all(2), &specs, &state, false);
        assert_eq!(insensitive.rows, vec![0]);

        let sensitive = apply_filters(&rows, &all(2), &specs, &state, true);
        assert!(sensitive.rows.is_empty());
    }

    #[test]
    fn numbers_are_coerced_before_matching() {
        let rows = vec![item("A", "a", "g", 12.0), item("B", "b", "g", 3.5)];
        let state = FilterState::new().with_filter("score", "12");
        let outcome = apply_filters(&rows, &all(2), &item_columns(), &state, false);
        assert_eq!(outcome.rows, vec![0]);

        let state = FilterState::new().with_filter("score", ".5");
        let outcome = apply_filters(&rows, &all(2), &item_columns(), &state, false);
        assert_eq!(outcome.rows, vec![1]);
    }

    #[test]
    fn filters_are_conjunctive() {
        let rows = vec![
            item("A", "big fire", "red", 0.0),
            item("B", "big storm", "red", 0.0),
            item("C", "big fire", "blue", 0.0),
            item("D", "small fire", "red", 0.0),
        ];
        let specs = item_columns();
        let title = FilterState::new().with_filter("title", "fire");
        let group = FilterState::new().with_filter("group", "red");
        let both = title.with_filter("group", "red");

        let by_title = apply_filters(&rows, &all(4), &specs, &title, false).rows;
        let by_group = apply_filters(&rows, &all(4), &specs, &group, false).rows;
        let by_both = apply_filters(&rows, &all(4), &specs, &both, false).rows;

        let expected: Vec<usize> = (0..4)
            .filter(|i| by_title.contains(i) && by_group.contains(i))
            .collect();
        assert_eq!(by_both, expected);
        assert_eq!(by_both, vec![0, 3]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let rows = vec![
            item("A", "fire", "red", 1.0),
            item("B", "storm", "red", 2.0),
            item("C", "wildfire", "blue", 3.0),
        ];
        let specs = item_columns();
        let state = FilterState::new().with_filter("title", "fire");

        let once = apply_filters(&rows, &all(3), &specs, &state, false);
        let twice = apply_filters(&rows, &once.rows, &specs, &state, false);
        assert_eq!(once.rows, twice.rows);
    }

    #[test]
    fn pre_filtered_counts_follow_filter_order() {
        let rows = vec![
            item("A", "fire", "red", 1.0),
            item("B", "storm", "red", 2.0),
            item("C", "fire", "blue", 3.0),
        ];
        let specs = item_columns();
        let title_first = FilterState::new()
            .with_filter("title", "fire")
            .with_filter("group", "red");
        let outcome = apply_filters(&rows, &all(3), &specs, &title_first, false);
        // id, title, group, score; unfiltered columns see the final rows
        assert_eq!(outcome.pre_filtered, vec![1, 3, 2, 1]);
        assert_eq!(outcome.rows, vec![0]);

        let group_first = FilterState::new()
            .with_filter("group", "red")
            .with_filter("title", "fire");
        let outcome = apply_filters(&rows, &all(3), &specs, &group_first, false);
        assert_eq!(outcome.pre_filtered, vec![1, 2, 3, 1]);
        assert_eq!(outcome.rows, vec![0]);
    }

    #[test]
    fn changing_a_filter_keeps_its_position() {
        let state = FilterState::new()
            .with_filter("title", "fire")
            .with_filter("group", "red")
            .with_filter("title", "storm");
        let keys: Vec<&str> = state.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "group"]);
        assert_eq!(state.get("title"), Some("storm"));
    }

    #[test]
    fn ignores_unknown_and_non_filterable_columns() {
        let rows = items();
        let state = FilterState::new()
            .with_filter("id", "A")
            .with_filter("nope", "x");
        let outcome = apply_filters(&rows, &all(3), &item_columns(), &state, false);
        assert_eq!(outcome.rows, vec![0, 1, 2]);
    }

    #[test]
    fn respects_input_mask_order() {
        let rows = items();
        let state = FilterState::new().with_filter("group", "red");
        let outcome = apply_filters(&rows, &[2, 1, 0], &item_columns(), &state, false);
        assert_eq!(outcome.rows, vec![2, 0]);
    }
}
