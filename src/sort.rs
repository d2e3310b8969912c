use std::fmt;
use tracing::{trace, warn};

use crate::columns::{CellValue, ColumnSpec, find_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ascending"),
            SortDirection::Descending => write!(f, "descending"),
        }
    }
}

/// At most one sorted column. `None` keeps the fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<(String, SortDirection)>,
}

impl SortState {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(key: &str, direction: SortDirection) -> Self {
        Self {
            active: Some((key.to_string(), direction)),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.active.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn direction(&self) -> Option<SortDirection> {
        self.active.as_ref().map(|(_, direction)| *direction)
    }

    /// Direction of `key` if it is the sorted column.
    pub fn direction_of(&self, key: &str) -> Option<SortDirection> {
        match &self.active {
            Some((k, direction)) if k == key => Some(*direction),
            _ => None,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.active.is_some()
    }

    /// Header click on `key`: unsorted -> ascending -> descending -> unsorted.
    /// Starting on a new column drops the sort of any other column.
    pub fn cycle<R>(&self, specs: &[ColumnSpec<R>], key: &str) -> Self {
        match find_column(specs, key) {
            Some(spec) if spec.sortable => {}
            _ => {
                trace!("Column \"{key}\" is not sortable, keeping sort state");
                return self.clone();
            }
        }
        match self.direction_of(key) {
            None => Self::by(key, SortDirection::Ascending),
            Some(SortDirection::Ascending) => Self::by(key, SortDirection::Descending),
            Some(SortDirection::Descending) => Self::unsorted(),
        }
    }
}

/// Orders the rows of `mask` by the sorted column. The sort is stable in both
/// directions: rows comparing equal keep their input order.
pub fn apply_sort<R>(
    rows: &[R],
    mask: &[usize],
    specs: &[ColumnSpec<R>],
    state: &SortState,
) -> Vec<usize> {
    let Some((key, direction)) = &state.active else {
        return mask.to_vec();
    };
    let spec = match find_column(specs, key) {
        Some(spec) if spec.sortable => spec,
        _ => {
            warn!("Ignoring sort on unknown or unsortable column \"{key}\"");
            return mask.to_vec();
        }
    };

    // Resolve every value once instead of on each comparison
    let mut indexed_rows: Vec<(usize, CellValue)> = mask
        .iter()
        .filter_map(|&idx| rows.get(idx).map(|row| (idx, spec.value(row))))
        .collect();

    indexed_rows.sort_by(|(_, a), (_, b)| {
        let ordering = spec.compare(a, b);
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });

    indexed_rows.into_iter().map(|(idx, _)| idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::fixtures::{item, item_columns, items};
    use crate::columns::{compare_dates, event_columns};
    use crate::events::tests::fixture_events;

    #[test]
    fn unsorted_keeps_input_order() {
        let rows = items();
        let sorted = apply_sort(&rows, &[2, 0, 1], &item_columns(), &SortState::unsorted());
        assert_eq!(sorted, vec![2, 0, 1]);
    }

    #[test]
    fn sorts_numbers_in_both_directions() {
        let rows = items();
        let specs = item_columns();
        let asc = apply_sort(&rows, &[0, 1, 2], &specs, &SortState::by("score", SortDirection::Ascending));
        assert_eq!(asc, vec![1, 2, 0]);
        let desc = apply_sort(&rows, &[0, 1, 2], &specs, &SortState::by("score", SortDirection::Descending));
        assert_eq!(desc, vec![0, 2, 1]);
    }

    #[test]
    fn sort_is_stable_for_equal_values() {
        let rows = vec![
            item("A", "a", "red", 0.0),
            item("B", "b", "blue", 0.0),
            item("C", "c", "red", 0.0),
            item("D", "d", "blue", 0.0),
            item("E", "e", "red", 0.0),
        ];
        let specs = item_columns();
        let mask = vec![0, 1, 2, 3, 4];

        let asc = apply_sort(&rows, &mask, &specs, &SortState::by("group", SortDirection::Ascending));
        assert_eq!(asc, vec![1, 3, 0, 2, 4]);

        let desc = apply_sort(&rows, &mask, &specs, &SortState::by("group", SortDirection::Descending));
        assert_eq!(desc, vec![0, 2, 4, 1, 3]);

        let shuffled = vec![4, 2, 0];
        let same = apply_sort(&rows, &shuffled, &specs, &SortState::by("group", SortDirection::Ascending));
        assert_eq!(same, shuffled);
    }

    #[test]
    fn three_clicks_return_to_unsorted() {
        let specs = item_columns();
        let first = SortState::unsorted().cycle(&specs, "title");
        assert_eq!(first, SortState::by("title", SortDirection::Ascending));
        let second = first.cycle(&specs, "title");
        assert_eq!(second, SortState::by("title", SortDirection::Descending));
        let third = second.cycle(&specs, "title");
        assert_eq!(third, SortState::unsorted());
        assert!(!third.is_sorted());
    }

    #[test]
    fn clicking_another_column_starts_ascending() {
        let specs = item_columns();
        let state = SortState::by("title", SortDirection::Descending).cycle(&specs, "score");
        assert_eq!(state.key(), Some("score"));
        assert_eq!(state.direction(), Some(SortDirection::Ascending));
        assert_eq!(state.direction_of("title"), None);
    }

    #[test]
    fn unsortable_column_click_keeps_state() {
        let specs = item_columns();
        let state = SortState::by("title", SortDirection::Ascending);
        assert_eq!(state.cycle(&specs, "id"), state);
        assert_eq!(state.cycle(&specs, "missing"), state);
    }

    #[test]
    fn invalid_state_is_ignored() {
        let rows = items();
        let specs = item_columns();
        let mask = vec![2, 1, 0];
        assert_eq!(
            apply_sort(&rows, &mask, &specs, &SortState::by("nope", SortDirection::Ascending)),
            mask
        );
        assert_eq!(
            apply_sort(&rows, &mask, &specs, &SortState::by("id", SortDirection::Ascending)),
            mask
        );
    }

    #[test]
    fn date_column_sorts_chronologically() {
        let events = fixture_events();
        let specs = event_columns();
        let mask: Vec<usize> = (0..events.len()).collect();
        // Sep 2020, Jan 2021, Feb 2021, Dec 2021
        let asc = apply_sort(&events, &mask, &specs, &SortState::by("date", SortDirection::Ascending));
        assert_eq!(asc, vec![3, 0, 1, 2]);
        let desc = apply_sort(&events, &mask, &specs, &SortState::by("date", SortDirection::Descending));
        assert_eq!(desc, vec![2, 1, 0, 3]);
    }

    #[test]
    fn date_sort_differs_from_lexical_sort() {
        let dates = ["Wed Dec 01 2021", "Tue Jan 05 2021", "Mon Feb 01 2021"];
        let mut lexical: Vec<&str> = dates.to_vec();
        lexical.sort();
        assert_eq!(lexical[0], "Mon Feb 01 2021");

        let mut chronological: Vec<CellValue> = dates.iter().map(|&d| d.into()).collect();
        chronological.sort_by(compare_dates);
        assert_eq!(chronological[0], CellValue::from("Tue Jan 05 2021"));
        assert_eq!(chronological[2], CellValue::from("Wed Dec 01 2021"));
    }
}
