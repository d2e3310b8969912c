use serde_json::Value;
use tracing::{trace, warn};

use crate::columns::ColumnSpec;
use crate::events::Event;
use crate::expansion::ExpansionState;
use crate::filter::{FilterState, apply_filters};
use crate::sort::{SortDirection, SortState, apply_sort};

/// A row that can be shown in the table: it has a stable key and can be
/// dumped in full for the detail view.
pub trait TableRow {
    fn row_key(&self) -> &str;
    fn raw(&self) -> Value;
}

impl TableRow for Event {
    fn row_key(&self) -> &str {
        &self.id
    }

    fn raw(&self) -> Value {
        self.raw.clone()
    }
}

/// The filtered then sorted row indices, plus the per column pre filter counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedView {
    pub rows: Vec<usize>,
    pub pre_filtered: Vec<usize>,
}

impl DerivedView {
    pub fn derive<R: Sync>(
        rows: &[R],
        specs: &[ColumnSpec<R>],
        filter: &FilterState,
        sort: &SortState,
        case_sensitive: bool,
    ) -> Self {
        let all: Vec<usize> = (0..rows.len()).collect();
        let filtered = apply_filters(rows, &all, specs, filter, case_sensitive);
        let sorted = apply_sort(rows, &filtered.rows, specs, sort);
        trace!(
            "Derived view: {} of {} rows, sort {:?}",
            sorted.len(),
            rows.len(),
            sort
        );
        Self {
            rows: sorted,
            pre_filtered: filtered.pre_filtered,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterInput {
    pub text: String,
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub key: &'static str,
    pub label: String,
    pub sortable: bool,
    pub sort: Option<SortDirection>,
    pub filter: Option<FilterInput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub emphasized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyRow {
    /// Index into the raw rows.
    pub index: usize,
    pub key: String,
    pub cells: Vec<Cell>,
    pub expanded: bool,
    pub detail: Option<Vec<String>>,
}

impl BodyRow {
    /// Lines this row occupies when rendered.
    pub fn height(&self) -> usize {
        1 + self.detail.as_ref().map_or(0, Vec::len)
    }
}

/// Everything the render surface needs to draw the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableViewModel {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<BodyRow>,
    pub total: usize,
}

impl TableViewModel {
    pub fn build<R: TableRow>(
        rows: &[R],
        specs: &[ColumnSpec<R>],
        derived: &DerivedView,
        filter: &FilterState,
        sort: &SortState,
        expansion: &ExpansionState,
        max_detail_lines: usize,
    ) -> Self {
        let headers = specs
            .iter()
            .enumerate()
            .map(|(cidx, spec)| HeaderCell {
                key: spec.key,
                label: spec.label.to_string(),
                sortable: spec.sortable,
                sort: sort.direction_of(spec.key),
                filter: spec.filterable.then(|| FilterInput {
                    text: filter.get(spec.key).unwrap_or_default().to_string(),
                    placeholder: format!(
                        "Search {} records...",
                        derived.pre_filtered.get(cidx).copied().unwrap_or(rows.len())
                    ),
                }),
            })
            .collect();

        let body = derived
            .rows
            .iter()
            .filter_map(|&idx| rows.get(idx).map(|row| (idx, row)))
            .map(|(idx, row)| {
                let key = row.row_key().to_string();
                let expanded = expansion.is_expanded(&key);
                let cells = specs
                    .iter()
                    .map(|spec| {
                        let value = spec.value(row);
                        Cell {
                            text: spec.render(&value),
                            emphasized: spec.is_emphasized(&value),
                        }
                    })
                    .collect();
                BodyRow {
                    index: idx,
                    key,
                    cells,
                    expanded,
                    detail: expanded.then(|| render_detail(row, max_detail_lines)),
                }
            })
            .collect();

        Self {
            headers,
            rows: body,
            total: rows.len(),
        }
    }

    pub fn visible(&self) -> usize {
        self.rows.len()
    }
}

/// Pretty printed JSON of the whole row as received, cut to `max_lines`.
pub fn render_detail<R: TableRow>(row: &R, max_lines: usize) -> Vec<String> {
    let dump = match serde_json::to_string_pretty(&row.raw()) {
        Ok(dump) => dump,
        Err(e) => {
            warn!("Unable to render row detail: {e}");
            return vec![format!("<unable to render row: {e}>")];
        }
    };
    let mut lines: Vec<String> = dump.lines().map(str::to_string).collect();
    if lines.len() > max_lines {
        let hidden = lines.len() - max_lines;
        lines.truncate(max_lines);
        lines.push(format!("... ({hidden} more lines)"));
    }
    lines
}
