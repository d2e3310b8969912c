use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::columns::{ColumnSpec, event_columns, find_column};
use crate::domain::{CMDMode, EventvConfig, EventvError, HELP_TEXT, Message};
use crate::events::{DataSource, Event, spawn_load};
use crate::expansion::ExpansionState;
use crate::filter::FilterState;
use crate::inputter::{InputResult, Inputter};
use crate::sort::{SortDirection, SortState};
use crate::ui::{
    CMDLINE_HEIGH, COLUMN_SPACER, EXPANDER_WIDTH, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT,
    natural_column_width,
};
use crate::view::{DerivedView, TableRow, TableViewModel};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

/// Where the raw rows stand. An empty but loaded table is not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleColumn {
    pub idx: usize,
    pub width: usize,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH + EXPANDER_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct UIData {
    pub name: String,
    pub load_state: LoadState,
    pub view: Arc<TableViewModel>,
    pub columns: Vec<VisibleColumn>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub offset_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub active_filters: usize,
    pub sorted_by: Option<(String, SortDirection)>,
    pub expanded: usize,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub cmd_target: String,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            load_state: LoadState::Loading,
            view: Arc::new(TableViewModel::default()),
            columns: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            offset_row: 0,
            show_popup: false,
            popup_message: String::new(),
            active_filters: 0,
            sorted_by: None,
            expanded: 0,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            cmd_target: String::new(),
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: EventvConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    load_state: LoadState,
    source: Option<Arc<dyn DataSource>>,
    loader: Option<Receiver<Result<Vec<Event>, EventvError>>>,
    rows: Arc<Vec<Event>>,
    columns: Vec<ColumnSpec<Event>>,
    column_widths: Vec<usize>,
    filter: FilterState,
    sort: SortState,
    expansion: ExpansionState,
    derived: DerivedView,
    view: Arc<TableViewModel>,
    visible_columns: Vec<VisibleColumn>,
    curser_row: usize,
    offset_row: usize,
    curser_column: usize,
    offset_column: usize,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    filter_backup: Option<String>,
    status_message: String,
}

impl Model {
    pub fn init(config: &EventvConfig, ui_width: usize, ui_height: usize) -> Self {
        let columns = event_columns();
        let column_widths = vec![0; columns.len()];
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            load_state: LoadState::Loading,
            source: None,
            loader: None,
            rows: Arc::new(Vec::new()),
            columns,
            column_widths,
            filter: FilterState::new(),
            sort: SortState::unsorted(),
            expansion: ExpansionState::new(),
            derived: DerivedView::default(),
            view: Arc::new(TableViewModel::default()),
            visible_columns: Vec::new(),
            curser_row: 0,
            offset_row: 0,
            curser_column: 0,
            offset_column: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            filter_backup: None,
            status_message: "Started eventv!".to_string(),
        };
        model.rebuild();
        model
    }

    /// Starts fetching the rows from `source` in the background. The result
    /// arrives through `update` as a single transition.
    pub fn load(&mut self, source: Arc<dyn DataSource>) {
        self.source = Some(source);
        self.start_loading();
    }

    fn start_loading(&mut self) {
        let Some(source) = self.source.clone() else {
            warn!("Reload requested without a data source");
            return;
        };
        if self.loader.is_some() {
            self.set_status_message("Already loading ...");
            return;
        }
        info!("Loading events from {}", source.describe());
        if self.rows.is_empty() {
            self.load_state = LoadState::Loading;
        }
        self.set_status_message("Loading ...");
        self.loader = Some(spawn_load(source));
        self.update_uidata();
    }

    fn poll_loader(&mut self) -> Option<Message> {
        let rx = self.loader.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(EventvError::LoadingFailed(
                "loader stopped without a result".into(),
            )),
        };
        self.loader = None;
        Some(Message::Loaded(result))
    }

    fn loaded(&mut self, result: Result<Vec<Event>, EventvError>) {
        match result {
            Ok(events) => {
                let count = events.len();
                self.rows = Arc::new(events);
                if !self.expansion.is_empty() {
                    self.expansion = self
                        .expansion
                        .retain_keys(self.rows.iter().map(|e| e.row_key()));
                }
                self.load_state = LoadState::Loaded;
                self.calculate_column_widths();
                self.rebuild();
                self.set_status_message(format!("Loaded {count} events"));
            }
            Err(e) => {
                error!("Loading events failed: {e}");
                if self.rows.is_empty() {
                    self.load_state = LoadState::Failed(e.to_string());
                }
                self.set_status_message(format!("Loading failed: {e}"));
                self.update_uidata();
            }
        }
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn calculate_column_widths(&mut self) {
        let total = self.rows.len();
        self.column_widths = self
            .columns
            .iter()
            .map(|spec| {
                let cells: Vec<String> = self
                    .rows
                    .iter()
                    .map(|row| spec.render(&spec.value(row)))
                    .collect();
                let placeholder = spec
                    .filterable
                    .then(|| format!("Search {total} records..."));
                natural_column_width(
                    spec.label,
                    placeholder.as_deref(),
                    cells.iter().map(String::as_str),
                    self.config.max_column_width,
                )
            })
            .collect();
        debug!("Column widths: {:?}", self.column_widths);
    }

    /// Recomputes the derived rows. Needed whenever rows, filters or sorting change.
    fn rebuild(&mut self) {
        let start_time = Instant::now();
        self.derived = DerivedView::derive(
            &self.rows,
            &self.columns,
            &self.filter,
            &self.sort,
            self.config.case_sensitive,
        );
        trace!(
            "Derived {} rows in {}us",
            self.derived.rows.len(),
            start_time.elapsed().as_micros()
        );
        self.rebuild_view();
    }

    /// Rebuilds the render structure from the current derived rows.
    fn rebuild_view(&mut self) {
        self.view = Arc::new(TableViewModel::build(
            &self.rows,
            &self.columns,
            &self.derived,
            &self.filter,
            &self.sort,
            &self.expansion,
            self.config.max_detail_lines,
        ));
        let nrows = self.view.rows.len();
        self.curser_row = self.curser_row.min(nrows.saturating_sub(1));
        self.update_table_data();
    }

    fn update_table_data(&mut self) {
        self.update_visible_columns();
        self.ensure_row_visible();
        self.update_uidata();
    }

    fn update_visible_columns(&mut self) {
        let table_width = self.uilayout.table_width;
        self.offset_column = self.offset_column.min(self.columns.len().saturating_sub(1));
        self.visible_columns.clear();

        let mut visible_width = 0;
        for (cidx, &width) in self.column_widths.iter().enumerate().skip(self.offset_column) {
            if visible_width + width + COLUMN_SPACER <= table_width {
                self.visible_columns.push(VisibleColumn { idx: cidx, width });
                visible_width += width + COLUMN_SPACER;
            } else {
                // Add the last partial visible column
                if visible_width < table_width {
                    self.visible_columns.push(VisibleColumn {
                        idx: cidx,
                        width: table_width - visible_width,
                    });
                }
                break;
            }
        }
    }

    fn is_column_fully_visible(&self, cidx: usize) -> bool {
        self.visible_columns
            .iter()
            .any(|c| c.idx == cidx && Some(&c.width) == self.column_widths.get(cidx))
    }

    fn ensure_column_visible(&mut self) {
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        self.update_visible_columns();
        while self.offset_column < self.curser_column
            && !self.is_column_fully_visible(self.curser_column)
        {
            self.offset_column += 1;
            self.update_visible_columns();
        }
    }

    fn lines_between(&self, first: usize, last: usize) -> usize {
        self.view
            .rows
            .get(first..=last)
            .map_or(0, |rows| rows.iter().map(|r| r.height()).sum())
    }

    fn ensure_row_visible(&mut self) {
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        }
        while self.offset_row < self.curser_row
            && self.lines_between(self.offset_row, self.curser_row) > self.uilayout.table_height
        {
            self.offset_row += 1;
        }
    }

    fn update_uidata(&mut self) {
        let cmd_target = self
            .columns
            .get(self.curser_column)
            .map(|c| c.label.to_string())
            .unwrap_or_default();
        let sorted_by = if self.sort.is_sorted() {
            self.sort.key().zip(self.sort.direction()).map(|(key, direction)| {
                let label = find_column(&self.columns, key).map_or(key, |spec| spec.label);
                (label.to_string(), direction)
            })
        } else {
            None
        };
        self.uidata = UIData {
            name: self
                .source
                .as_ref()
                .map(|s| s.describe())
                .unwrap_or_else(|| "eventv".to_string()),
            load_state: self.load_state.clone(),
            view: Arc::clone(&self.view),
            columns: self.visible_columns.clone(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            offset_row: self.offset_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.uidata.popup_message.clone(),
            active_filters: self.filter.len(),
            sorted_by,
            expanded: self.expansion.len(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            cmd_target,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
        };
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.ensure_column_visible();
        self.update_table_data();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), EventvError> {
        if let Some(loaded) = self.poll_loader() {
            self.dispatch(loaded);
        }
        if let Some(msg) = message {
            self.dispatch(msg);
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: Message) {
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_selection_down(1),
                Message::MoveUp => self.move_selection_up(1),
                Message::MoveLeft => self.move_selection_left(),
                Message::MoveRight => self.move_selection_right(),
                Message::MovePageUp => self.move_selection_up(self.uilayout.table_height.max(1)),
                Message::MovePageDown => {
                    self.move_selection_down(self.uilayout.table_height.max(1))
                }
                Message::MoveBeginning => self.move_selection_beginning(),
                Message::MoveEnd => self.move_selection_end(),
                Message::CycleSort => self.cycle_sort(self.curser_column),
                Message::ToggleExpand => self.toggle_expand(),
                Message::Filter => self.enter_filter_mode(),
                Message::Reload => self.start_loading(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.show_help(),
                Message::Click(x, y) => self.click(x as usize, y as usize),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Loaded(result) => self.loaded(result),
                Message::Exit | Message::RawKey(_) => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Loaded(result) => self.loaded(result),
                Message::Exit | Message::Help => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => match msg {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Loaded(result) => self.loaded(result),
                _ => (),
            },
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
            self.update_uidata();
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.update_uidata();
    }

    fn cycle_sort(&mut self, cidx: usize) {
        let Some(spec) = self.columns.get(cidx) else {
            return;
        };
        if !spec.sortable {
            let message = format!("Column {} cannot be sorted", spec.label);
            self.set_status_message(message);
            return;
        }
        let key = spec.key;
        self.sort = self.sort.cycle(&self.columns, key);
        let message = match self.sort.direction_of(key) {
            Some(direction) => format!("Sorted by {key} {direction}"),
            None => "Sorting cleared".to_string(),
        };
        debug!("{message}");
        self.rebuild();
        self.set_status_message(message);
    }

    fn toggle_expand(&mut self) {
        let Some(row) = self.view.rows.get(self.curser_row) else {
            return;
        };
        self.expansion = self.expansion.toggle(&row.key);
        trace!("Toggled {} -> {} expanded", row.key, self.expansion.len());
        self.rebuild_view();
    }

    fn enter_filter_mode(&mut self) {
        let Some(spec) = self.columns.get(self.curser_column) else {
            return;
        };
        if !spec.filterable {
            let message = format!("Column {} cannot be filtered", spec.label);
            self.set_status_message(message);
            return;
        }
        trace!("Entering filter mode for {} ...", spec.key);
        let current = self.filter.get(spec.key).unwrap_or_default().to_string();

        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(CMDMode::Filter);
        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(&current);
        self.last_input = self.input.get();
        self.filter_backup = Some(current);
        self.update_uidata();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        match self.cmd_mode {
            Some(CMDMode::Filter) => {
                if self.last_input.canceled {
                    let previous = self.filter_backup.take().unwrap_or_default();
                    self.set_column_filter(&previous);
                } else {
                    let text = self.last_input.input.clone();
                    self.set_column_filter(&text);
                }
            }
            None => info!("No command mode for input {}", self.last_input.input),
        }
        if self.last_input.finished {
            self.leave_cmd_mode();
        }
        self.update_uidata();
    }

    fn set_column_filter(&mut self, text: &str) {
        let Some(spec) = self.columns.get(self.curser_column) else {
            return;
        };
        let filter = self.filter.with_filter(spec.key, text);
        if filter != self.filter {
            self.filter = filter;
            self.rebuild();
            let message = if self.filter.is_empty() {
                "Filters cleared".to_string()
            } else {
                format!("{} of {} records", self.view.visible(), self.view.total)
            };
            self.set_status_message(message);
        }
    }

    fn leave_cmd_mode(&mut self) {
        trace!("Leaving command mode ...");
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.cmd_mode = None;
        self.filter_backup = None;
        self.input.clear();
    }

    fn click(&mut self, x: usize, y: usize) {
        if self.load_state != LoadState::Loaded {
            return;
        }
        if y < TABLE_HEADER_HEIGHT {
            if let Some(cidx) = self.column_at(x) {
                self.curser_column = cidx;
                if y == 0 {
                    self.cycle_sort(cidx);
                } else {
                    self.update_table_data();
                    self.enter_filter_mode();
                }
            }
            return;
        }

        let mut line = TABLE_HEADER_HEIGHT;
        let mut hit = None;
        for (ridx, row) in self.view.rows.iter().enumerate().skip(self.offset_row) {
            if line >= TABLE_HEADER_HEIGHT + self.uilayout.table_height {
                break;
            }
            if y < line + row.height() {
                hit = Some((ridx, y == line));
                break;
            }
            line += row.height();
        }

        if let Some((ridx, on_main_line)) = hit {
            self.curser_row = ridx;
            if let Some(cidx) = self.column_at(x) {
                self.curser_column = cidx;
            }
            if on_main_line && x < EXPANDER_WIDTH {
                self.toggle_expand();
            } else {
                self.update_table_data();
            }
        }
    }

    fn column_at(&self, x: usize) -> Option<usize> {
        let mut start = EXPANDER_WIDTH;
        for column in self.visible_columns.iter() {
            if x >= start && x < start + column.width + COLUMN_SPACER {
                return Some(column.idx);
            }
            start += column.width + COLUMN_SPACER;
        }
        None
    }

    fn copy_to_clipboard(&mut self, content: String) -> Result<(), EventvError> {
        let clipboard = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new()?,
        };
        self.clipboard.insert(clipboard).set_text(content)?;
        Ok(())
    }

    fn report_copy(&mut self, result: Result<(), EventvError>, what: &str) {
        match result {
            Ok(_) => {
                trace!("Copied {what} to clipboard.");
                self.set_status_message(format!("Copied {what}"));
            }
            Err(e) => {
                warn!("Error copying to clipboard: {e}");
                self.set_status_message(format!("Copy failed: {e}"));
            }
        }
    }

    fn copy_cell(&mut self) {
        let Some(cell) = self
            .view
            .rows
            .get(self.curser_row)
            .and_then(|r| r.cells.get(self.curser_column))
        else {
            return;
        };
        let content = cell.text.clone();
        let result = self.copy_to_clipboard(content);
        self.report_copy(result, "cell");
    }

    fn copy_row(&mut self) {
        let Some(event) = self
            .view
            .rows
            .get(self.curser_row)
            .and_then(|r| self.rows.get(r.index))
        else {
            return;
        };
        let result = serde_json::to_string(&event.raw)
            .map_err(EventvError::from)
            .and_then(|json| self.copy_to_clipboard(json));
        self.report_copy(result, "row");
    }

    fn move_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
        self.update_table_data();
    }

    fn move_selection_end(&mut self) {
        self.curser_row = self.view.rows.len().saturating_sub(1);
        self.update_table_data();
    }

    fn move_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.update_table_data();
    }

    fn move_selection_down(&mut self, size: usize) {
        let last = self.view.rows.len().saturating_sub(1);
        self.curser_row = (self.curser_row + size).min(last);
        self.update_table_data();
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.ensure_column_visible();
        self.update_table_data();
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.columns.len() {
            self.curser_column += 1;
        }
        self.ensure_column_visible();
        self.update_table_data();
    }
}
