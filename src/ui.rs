use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};

use crate::domain::CMDMode;
use crate::model::{LoadState, UIData};
use crate::sort::SortDirection;

pub const CMDLINE_HEIGH: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 2;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const EXPANDER_WIDTH: usize = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const COLUMN_SPACER: usize = 1;

const SORT_INDICATOR_WIDTH: usize = 2;

#[derive(Debug, Default)]
pub struct TableUI;

impl TableUI {
    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let [header_area, body_area, status_area] = Layout::vertical([
            Constraint::Length(TABLE_HEADER_HEIGHT as u16),
            Constraint::Fill(1),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());

        match &uidata.load_state {
            LoadState::Loading => {
                self.draw_message(
                    frame,
                    body_area,
                    format!("Loading events from {} ...", uidata.name),
                    Style::default().fg(Color::Yellow),
                );
            }
            LoadState::Failed(reason) => {
                self.draw_message(
                    frame,
                    body_area,
                    format!("Loading failed: {reason}  (press r to retry)"),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                );
            }
            LoadState::Loaded => {
                self.draw_header(frame, header_area, uidata);
                if uidata.view.total == 0 {
                    self.draw_message(frame, body_area, "No events".into(), Style::default());
                } else if uidata.view.rows.is_empty() {
                    self.draw_message(
                        frame,
                        body_area,
                        "No events match the active filters".into(),
                        Style::default().fg(Color::DarkGray),
                    );
                } else {
                    self.draw_body(frame, body_area, uidata);
                }
            }
        }

        self.draw_statusline(frame, status_area, uidata);

        if uidata.show_popup {
            self.draw_popup(frame, &uidata.popup_message);
        }
    }

    fn draw_message(&self, frame: &mut Frame, area: Rect, message: String, style: Style) {
        let [line] = Layout::vertical([Constraint::Length(1)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(Paragraph::new(message).style(style).centered(), line);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        let header_style = Style::default().add_modifier(Modifier::BOLD);
        let mut labels = vec![Span::raw(" ".repeat(EXPANDER_WIDTH))];
        let mut filters = vec![Span::raw(" ".repeat(EXPANDER_WIDTH))];

        for column in uidata.columns.iter() {
            let Some(header) = uidata.view.headers.get(column.idx) else {
                continue;
            };
            let indicator = match header.sort {
                Some(SortDirection::Ascending) => " ▲",
                Some(SortDirection::Descending) => " ▼",
                None => "",
            };
            let label = get_visible_name(&format!("{}{}", header.label, indicator), column.width);
            let mut style = header_style;
            if column.idx == uidata.selected_column {
                style = style.add_modifier(Modifier::REVERSED);
            }
            labels.push(Span::styled(label, style));
            labels.push(Span::raw(" ".repeat(COLUMN_SPACER)));

            let filter = match &header.filter {
                Some(input) if !input.text.is_empty() => Span::styled(
                    get_visible_name(&input.text, column.width),
                    Style::default().fg(Color::Cyan),
                ),
                Some(input) => Span::styled(
                    get_visible_name(&input.placeholder, column.width),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ),
                None => Span::raw(" ".repeat(column.width)),
            };
            filters.push(filter);
            filters.push(Span::raw(" ".repeat(COLUMN_SPACER)));
        }

        frame.render_widget(
            Paragraph::new(vec![Line::from(labels), Line::from(filters)]),
            area,
        );
    }

    fn draw_body(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        let height = area.height as usize;
        let detail_width = (area.width as usize).saturating_sub(SCROLLBAR_WIDTH + EXPANDER_WIDTH);
        let mut lines: Vec<Line> = Vec::with_capacity(height);

        for (ridx, row) in uidata.view.rows.iter().enumerate().skip(uidata.offset_row) {
            if lines.len() >= height {
                break;
            }
            let selected = ridx == uidata.selected_row;
            let row_style = if selected {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };

            let expander = if row.expanded { "▾ " } else { "▸ " };
            let mut spans = vec![Span::styled(expander, row_style.fg(Color::Blue))];
            for column in uidata.columns.iter() {
                let Some(cell) = row.cells.get(column.idx) else {
                    continue;
                };
                let mut style = row_style;
                if cell.emphasized {
                    style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
                }
                if selected && column.idx == uidata.selected_column {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                spans.push(Span::styled(get_visible_name(&cell.text, column.width), style));
                spans.push(Span::styled(" ".repeat(COLUMN_SPACER), row_style));
            }
            lines.push(Line::from(spans));

            for detail in row.detail.iter().flatten() {
                if lines.len() >= height {
                    break;
                }
                lines.push(Line::from(vec![
                    Span::raw(" ".repeat(EXPANDER_WIDTH)),
                    Span::styled(
                        truncate(detail, detail_width),
                        Style::default().fg(Color::Gray),
                    ),
                ]));
            }
        }

        frame.render_widget(Paragraph::new(lines), area);

        if uidata.view.rows.len() > 1 {
            let mut state = ScrollbarState::new(uidata.view.rows.len()).position(uidata.selected_row);
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(None)
                    .end_symbol(None),
                area,
                &mut state,
            );
        }
    }

    fn draw_statusline(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::Filter) => format!("Filter {}: ", uidata.cmd_target),
                None => ": ".to_string(),
            };
            let cursor_x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            let line = Line::from(vec![prompt.bold(), Span::raw(uidata.cmdinput.input.clone())]);
            frame.render_widget(Paragraph::new(line), area);
            frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let summary = match uidata.load_state {
            LoadState::Loaded => status_summary(uidata),
            _ => " ? help ".to_string(),
        };
        let [left, right] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(summary.chars().count() as u16),
        ])
        .areas(area);
        frame.render_widget(
            Paragraph::new(format!(" {}: {}", uidata.name, uidata.status_message)),
            left,
        );
        frame.render_widget(Paragraph::new(summary.reversed()), right);
    }

    fn draw_popup(&self, frame: &mut Frame, message: &str) {
        let [vertical] = Layout::vertical([Constraint::Percentage(80)])
            .flex(Flex::Center)
            .areas(frame.area());
        let [area] = Layout::horizontal([Constraint::Percentage(60)])
            .flex(Flex::Center)
            .areas(vertical);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message.to_string())
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" Help ".bold()).title_bottom(" Esc to close ")),
            area,
        );
    }
}

fn status_summary(uidata: &UIData) -> String {
    let mut parts = vec![format!(
        "{}/{} records",
        uidata.view.rows.len(),
        uidata.view.total
    )];
    if let Some((label, direction)) = &uidata.sorted_by {
        parts.push(format!("sorted by {label} {direction}"));
    }
    if uidata.active_filters > 0 {
        parts.push(format!("{} filters", uidata.active_filters));
    }
    if uidata.expanded > 0 {
        parts.push(format!("{} expanded", uidata.expanded));
    }
    let row = if uidata.view.rows.is_empty() { 0 } else { uidata.selected_row + 1 };
    parts.push(format!("row {row}"));
    parts.push("? help".to_string());
    format!(" {} ", parts.join(" | "))
}

/// Pads or cuts `name` to exactly `width` chars, marking cut text with "...".
pub fn get_visible_name(name: &str, width: usize) -> String {
    let len = name.chars().count();
    if len <= width {
        return format!("{name}{}", " ".repeat(width - len));
    }
    if width < 3 {
        return name.chars().take(width).collect();
    }
    let mut reduced: String = name.chars().take(width - 3).collect();
    reduced.push_str("...");
    reduced
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Natural width of a column: its widest label, filter placeholder or cell.
pub fn natural_column_width<'a>(
    label: &str,
    placeholder: Option<&str>,
    cells: impl Iterator<Item = &'a str>,
    max_column_width: usize,
) -> usize {
    let label_width = label.chars().count() + SORT_INDICATOR_WIDTH;
    let placeholder_width = placeholder.map_or(0, |p| p.chars().count());
    let cell_width = cells.map(|c| c.chars().count()).max().unwrap_or(0);
    let width = label_width.max(placeholder_width).max(cell_width) + COLUMN_WIDTH_MARGIN;
    width.min(max_column_width.max(label_width))
}
