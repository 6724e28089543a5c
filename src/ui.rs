use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::Focus;
use crate::filter::ColumnSelector;
use crate::inputter::Inputter;
use crate::model::Model;
use crate::render::{GridBody, count_text};

pub const CONTROLS_HEIGHT: usize = 3;
pub const TABLE_HEADER_HEIGHT: usize = 3;
pub const STATUSLINE_HEIGHT: usize = 1;
const INDEX_MIN_WIDTH: usize = 3;
const STATUS_HIGHLIGHT: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let nfilters = model.filters().len();
        let [controls, filters, table, statusline] = Layout::vertical([
            Constraint::Length(CONTROLS_HEIGHT as u16),
            Constraint::Length(nfilters as u16),
            Constraint::Fill(1),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_controls(model, frame, controls);
        self.draw_filters(model, frame, filters);
        self.draw_table(model, frame, table);
        self.draw_statusline(model, frame, statusline);

        if let Some(message) = model.popup_message() {
            self.draw_popup(message, frame);
        }
    }

    fn draw_controls(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let focus = model.focus();
        let options = model.options();
        let prefix = Span::from(" Search: ");

        let mut spans = vec![prefix.clone()];
        spans.push(input_span(model.search(), focus == Focus::Search));
        spans.push("  in ".into());
        spans.push(selector_span(
            model.search_column(),
            focus == Focus::SearchColumn,
        ));
        spans.push("  ".into());
        spans.push(toggle_span("Case", options.case_sensitive));
        spans.push(" F2  ".dark_gray());
        spans.push(toggle_span("Regex", options.regex));
        spans.push(" F3  ".dark_gray());
        spans.push("Match: ".into());
        spans.push(model.mode().to_string().yellow().bold());
        spans.push(" F4".dark_gray());

        let block = Block::bordered()
            .title(Line::from(" csvsift ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);

        if focus == Focus::Search && model.popup_message().is_none() {
            let x = area.x + 1 + prefix.width() as u16 + cursor_width(model.search());
            frame.set_cursor_position((x, area.y + 1));
        }
    }

    fn draw_filters(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let focus = model.focus();
        for (idx, row) in model.filters().rows().iter().enumerate() {
            let Some(line_area) = filter_line_area(area, idx) else {
                break;
            };
            let prefix = Span::from(format!(" Filter {}: ", idx + 1));
            let selector = selector_span(row.column(), focus == Focus::FilterColumn(idx));
            let separator = Span::from(" = ");
            let offset = prefix.width() + selector.width() + separator.width();
            let spans = vec![
                prefix,
                selector,
                separator,
                input_span(row.input(), focus == Focus::FilterQuery(idx)),
                "  Ctrl-D removes".dark_gray(),
            ];
            frame.render_widget(Paragraph::new(Line::from(spans)), line_area);

            if focus == Focus::FilterQuery(idx) && model.popup_message().is_none() {
                let x = line_area.x + offset as u16 + cursor_width(row.input());
                frame.set_cursor_position((x, line_area.y));
            }
        }
    }

    fn draw_table(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        let grid = model.grid();
        let title = if model.name().is_empty() {
            " Results ".to_string()
        } else {
            format!(" {} ", model.name())
        };
        let block = Block::bordered()
            .title(Line::from(title.bold()).centered())
            .border_set(border::PLAIN);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let max_width = model.config().max_column_width;
        let index_width = model
            .visible_rows()
            .last()
            .map_or(0, |r| (r + 1).to_string().len())
            .max(INDEX_MIN_WIDTH);
        let mut widths = vec![Constraint::Length(index_width as u16)];
        widths.extend(
            grid.column_widths(max_width)
                .into_iter()
                .map(|w| Constraint::Length(w as u16)),
        );

        let header = Row::new(
            std::iter::once(Cell::from("#"))
                .chain(grid.headers.iter().map(|h| Cell::from(h.as_str()))),
        )
        .style(Style::new().bold().underlined());

        match &grid.body {
            GridBody::Rows(rows) => {
                let body = rows.iter().zip(model.visible_rows()).map(|(cells, ridx)| {
                    Row::new(
                        std::iter::once(Cell::from((ridx + 1).to_string().dark_gray()))
                            .chain(cells.iter().map(|c| Cell::from(c.as_str()))),
                    )
                });
                let table = Table::new(body, widths)
                    .header(header)
                    .column_spacing(1)
                    .row_highlight_style(Style::new().reversed());
                self.table_state.select(Some(model.selected_row()));
                frame.render_stateful_widget(table, inner, &mut self.table_state);
            }
            GridBody::Placeholder(message) => {
                let [header_area, body_area] =
                    Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(inner);
                let rows: [Row; 0] = [];
                frame.render_widget(
                    Table::new(rows, widths).header(header).column_spacing(1),
                    header_area,
                );
                frame.render_widget(
                    Paragraph::new(message.as_str().italic()).wrap(Wrap { trim: true }),
                    body_area,
                );
                self.table_state.select(None);
            }
        }
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let [count, status, hint] = Layout::horizontal([
            Constraint::Length(16),
            Constraint::Fill(1),
            Constraint::Length(12),
        ])
        .areas(area);
        frame.render_widget(
            Paragraph::new(format!(" {}", count_text(model.row_count())).bold()),
            count,
        );
        let status_message = if model.last_status_message_update().elapsed() < STATUS_HIGHLIGHT {
            model.status_message().yellow()
        } else {
            model.status_message().dark_gray()
        };
        frame.render_widget(Paragraph::new(status_message), status);
        frame.render_widget(
            Paragraph::new("F1 help ".dark_gray()).right_aligned(),
            hint,
        );
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 60, 70);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::DOUBLE);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(message).block(block), area);
    }
}

/// The line of filter row `idx`, `None` once the rows no longer fit in `area`.
fn filter_line_area(area: Rect, idx: usize) -> Option<Rect> {
    let offset = u16::try_from(idx).ok().filter(|&o| o < area.height)?;
    Some(Rect {
        y: area.y + offset,
        height: 1,
        ..area
    })
}

fn input_span(input: &Inputter, focused: bool) -> Span<'static> {
    let text = if input.value().is_empty() && !focused {
        "…".to_string()
    } else {
        input.value().to_string()
    };
    if focused {
        text.underlined().yellow()
    } else {
        text.into()
    }
}

fn selector_span(selector: &ColumnSelector, focused: bool) -> Span<'static> {
    let text = format!("[{}]", selector.label());
    if focused {
        format!("◂{text}▸").reversed()
    } else {
        text.cyan()
    }
}

fn toggle_span(label: &str, on: bool) -> Span<'static> {
    let mark = if on { "[x]" } else { "[ ]" };
    format!("{mark} {label}").into()
}

/// Terminal columns between the start of `input` and its cursor.
fn cursor_width(input: &Inputter) -> u16 {
    let before: String = input.value().chars().take(input.cursor()).collect();
    Span::from(before).width() as u16
}

fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_lines_stay_inside_their_area() {
        let area = Rect::new(0, 3, 80, 2);
        assert_eq!(filter_line_area(area, 0), Some(Rect::new(0, 3, 80, 1)));
        assert_eq!(filter_line_area(area, 1), Some(Rect::new(0, 4, 80, 1)));
        assert_eq!(filter_line_area(area, 2), None);
        assert_eq!(filter_line_area(Rect::new(0, 3, 80, 0), 0), None);
    }
}
