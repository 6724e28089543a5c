use std::path::Path;
use std::time::{Duration, Instant};

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace};

use crate::columns::ColumnOptions;
use crate::data::Dataset;
use crate::debounce::Debouncer;
use crate::domain::{Focus, HELP_TEXT, Message, SiftConfig, SiftError};
use crate::filter::{ColumnSelector, FilterCondition, MatchMode, evaluate};
use crate::filter_rows::{FilterId, FilterRows};
use crate::inputter::Inputter;
use crate::matcher::MatchOptions;
use crate::render::{Grid, GridRenderer, TableRenderer, count_text};
use crate::ui::{CONTROLS_HEIGHT, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Popup,
}

/// Text inputs whose edits are debounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Search,
    Filter(FilterId),
}

/// Application state owned by the event loop.
///
/// Everything on screen is derived from the loaded data, the filter inputs,
/// the match options and the match mode; `refresh` recomputes it.
pub struct Model {
    config: SiftConfig,
    pub status: Status,
    modus: Modus,
    data: Option<Dataset>,
    load_error: Option<String>,
    columns: ColumnOptions,
    search: Inputter,
    search_column: ColumnSelector,
    filters: FilterRows,
    options: MatchOptions,
    mode: MatchMode,
    focus: Focus,
    debouncer: Debouncer<InputSource>,
    renderer: GridRenderer,
    visible: Vec<usize>,
    row_count: usize,
    selected_row: usize,
    ui_height: usize,
    status_message: String,
    last_status_message_update: Instant,
    // Kept alive so copied text outlives the copy on X11
    clipboard: Option<Clipboard>,
}

impl Model {
    pub fn init(config: &SiftConfig, ui_height: usize) -> Self {
        Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            data: None,
            load_error: None,
            columns: ColumnOptions::default(),
            search: Inputter::default(),
            search_column: ColumnSelector::All,
            filters: FilterRows::default(),
            options: MatchOptions::default(),
            mode: MatchMode::default(),
            focus: Focus::Search,
            debouncer: Debouncer::new(Duration::from_millis(config.debounce_ms)),
            renderer: GridRenderer::default(),
            visible: Vec::new(),
            row_count: 0,
            selected_row: 0,
            ui_height,
            status_message: "Started csvsift!".to_string(),
            last_status_message_update: Instant::now(),
            clipboard: None,
        }
    }

    /// Load `path` and show it. A failure is rendered as the table body and
    /// logged, it is not returned.
    pub fn load_data_file(&mut self, path: &Path) {
        match Dataset::load(path) {
            Ok(data) => self.set_data(data),
            Err(e) => {
                error!("Loading {} failed: {e}", path.display());
                self.data = None;
                self.load_error = Some(format!("Error loading CSV: {e}"));
                self.set_status_message(format!("Could not load {}", path.display()));
                self.refresh();
            }
        }
    }

    pub fn set_data(&mut self, data: Dataset) {
        self.columns = ColumnOptions::build(data.headers());
        self.search_column = self.columns.resolve(&self.search_column);
        self.filters.refresh_columns(&self.columns);
        self.set_status_message(format!(
            "Loaded {} ({} rows)",
            data.name(),
            data.nrows()
        ));
        self.data = Some(data);
        self.load_error = None;
        self.selected_row = 0;
        self.refresh();
    }

    pub fn set_search(&mut self, condition: &FilterCondition) {
        self.search.set(&condition.query);
        self.search_column = self.columns.resolve(&condition.column);
        self.refresh();
    }

    pub fn set_match_options(&mut self, options: MatchOptions, mode: MatchMode) {
        self.options = options;
        self.mode = mode;
        self.refresh();
    }

    pub fn add_filter_row(&mut self, initial_column: ColumnSelector, initial_value: &str) -> FilterId {
        let id = self
            .filters
            .add_filter_row(&self.columns, initial_column, initial_value);
        if !initial_value.trim().is_empty() {
            self.refresh();
        }
        id
    }

    pub fn remove_filter_row(&mut self, id: FilterId) {
        if self.filters.remove_filter_row(id).is_some() {
            self.debouncer.cancel(&InputSource::Filter(id));
            self.refresh();
        }
    }

    /// Re-evaluate the filters and render the result.
    fn refresh(&mut self) {
        let Some(data) = &self.data else {
            let message = self
                .load_error
                .clone()
                .unwrap_or_else(|| "No data loaded".to_string());
            if let Err(e) = self.renderer.render_message(&[], &message) {
                error!("Rendering message failed: {e}");
            }
            self.visible.clear();
            self.row_count = 0;
            self.selected_row = 0;
            return;
        };

        let conditions = self.filters.conditions();
        let fallback = FilterCondition::new(self.search_column.clone(), self.search.value().trim());
        self.visible = evaluate(data, &conditions, &fallback, self.options, self.mode);
        match self.renderer.render(data, &self.visible) {
            Ok(count) => self.row_count = count,
            Err(e) => error!("Rendering table failed: {e}"),
        }
        self.selected_row = self.selected_row.min(self.row_count.saturating_sub(1));
        debug!(
            "Refresh: {} filter(s), mode {}, {}",
            conditions.len(),
            self.mode,
            count_text(self.row_count)
        );
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    /// How long the event loop may block before the next debounced refresh is due.
    pub fn poll_timeout(&self, now: Instant) -> Duration {
        let poll = Duration::from_millis(self.config.event_poll_time);
        self.debouncer
            .time_to_next(now)
            .map_or(poll, |next| next.min(poll))
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::Table && self.focus.is_text_input()
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SiftError> {
        self.update_at(message, Instant::now())
    }

    pub fn update_at(&mut self, message: Option<Message>, now: Instant) -> Result<(), SiftError> {
        let due = self.debouncer.take_due(now);
        if !due.is_empty() {
            trace!("Debounced refresh for {:?}", due);
            self.refresh();
        }

        if let Some(msg) = message {
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::Help => self.show_help(),
                    Message::Edit(key) => self.edit(key, now),
                    Message::FocusNext => self.move_focus(1),
                    Message::FocusPrev => self.move_focus(-1),
                    Message::NextColumn => self.cycle_column(true),
                    Message::PrevColumn => self.cycle_column(false),
                    Message::ToggleCaseSensitive => {
                        self.options.case_sensitive = !self.options.case_sensitive;
                        self.refresh();
                    }
                    Message::ToggleRegex => {
                        self.options.regex = !self.options.regex;
                        self.refresh();
                    }
                    Message::ToggleMatchMode => {
                        self.mode = self.mode.toggle();
                        self.refresh();
                    }
                    Message::AddFilter => {
                        self.add_filter_row(ColumnSelector::All, "");
                        self.focus = Focus::FilterQuery(self.filters.len() - 1);
                    }
                    Message::RemoveFilter => self.remove_focused_filter(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MovePageUp => self.move_selection_up(self.page_height()),
                    Message::MovePageDown => self.move_selection_down(self.page_height()),
                    Message::MoveBeginning => self.selected_row = 0,
                    Message::MoveEnd => self.selected_row = self.row_count.saturating_sub(1),
                    Message::CopyRow => self.copy_selected_row(),
                    Message::Resize(_, height) => self.ui_height = height,
                    Message::Exit => (),
                },
                Modus::Popup => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(_, height) => self.ui_height = height,
                    Message::Exit | Message::Help => self.modus = Modus::Table,
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn show_help(&mut self) {
        self.modus = Modus::Popup;
    }

    fn edit(&mut self, key: KeyEvent, now: Instant) {
        match self.focus {
            Focus::Search => {
                if self.search.read(key) {
                    self.debouncer.schedule(InputSource::Search, now);
                }
            }
            Focus::FilterQuery(idx) => {
                if let Some(id) = self.filters.get(idx).map(|r| r.id())
                    && self.filters.edit_query(id, key)
                {
                    self.debouncer.schedule(InputSource::Filter(id), now);
                }
            }
            Focus::SearchColumn | Focus::FilterColumn(_) => {}
        }
    }

    /// Focus order: search, its column, then column and query of each filter row.
    fn focus_order(&self) -> Vec<Focus> {
        let mut order = vec![Focus::Search, Focus::SearchColumn];
        for idx in 0..self.filters.len() {
            order.push(Focus::FilterColumn(idx));
            order.push(Focus::FilterQuery(idx));
        }
        order
    }

    fn move_focus(&mut self, step: isize) {
        let order = self.focus_order();
        let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
        self.focus = order[(pos + step).rem_euclid(order.len() as isize) as usize];
        trace!("Focus {:?}", self.focus);
    }

    fn cycle_column(&mut self, forward: bool) {
        let step = |options: &ColumnOptions, current: &ColumnSelector| {
            if forward {
                options.next(current)
            } else {
                options.previous(current)
            }
        };
        match self.focus {
            Focus::SearchColumn => {
                self.search_column = step(&self.columns, &self.search_column);
                self.refresh();
            }
            Focus::FilterColumn(idx) => {
                if let Some(row) = self.filters.get(idx) {
                    let (id, column) = (row.id(), step(&self.columns, row.column()));
                    if self.filters.set_column(id, column) {
                        self.refresh();
                    }
                }
            }
            Focus::Search | Focus::FilterQuery(_) => {}
        }
    }

    fn remove_focused_filter(&mut self) {
        let idx = match self.focus {
            Focus::FilterColumn(idx) | Focus::FilterQuery(idx) => idx,
            Focus::Search | Focus::SearchColumn => return,
        };
        let Some(id) = self.filters.get(idx).map(|r| r.id()) else {
            return;
        };
        self.remove_filter_row(id);
        self.focus = if self.filters.is_empty() {
            Focus::Search
        } else {
            Focus::FilterQuery(idx.min(self.filters.len() - 1))
        };
    }

    fn page_height(&self) -> usize {
        let chrome = CONTROLS_HEIGHT + self.filters.len() + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT;
        self.ui_height.saturating_sub(chrome).max(1)
    }

    fn move_selection_up(&mut self, size: usize) {
        self.selected_row = self.selected_row.saturating_sub(size);
    }

    fn move_selection_down(&mut self, size: usize) {
        self.selected_row = (self.selected_row + size).min(self.row_count.saturating_sub(1));
    }

    /// The selected result row, formatted as a csv line.
    pub fn selected_row_csv(&self) -> Option<String> {
        let data = self.data.as_ref()?;
        let row = *self.visible.get(self.selected_row)?;
        let content = data
            .row(row)
            .into_iter()
            .map(wrap_cell_content)
            .collect::<Vec<String>>();
        Some(content.join(","))
    }

    fn copy_selected_row(&mut self) {
        let Some(row_content) = self.selected_row_csv() else {
            return;
        };
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Error opening clipboard: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return;
        };
        match clipboard.set_text(row_content) {
            Ok(_) => {
                info!("Copied row {} to clipboard.", self.selected_row + 1);
                self.set_status_message("Copied row to clipboard");
            }
            Err(e) => {
                error!("Error copying to clipboard: {e:?}");
                self.set_status_message("Clipboard unavailable");
            }
        }
    }

    // ---------------------------- UI accessors ---------------------------- //

    pub fn grid(&self) -> &Grid {
        self.renderer.grid()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn visible_rows(&self) -> &[usize] {
        &self.visible
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn search(&self) -> &Inputter {
        &self.search
    }

    pub fn search_column(&self) -> &ColumnSelector {
        &self.search_column
    }

    pub fn filters(&self) -> &FilterRows {
        &self.filters
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.data.as_ref().map_or("", |d| d.name())
    }

    pub fn popup_message(&self) -> Option<&str> {
        (self.modus == Modus::Popup).then_some(HELP_TEXT)
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }
}

/// Quote a cell for a csv line if it contains a separator, quote or line break.
fn wrap_cell_content(c: &str) -> String {
    let needs_wrapping = c.chars().any(|c| matches!(c, ',' | '"' | '\n' | '\r'))
        || c.starts_with(' ')
        || c.ends_with(' ');
    if needs_wrapping {
        format!("\"{}\"", c.replace('"', "\"\""))
    } else {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    use crate::render::{GridBody, NO_RESULTS};

    fn named(s: &str) -> ColumnSelector {
        ColumnSelector::Named(s.to_string())
    }

    fn model() -> Model {
        let mut model = Model::init(&SiftConfig::default(), 40);
        model.set_data(Dataset::from_records(
            "games",
            &["name", "year"],
            &[&["Chess", "1850"], &["Go", "-500"], &["Xiangqi", "800"]],
        ));
        model
    }

    fn type_text(model: &mut Model, text: &str, now: Instant) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update_at(Some(Message::Edit(key)), now).unwrap();
        }
    }

    #[test]
    fn shows_every_row_initially() {
        let model = model();
        assert_eq!(model.row_count(), 3);
        assert_eq!(model.visible_rows(), [0, 1, 2]);
        assert_eq!(model.grid().rows().len(), 3);
    }

    #[test]
    fn typing_is_debounced() {
        let mut model = model();
        let t0 = Instant::now();
        type_text(&mut model, "go", t0);
        assert_eq!(model.row_count(), 3);

        model.update_at(None, t0 + Duration::from_millis(100)).unwrap();
        assert_eq!(model.row_count(), 3);

        model.update_at(None, t0 + Duration::from_millis(180)).unwrap();
        assert_eq!(model.visible_rows(), [1]);
    }

    #[test]
    fn new_keystroke_restarts_the_window() {
        let mut model = model();
        let t0 = Instant::now();
        type_text(&mut model, "c", t0);
        type_text(&mut model, "h", t0 + Duration::from_millis(150));
        model.update_at(None, t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(model.row_count(), 3);
        model.update_at(None, t0 + Duration::from_millis(330)).unwrap();
        assert_eq!(model.visible_rows(), [0]);
    }

    #[test]
    fn toggles_apply_immediately() {
        let mut model = model();
        model.set_search(&FilterCondition::new(named("name"), "GO"));
        assert_eq!(model.visible_rows(), [1]);
        model.update(Some(Message::ToggleCaseSensitive)).unwrap();
        assert_eq!(model.row_count(), 0);
        assert_eq!(
            model.grid().body,
            GridBody::Placeholder(NO_RESULTS.to_string())
        );
    }

    #[test]
    fn regex_toggle() {
        let mut model = model();
        model.set_search(&FilterCondition::new(ColumnSelector::All, "^[0-9]{3}$"));
        assert_eq!(model.row_count(), 0);
        model.update(Some(Message::ToggleRegex)).unwrap();
        assert_eq!(model.visible_rows(), [2]);
    }

    #[test]
    fn search_column_scopes_the_query() {
        let mut model = model();
        model.set_search(&FilterCondition::new(ColumnSelector::All, "8"));
        assert_eq!(model.visible_rows(), [0, 2]);

        model.update(Some(Message::FocusNext)).unwrap();
        assert_eq!(model.focus(), Focus::SearchColumn);
        model.update(Some(Message::NextColumn)).unwrap();
        assert_eq!(model.search_column(), &named("name"));
        assert_eq!(model.row_count(), 0);
    }

    #[test]
    fn filter_rows_take_precedence_over_search() {
        let mut model = model();
        model.set_search(&FilterCondition::new(ColumnSelector::All, "chess"));
        assert_eq!(model.visible_rows(), [0]);
        model.add_filter_row(named("name"), "go");
        assert_eq!(model.visible_rows(), [1]);
    }

    #[test]
    fn match_mode_combines_filter_rows() {
        let mut model = model();
        model.add_filter_row(named("year"), "1850");
        model.add_filter_row(named("name"), "Go");
        assert_eq!(model.row_count(), 0);
        model.update(Some(Message::ToggleMatchMode)).unwrap();
        assert_eq!(model.mode(), MatchMode::Any);
        assert_eq!(model.visible_rows(), [0, 1]);
    }

    #[test]
    fn removing_a_filter_refreshes_immediately() {
        let mut model = model();
        let t0 = Instant::now();
        model.update_at(Some(Message::AddFilter), t0).unwrap();
        assert_eq!(model.focus(), Focus::FilterQuery(0));
        type_text(&mut model, "chess", t0);
        model.update_at(None, t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(model.visible_rows(), [0]);

        model.update_at(Some(Message::RemoveFilter), t0 + Duration::from_millis(300)).unwrap();
        assert!(model.filters().is_empty());
        assert_eq!(model.focus(), Focus::Search);
        assert_eq!(model.row_count(), 3);
    }

    #[test]
    fn removing_cancels_pending_edit() {
        let mut model = model();
        let t0 = Instant::now();
        model.update_at(Some(Message::AddFilter), t0).unwrap();
        type_text(&mut model, "go", t0);
        model.update_at(Some(Message::RemoveFilter), t0).unwrap();
        assert_eq!(model.poll_timeout(t0), Duration::from_millis(100));
    }

    #[test]
    fn filter_column_selector_applies_immediately() {
        let mut model = model();
        model.add_filter_row(ColumnSelector::All, "8");
        assert_eq!(model.visible_rows(), [0, 2]);
        model.update(Some(Message::FocusPrev)).unwrap();
        assert_eq!(model.focus(), Focus::FilterQuery(0));
        model.update(Some(Message::FocusPrev)).unwrap();
        assert_eq!(model.focus(), Focus::FilterColumn(0));
        model.update(Some(Message::PrevColumn)).unwrap();
        assert_eq!(model.filters().rows()[0].column(), &named("year"));
        assert_eq!(model.visible_rows(), [0, 2]);
        model.update(Some(Message::PrevColumn)).unwrap();
        assert_eq!(model.row_count(), 0);
    }

    #[test]
    fn reloading_keeps_valid_selectors() {
        let mut model = model();
        model.add_filter_row(named("name"), "");
        model.add_filter_row(named("year"), "");
        model.set_search(&FilterCondition::new(named("year"), ""));
        model.set_data(Dataset::from_records("other", &["name", "origin"], &[&["Go", "China"]]));
        assert_eq!(model.filters().rows()[0].column(), &named("name"));
        assert_eq!(model.filters().rows()[1].column(), &ColumnSelector::All);
        assert_eq!(model.search_column(), &ColumnSelector::All);
    }

    #[test]
    fn load_failure_is_shown_as_a_row() {
        let mut model = Model::init(&SiftConfig::default(), 40);
        model.load_data_file(Path::new("/definitely/not/here.csv"));
        assert_eq!(model.row_count(), 0);
        assert_eq!(
            model.grid().body,
            GridBody::Placeholder("Error loading CSV: file not found".to_string())
        );

        // Controls stay usable but do not change the body
        model.update(Some(Message::ToggleRegex)).unwrap();
        assert!(matches!(model.grid().body, GridBody::Placeholder(ref m) if m.starts_with("Error")));
    }

    #[test]
    fn selection_is_clamped_to_results() {
        let mut model = model();
        model.update(Some(Message::MoveEnd)).unwrap();
        assert_eq!(model.selected_row(), 2);
        model.update(Some(Message::MovePageDown)).unwrap();
        assert_eq!(model.selected_row(), 2);
        model.set_search(&FilterCondition::new(named("name"), "go"));
        assert_eq!(model.selected_row(), 0);
        model.update(Some(Message::MoveUp)).unwrap();
        assert_eq!(model.selected_row(), 0);
    }

    #[test]
    fn selected_row_as_csv() {
        let mut model = Model::init(&SiftConfig::default(), 40);
        model.set_data(Dataset::from_records(
            "t",
            &["a", "b", "c"],
            &[&["x", "1,5", "say \"hi\""]],
        ));
        assert_eq!(
            model.selected_row_csv().as_deref(),
            Some("x,\"1,5\",\"say \"\"hi\"\"\"")
        );
    }

    #[test]
    fn clipboard_is_opened_on_first_copy_only() {
        let mut model = model();
        assert!(model.clipboard.is_none());
        model.set_search(&FilterCondition::new(named("name"), "nothing matches"));
        model.update(Some(Message::CopyRow)).unwrap();
        assert!(model.clipboard.is_none());

        model.set_search(&FilterCondition::new(ColumnSelector::All, ""));
        model.update(Some(Message::CopyRow)).unwrap();
        // Without a display server there is no clipboard to keep
        if model.clipboard.is_some() {
            model.update(Some(Message::CopyRow)).unwrap();
            assert!(model.clipboard.is_some());
        } else {
            assert_eq!(model.status_message(), "Clipboard unavailable");
        }
    }

    #[test]
    fn help_popup_swallows_table_keys() {
        let mut model = model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.popup_message().is_some());
        model.update(Some(Message::ToggleRegex)).unwrap();
        assert!(!model.options().regex);
        model.update(Some(Message::Exit)).unwrap();
        assert!(model.popup_message().is_none());
    }

    #[test]
    fn quit_sets_status() {
        let mut model = model();
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::Quitting);
    }

    #[test]
    fn poll_timeout_shrinks_while_edits_are_pending() {
        let mut model = model();
        let t0 = Instant::now();
        assert_eq!(model.poll_timeout(t0), Duration::from_millis(100));
        type_text(&mut model, "x", t0);
        assert_eq!(
            model.poll_timeout(t0 + Duration::from_millis(150)),
            Duration::from_millis(30)
        );
    }
}
