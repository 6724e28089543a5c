use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const DEFAULT_CSV_PATH: &str = "./afigames.csv";
pub const DEFAULT_DEBOUNCE_MS: u64 = 180;

pub const HELP_TEXT: &str = "\
Tab / Shift-Tab   move focus between inputs
Left / Right      cycle a focused column selector
Ctrl-N            add a filter row
Ctrl-D            remove the focused filter row
F2                toggle case sensitivity
F3                toggle regex mode
F4                toggle match mode (all / any)
Up / Down         move in the results
PgUp / PgDn       page through the results
Home / End        jump to first / last result
Ctrl-Y            copy the selected row as csv
F1                show this help
Esc               close popup
Ctrl-C / Ctrl-Q   quit";

#[derive(Debug)]
pub enum SiftError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    InvalidFilter(String),
    InvalidMatchMode(String),
}

impl fmt::Display for SiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiftError::IoError(e) => write!(f, "{e}"),
            SiftError::PolarsError(e) => write!(f, "{e}"),
            SiftError::LoadingFailed(reason) => write!(f, "{reason}"),
            SiftError::FileNotFound => write!(f, "file not found"),
            SiftError::PermissionDenied => write!(f, "permission denied"),
            SiftError::InvalidFilter(filter) => {
                write!(f, "invalid filter \"{filter}\", expected COLUMN=QUERY")
            }
            SiftError::InvalidMatchMode(mode) => {
                write!(f, "invalid match mode \"{mode}\", expected all or any")
            }
        }
    }
}

impl std::error::Error for SiftError {}

impl From<Error> for SiftError {
    fn from(err: Error) -> Self {
        SiftError::IoError(err)
    }
}

impl From<PolarsError> for SiftError {
    fn from(err: PolarsError) -> Self {
        SiftError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct SiftConfig {
    pub event_poll_time: u64,
    pub debounce_ms: u64,
    pub max_column_width: usize,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_column_width: 40,
        }
    }
}

/// Which part of the control panel receives keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Search,
    SearchColumn,
    FilterQuery(usize),
    FilterColumn(usize),
}

impl Focus {
    pub fn is_text_input(&self) -> bool {
        matches!(self, Focus::Search | Focus::FilterQuery(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    Exit,
    Help,
    Edit(KeyEvent),
    FocusNext,
    FocusPrev,
    NextColumn,
    PrevColumn,
    ToggleCaseSensitive,
    ToggleRegex,
    ToggleMatchMode,
    AddFilter,
    RemoveFilter,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    CopyRow,
    Resize(usize, usize),
}
