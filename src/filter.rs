use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use rayon::prelude::*;
use tracing::trace;

use crate::data::Dataset;
use crate::domain::SiftError;
use crate::matcher::{MatchOptions, Matcher, build_matcher};

pub const ALL_COLUMNS_ID: &str = "__all__";
pub const ALL_COLUMNS_LABEL: &str = "All columns";

/// Column scope of a filter condition.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub enum ColumnSelector {
    #[default]
    All,
    Named(String),
}

impl ColumnSelector {
    /// Parse the textual id used on the command line, `__all__` is the wildcard.
    pub fn from_id(id: &str) -> Self {
        if id == ALL_COLUMNS_ID {
            ColumnSelector::All
        } else {
            ColumnSelector::Named(id.to_string())
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ColumnSelector::All => ALL_COLUMNS_ID,
            ColumnSelector::Named(name) => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ColumnSelector::All => ALL_COLUMNS_LABEL,
            ColumnSelector::Named(name) => name,
        }
    }
}

/// How the conditions of a filter set combine per row.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every condition has to match.
    #[default]
    All,
    /// At least one condition has to match.
    Any,
}

impl MatchMode {
    pub fn toggle(self) -> Self {
        match self {
            MatchMode::All => MatchMode::Any,
            MatchMode::Any => MatchMode::All,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::All => write!(f, "all"),
            MatchMode::Any => write!(f, "any"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "and" => Ok(MatchMode::All),
            "any" | "or" => Ok(MatchMode::Any),
            _ => Err(SiftError::InvalidMatchMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub column: ColumnSelector,
    pub query: String,
}

impl FilterCondition {
    pub fn new(column: ColumnSelector, query: impl Into<String>) -> Self {
        Self {
            column,
            query: query.into(),
        }
    }
}

impl FromStr for FilterCondition {
    type Err = SiftError;

    /// `COLUMN=QUERY`, splitting at the first `=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, query) = s
            .split_once('=')
            .ok_or_else(|| SiftError::InvalidFilter(s.to_string()))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(SiftError::InvalidFilter(s.to_string()));
        }
        Ok(FilterCondition::new(ColumnSelector::from_id(column), query))
    }
}

enum Scope {
    Every,
    Column(usize),
    Missing,
}

/// A condition with its matcher built and its column resolved.
struct CompiledCondition {
    scope: Scope,
    matcher: Matcher,
}

impl CompiledCondition {
    fn compile(data: &Dataset, condition: &FilterCondition, options: MatchOptions) -> Self {
        let scope = match &condition.column {
            ColumnSelector::All => Scope::Every,
            ColumnSelector::Named(name) => data
                .column_index(name)
                .map_or(Scope::Missing, Scope::Column),
        };
        Self {
            scope,
            matcher: build_matcher(&condition.query, options),
        }
    }

    fn matches(&self, data: &Dataset, row: usize) -> bool {
        match self.scope {
            Scope::Every => {
                (0..data.headers().len()).any(|cidx| self.matcher.matches(data.cell(row, cidx)))
            }
            Scope::Column(cidx) => self.matcher.matches(data.cell(row, cidx)),
            Scope::Missing => self.matcher.matches(None),
        }
    }
}

/// Indices of the rows of `data` that pass the filter set, in source order.
///
/// Without `conditions` the single `fallback` condition (the primary search
/// box) is used; if its query is empty every row passes.
pub fn evaluate(
    data: &Dataset,
    conditions: &[FilterCondition],
    fallback: &FilterCondition,
    options: MatchOptions,
    mode: MatchMode,
) -> Vec<usize> {
    if conditions.is_empty() && fallback.query.is_empty() {
        return (0..data.nrows()).collect();
    }
    let start_time = Instant::now();

    let active = if conditions.is_empty() {
        std::slice::from_ref(fallback)
    } else {
        conditions
    };
    let compiled: Vec<CompiledCondition> = active
        .iter()
        .map(|c| CompiledCondition::compile(data, c, options))
        .collect();

    let rows: Vec<usize> = (0..data.nrows())
        .into_par_iter()
        .filter(|&row| match mode {
            MatchMode::All => compiled.iter().all(|c| c.matches(data, row)),
            MatchMode::Any => compiled.iter().any(|c| c.matches(data, row)),
        })
        .collect();

    trace!(
        "Evaluated {} condition(s) ({mode}) over {} rows: {} match in {}ms",
        compiled.len(),
        data.nrows(),
        rows.len(),
        start_time.elapsed().as_millis()
    );
    rows
}
