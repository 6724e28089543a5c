use ratatui::crossterm::event::KeyEvent;
use tracing::debug;

use crate::columns::ColumnOptions;
use crate::filter::{ColumnSelector, FilterCondition};
use crate::inputter::Inputter;

pub type FilterId = u64;

/// One user editable filter: a column selector bound to a query input.
#[derive(Debug, Clone)]
pub struct FilterRow {
    id: FilterId,
    column: ColumnSelector,
    input: Inputter,
}

impl FilterRow {
    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn column(&self) -> &ColumnSelector {
        &self.column
    }

    pub fn input(&self) -> &Inputter {
        &self.input
    }

    /// The condition this row contributes, `None` while its query is blank.
    pub fn condition(&self) -> Option<FilterCondition> {
        let query = self.input.value().trim();
        if query.is_empty() {
            None
        } else {
            Some(FilterCondition::new(self.column.clone(), query))
        }
    }
}

/// Ordered list of dynamic filter rows.
#[derive(Debug, Default)]
pub struct FilterRows {
    rows: Vec<FilterRow>,
    next_id: FilterId,
}

impl FilterRows {
    pub fn add_filter_row(
        &mut self,
        options: &ColumnOptions,
        initial_column: ColumnSelector,
        initial_value: &str,
    ) -> FilterId {
        let id = self.next_id;
        self.next_id += 1;
        let column = options.resolve(&initial_column);
        debug!("Add filter row {id}: {} = {initial_value:?}", column.id());
        self.rows.push(FilterRow {
            id,
            column,
            input: Inputter::with_value(initial_value),
        });
        id
    }

    pub fn remove_filter_row(&mut self, id: FilterId) -> Option<FilterRow> {
        let pos = self.position(id)?;
        debug!("Remove filter row {id}");
        Some(self.rows.remove(pos))
    }

    pub fn rows(&self) -> &[FilterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FilterRow> {
        self.rows.get(index)
    }

    pub fn position(&self, id: FilterId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    pub fn set_column(&mut self, id: FilterId, column: ColumnSelector) -> bool {
        match self.rows.iter_mut().find(|r| r.id == id) {
            Some(row) if row.column != column => {
                row.column = column;
                true
            }
            _ => false,
        }
    }

    /// Forward an editing key to the query input of `id`.
    /// Returns true if the query text changed.
    pub fn edit_query(&mut self, id: FilterId, key: KeyEvent) -> bool {
        self.rows
            .iter_mut()
            .find(|r| r.id == id)
            .is_some_and(|row| row.input.read(key))
    }

    /// Conditions of all rows with a non blank query, in row order.
    pub fn conditions(&self) -> Vec<FilterCondition> {
        self.rows.iter().filter_map(FilterRow::condition).collect()
    }

    /// Re-point every selector at `options`, keeping choices that still exist.
    pub fn refresh_columns(&mut self, options: &ColumnOptions) {
        for row in self.rows.iter_mut() {
            row.column = options.resolve(&row.column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn named(s: &str) -> ColumnSelector {
        ColumnSelector::Named(s.to_string())
    }

    fn options() -> ColumnOptions {
        ColumnOptions::build(&["name", "year"])
    }

    #[test]
    fn defaults_to_wildcard_and_empty_query() {
        let mut rows = FilterRows::default();
        let id = rows.add_filter_row(&options(), ColumnSelector::All, "");
        let row = &rows.rows()[0];
        assert_eq!(row.id(), id);
        assert_eq!(row.column(), &ColumnSelector::All);
        assert_eq!(row.input().value(), "");
        assert!(rows.conditions().is_empty());
    }

    #[test]
    fn blank_queries_are_not_conditions() {
        let mut rows = FilterRows::default();
        rows.add_filter_row(&options(), named("name"), "   ");
        rows.add_filter_row(&options(), named("year"), " 1850 ");
        assert_eq!(
            rows.conditions(),
            vec![FilterCondition::new(named("year"), "1850")]
        );
    }

    #[test]
    fn unknown_initial_column_falls_back_to_wildcard() {
        let mut rows = FilterRows::default();
        rows.add_filter_row(&options(), named("nope"), "x");
        assert_eq!(rows.rows()[0].column(), &ColumnSelector::All);
    }

    #[test]
    fn remove_deletes_only_that_row() {
        let mut rows = FilterRows::default();
        let a = rows.add_filter_row(&options(), named("name"), "a");
        let b = rows.add_filter_row(&options(), named("name"), "b");
        assert!(rows.remove_filter_row(a).is_some());
        assert!(rows.remove_filter_row(a).is_none());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows()[0].id(), b);
    }

    #[test]
    fn ids_are_not_reused() {
        let mut rows = FilterRows::default();
        let a = rows.add_filter_row(&options(), ColumnSelector::All, "");
        rows.remove_filter_row(a);
        let b = rows.add_filter_row(&options(), ColumnSelector::All, "");
        assert_ne!(a, b);
    }

    #[test]
    fn edits_reach_the_right_row() {
        let mut rows = FilterRows::default();
        let a = rows.add_filter_row(&options(), named("name"), "");
        let b = rows.add_filter_row(&options(), named("year"), "");
        let key = KeyEvent::new(KeyCode::Char('7'), KeyModifiers::NONE);
        assert!(rows.edit_query(b, key));
        assert_eq!(rows.rows()[0].input().value(), "");
        assert_eq!(rows.rows()[1].input().value(), "7");
        assert!(!rows.edit_query(99, key));
        assert!(rows.set_column(a, named("year")));
        assert!(!rows.set_column(a, named("year")));
    }

    #[test]
    fn refresh_keeps_valid_and_resets_stale() {
        let mut rows = FilterRows::default();
        rows.add_filter_row(&options(), named("name"), "a");
        rows.add_filter_row(&options(), named("year"), "b");
        rows.refresh_columns(&ColumnOptions::build(&["name", "origin"]));
        assert_eq!(rows.rows()[0].column(), &named("name"));
        assert_eq!(rows.rows()[1].column(), &ColumnSelector::All);
    }
}
