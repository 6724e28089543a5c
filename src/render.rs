use std::io::Write;

use crate::data::Dataset;
use crate::domain::SiftError;

pub const NO_RESULTS: &str = "No results";

/// Capability to display a filtered view of a dataset.
pub trait TableRenderer {
    /// Display `rows` of `data` and report how many rows were rendered.
    fn render(&mut self, data: &Dataset, rows: &[usize]) -> Result<usize, SiftError>;

    /// Replace the table body with a single message row.
    fn render_message(&mut self, headers: &[String], message: &str) -> Result<(), SiftError>;
}

pub fn count_text(nrows: usize) -> String {
    format!("{nrows} rows")
}

/// Cells are shown as literal text; line breaks become a glyph so a cell
/// never spans more than one line.
fn display_cell(value: &str) -> String {
    value.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridBody {
    Rows(Vec<Vec<String>>),
    /// A single row spanning all columns.
    Placeholder(String),
}

/// Display projection of a filtered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub headers: Vec<String>,
    pub body: GridBody,
}

impl Default for Grid {
    fn default() -> Self {
        Grid::message(&[], NO_RESULTS)
    }
}

impl Grid {
    pub fn project(data: &Dataset, rows: &[usize]) -> Self {
        let headers = data.headers().to_vec();
        let body = if rows.is_empty() {
            GridBody::Placeholder(NO_RESULTS.to_string())
        } else {
            GridBody::Rows(
                rows.iter()
                    .map(|&r| data.row(r).into_iter().map(display_cell).collect())
                    .collect(),
            )
        };
        Grid { headers, body }
    }

    pub fn message(headers: &[String], message: &str) -> Self {
        Grid {
            headers: headers.to_vec(),
            body: GridBody::Placeholder(display_cell(message)),
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.body {
            GridBody::Rows(rows) => rows.len(),
            GridBody::Placeholder(_) => 0,
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        match &self.body {
            GridBody::Rows(rows) => rows,
            GridBody::Placeholder(_) => &[],
        }
    }

    /// Widest cell per column, header included, capped at `max_width`.
    pub fn column_widths(&self, max_width: usize) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(cidx, h)| {
                let widest = self
                    .rows()
                    .iter()
                    .filter_map(|r| r.get(cidx))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0);
                widest.min(max_width)
            })
            .collect()
    }
}

/// Keeps the last projected grid for the terminal ui to draw.
#[derive(Debug, Default)]
pub struct GridRenderer {
    grid: Grid,
}

impl GridRenderer {
    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl TableRenderer for GridRenderer {
    fn render(&mut self, data: &Dataset, rows: &[usize]) -> Result<usize, SiftError> {
        self.grid = Grid::project(data, rows);
        Ok(self.grid.row_count())
    }

    fn render_message(&mut self, headers: &[String], message: &str) -> Result<(), SiftError> {
        self.grid = Grid::message(headers, message);
        Ok(())
    }
}

/// Writes an aligned plain text table, followed by the row count.
pub struct TextRenderer<W: Write> {
    out: W,
    max_column_width: usize,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, max_column_width: usize) -> Self {
        Self {
            out,
            max_column_width,
        }
    }

    fn write_line(&mut self, cells: &[String], widths: &[usize]) -> Result<(), SiftError> {
        let line = cells
            .iter()
            .zip(widths)
            .map(|(c, &w)| {
                let cell: String = c.chars().take(w).collect();
                format!("{cell:<w$}")
            })
            .collect::<Vec<String>>()
            .join(" | ");
        writeln!(self.out, "{}", line.trim_end())?;
        Ok(())
    }

    fn write_grid(&mut self, grid: &Grid) -> Result<(), SiftError> {
        let widths = grid.column_widths(self.max_column_width);
        self.write_line(&grid.headers, &widths)?;
        let rule = widths
            .iter()
            .map(|&w| "-".repeat(w))
            .collect::<Vec<String>>()
            .join("-+-");
        writeln!(self.out, "{rule}")?;
        match &grid.body {
            GridBody::Rows(rows) => {
                for row in rows {
                    self.write_line(row, &widths)?;
                }
            }
            GridBody::Placeholder(message) => writeln!(self.out, "{message}")?,
        }
        writeln!(self.out, "{}", count_text(grid.row_count()))?;
        Ok(())
    }
}

impl<W: Write> TableRenderer for TextRenderer<W> {
    fn render(&mut self, data: &Dataset, rows: &[usize]) -> Result<usize, SiftError> {
        let grid = Grid::project(data, rows);
        self.write_grid(&grid)?;
        Ok(grid.row_count())
    }

    fn render_message(&mut self, headers: &[String], message: &str) -> Result<(), SiftError> {
        self.write_grid(&Grid::message(headers, message))
    }
}
