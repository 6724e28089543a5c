use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::domain::SiftError;

pub struct Column {
    name: String,
    max_width: usize,
    data: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data: Vec<String>) -> Self {
        let max_width = data.iter().map(|s| s.chars().count()).max().unwrap_or(0);
        Column {
            name: name.into(),
            max_width,
            data,
        }
    }

    pub fn as_string(&self) -> String {
        format!(
            "\"{}\", width_max: {}, # rows {}",
            self.name,
            self.max_width,
            self.data.len(),
        )
    }
}

/// Immutable, column-wise store of a parsed csv file.
///
/// Rows keep the order of the source file and are addressed by index.
pub struct Dataset {
    name: String,
    headers: Vec<String>,
    columns: Vec<Column>,
    nrows: usize,
}

impl Dataset {
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let nrows = columns.iter().map(|c| c.data.len()).max().unwrap_or(0);
        let headers = columns.iter().map(|c| c.name.clone()).collect();
        Dataset {
            name: name.into(),
            headers,
            columns,
            nrows,
        }
    }

    /// Build a dataset from row records, used for small in-memory tables.
    pub fn from_records(
        name: impl Into<String>,
        headers: &[&str],
        records: &[&[&str]],
    ) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(cidx, h)| {
                let data = records
                    .iter()
                    .map(|r| r.get(cidx).copied().unwrap_or("").to_string())
                    .collect();
                Column::new(*h, data)
            })
            .collect();
        Dataset::from_columns(name, columns)
    }

    #[instrument]
    pub fn load(path: &Path) -> Result<Self, SiftError> {
        check_file(path)?;
        let start_time = Instant::now();

        let raw = fs::read(path)?;
        let df = Self::parse_csv(raw)?;

        // Each column is converted in its own thread.
        let columns = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect::<Result<Vec<Column>, PolarsError>>()?;

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        let dataset = Dataset::from_columns(name, columns);

        let loading_duration = start_time.elapsed().as_millis();
        info!(
            "Loaded {} rows x {} columns in {loading_duration}ms",
            dataset.nrows(),
            dataset.headers.len()
        );
        for c in dataset.columns.iter() {
            debug!("Column: {}", c.as_string());
        }
        Ok(dataset)
    }

    fn parse_csv(raw: Vec<u8>) -> Result<DataFrame, SiftError> {
        let text = String::from_utf8(raw)
            .map_err(|e| SiftError::LoadingFailed(format!("file is not valid utf-8: {e}")))?;
        let text = skip_empty_lines(&text);
        if text.is_empty() {
            return Err(SiftError::LoadingFailed("file is empty".into()));
        }

        // An inference length of zero reads every column as text.
        // Extra fields on a record are cut off instead of failing the file.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
            .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
            .finish()?;
        Ok(df)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Column, PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        let data = series
            .into_iter()
            .map(|value| value.unwrap_or_default().to_string())
            .collect();
        Ok(Column::new(col_name, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `row` in column `cidx`, `None` when absent.
    pub fn cell(&self, row: usize, cidx: usize) -> Option<&str> {
        self.columns
            .get(cidx)
            .and_then(|c| c.data.get(row))
            .map(String::as_str)
    }

    /// Cell at `row` in the column called `column`.
    #[cfg(test)]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        self.column_index(column).and_then(|cidx| self.cell(row, cidx))
    }

    pub fn row(&self, row: usize) -> Vec<&str> {
        (0..self.columns.len())
            .map(|cidx| self.cell(row, cidx).unwrap_or(""))
            .collect()
    }
}

fn check_file(path: &Path) -> Result<(), SiftError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SiftError::FileNotFound,
        ErrorKind::PermissionDenied => SiftError::PermissionDenied,
        _ => SiftError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(SiftError::LoadingFailed("Not a file!".into()));
    }
    Ok(())
}

/// Drop empty records. Line breaks inside quoted fields are kept verbatim,
/// and a line holding only whitespace is a record of its own.
fn skip_empty_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line = String::new();
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                line.push(c);
            }
            '\n' if !in_quotes => {
                if !line.trim_end_matches('\r').is_empty() {
                    out.push_str(&line);
                    out.push('\n');
                }
                line.clear();
            }
            _ => line.push(c),
        }
    }
    if !line.trim_end_matches('\r').is_empty() {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, SiftError> {
    let expanded = shellexpand::full(path)
        .map_err(|e| SiftError::LoadingFailed(format!("cannot expand {path}: {e}")))?;
    Ok(PathBuf::from(expanded.into_owned()))
}
