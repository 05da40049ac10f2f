//! Delimited-text tables (CSV/TSV) keyed by column name.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("unsupported table format '{extension}' for {}: use .csv or .tsv", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed table {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Row = BTreeMap<String, String>;

/// Column names in file order plus one map per data row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row given as cells in column order.
    pub fn push_cells<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row = self
            .columns
            .iter()
            .cloned()
            .zip(cells.into_iter().map(Into::into))
            .collect();
        self.rows.push(row);
    }

    /// Cells of every row in column order, for rendering.
    pub fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

/// Field delimiter for a table path: `,` for `.csv`, tab for `.tsv`/`.tab`.
pub fn delimiter_for(path: &Path) -> Result<u8, TableError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => Ok(b','),
        "tsv" | "tab" => Ok(b'\t'),
        _ => Err(TableError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

pub fn read_table(path: &Path) -> Result<Table, TableError> {
    let delimiter = delimiter_for(path)?;
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_table_from(file, delimiter).map_err(|source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a table from any reader.
///
/// Headers are trimmed and a leading UTF-8 byte order mark is dropped. Rows
/// whose cells are all empty are skipped; short rows leave trailing columns
/// empty. A repeated column name keeps its first non-empty value.
pub fn read_table_from<R: io::Read>(reader: R, delimiter: u8) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row = Row::new();
        for (column, cell) in columns.iter().zip(record.iter()) {
            if column.is_empty() {
                continue;
            }
            let cell = cell.trim();
            let slot = row.entry(column.clone()).or_default();
            if slot.is_empty() {
                *slot = cell.to_string();
            }
        }
        rows.push(row);
    }

    log::debug!("Read table with {} columns, {} rows", columns.len(), rows.len());
    Ok(Table { columns, rows })
}

pub fn write_table<W: io::Write>(writer: W, table: &Table, delimiter: u8) -> Result<(), csv::Error> {
    write_records(writer, &table.columns, &table.cells(), delimiter)
}

/// Write a header line and rows of cells; headers may repeat.
pub fn write_records<W: io::Write>(
    writer: W,
    headers: &[String],
    rows: &[Vec<String>],
    delimiter: u8,
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    writer.write_record(headers)?;
    for cells in rows {
        writer.write_record(cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a table to `path`, choosing the delimiter from its extension.
pub fn write_table_file(path: &Path, table: &Table) -> Result<(), TableError> {
    let delimiter = delimiter_for(path)?;
    let file = File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_table(file, table, delimiter).map_err(|source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    })
}
