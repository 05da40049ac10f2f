use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use jbom_sch::Warning;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Tsv,
    /// Formatted console table
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// An explicit `--format` wins; otherwise the output file's extension decides,
/// and stdout gets CSV.
pub fn resolve_format(explicit: Option<OutputFormat>, output: Option<&Path>) -> Result<OutputFormat> {
    if let Some(format) = explicit {
        return Ok(format);
    }
    let Some(path) = output else {
        return Ok(OutputFormat::Csv);
    };
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        return Ok(OutputFormat::Json);
    }
    match jbom_inventory::table::delimiter_for(path)? {
        b'\t' => Ok(OutputFormat::Tsv),
        _ => Ok(OutputFormat::Csv),
    }
}

/// The `-o` file, or stdout.
pub fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Write headed rows as CSV, TSV or a console table.
pub fn write_rows<W: Write>(
    writer: W,
    format: OutputFormat,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<()> {
    match format {
        OutputFormat::Csv => jbom_inventory::write_records(writer, headers, rows, b',')?,
        OutputFormat::Tsv => jbom_inventory::write_records(writer, headers, rows, b'\t')?,
        OutputFormat::Table => jbom_sch::write_rows_table(writer, headers, rows)?,
        OutputFormat::Json => {
            let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .iter()
                .map(|cells| {
                    headers
                        .iter()
                        .cloned()
                        .zip(cells.iter().cloned().map(serde_json::Value::String))
                        .collect()
                })
                .collect();
            write_json(writer, &objects)?;
        }
    }
    Ok(())
}

pub fn write_json<W: Write, T: serde::Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{} {warning}", "Warning:".yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(None, None).unwrap(), OutputFormat::Csv);
        assert_eq!(
            resolve_format(None, Some(Path::new("out/bom.TSV"))).unwrap(),
            OutputFormat::Tsv
        );
        assert_eq!(
            resolve_format(None, Some(Path::new("bom.json"))).unwrap(),
            OutputFormat::Json
        );
        assert_eq!(
            resolve_format(Some(OutputFormat::Table), Some(Path::new("bom.csv"))).unwrap(),
            OutputFormat::Table
        );
        assert!(resolve_format(None, Some(Path::new("bom.xlsx"))).is_err());
    }

    #[test]
    fn test_write_rows_json() {
        let mut out = Vec::new();
        let headers = vec!["Ref".to_string(), "Qty".to_string()];
        write_rows(&mut out, OutputFormat::Json, &headers, &[vec!["R1".into(), "1".into()]]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, serde_json::json!([{ "Ref": "R1", "Qty": "1" }]));
    }
}
