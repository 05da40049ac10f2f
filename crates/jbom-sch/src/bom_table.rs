use std::io::{self, Write};

use comfy_table::{Cell, Color, Table};

use crate::bom::{Bom, BomField, MatchOutcome};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);
    table
}

/// Write plain rows as a console table.
pub fn write_rows_table<W: Write>(
    mut writer: W,
    headers: &[String],
    rows: &[Vec<String>],
) -> io::Result<()> {
    let mut table = new_table();
    table.set_header(headers);
    for row in rows {
        table.add_row(row);
    }
    writeln!(writer, "{table}")
}

impl Bom {
    /// Write the BOM as a formatted table, coloring references by match outcome.
    pub fn write_table<W: Write>(
        &self,
        mut writer: W,
        columns: &[(String, BomField)],
    ) -> io::Result<()> {
        let matched = self.rows.iter().any(|r| r.outcome.is_some());
        if matched {
            writeln!(writer, "Legend:")?;
            let mut legend = Table::new();
            legend.load_preset(comfy_table::presets::NOTHING);
            legend.set_content_arrangement(comfy_table::ContentArrangement::Disabled);
            legend.add_row(vec![
                Cell::new("■").fg(Color::Green),
                Cell::new("Exact IPN match"),
                Cell::new("  "),
                Cell::new("■").fg(Color::Yellow),
                Cell::new("Heuristic match"),
            ]);
            legend.add_row(vec![
                Cell::new("■").fg(Color::Magenta),
                Cell::new("Ambiguous match"),
                Cell::new("  "),
                Cell::new("■").fg(Color::Red),
                Cell::new("No inventory match"),
            ]);
            legend.add_row(vec![
                Cell::new("■").fg(Color::DarkGrey),
                Cell::new("DNP (Do Not Populate)"),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ]);
            writeln!(writer, "{legend}")?;
        }

        let mut table = new_table();
        table.set_header(columns.iter().map(|(header, _)| header.as_str()));

        for row in &self.rows {
            let color = if row.dnp {
                Some(Color::DarkGrey)
            } else {
                match row.outcome {
                    Some(MatchOutcome::Exact) => Some(Color::Green),
                    Some(MatchOutcome::Heuristic { .. }) => Some(Color::Yellow),
                    Some(MatchOutcome::Ambiguous { .. }) => Some(Color::Magenta),
                    Some(MatchOutcome::Unresolved) => Some(Color::Red),
                    None => None,
                }
            };

            let cells = columns.iter().map(|(_, field)| {
                let cell = Cell::new(row.render(field));
                // Only the designators carry the sourcing color; DNP greys the whole row
                match (color, field) {
                    (Some(Color::DarkGrey), _) => cell.fg(Color::DarkGrey),
                    (Some(c), BomField::Reference) => cell.fg(c),
                    _ => cell,
                }
            });
            table.add_row(cells.collect::<Vec<_>>());
        }

        writeln!(writer, "{table}")?;
        writeln!(
            writer,
            "{} rows, {} parts",
            self.len(),
            self.part_count()
        )
    }
}
