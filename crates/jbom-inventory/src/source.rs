use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jbom_sch::component::{Property, normalize_field_name};
use jbom_sch::{InventoryItem, Warning};
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::table::{Table, TableError, read_table};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("{} has neither an IPN nor a Value column", .path.display())]
    NotAnInventory { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Ipn,
    Category,
    Value,
    Package,
    Description,
    Manufacturer,
    Mpn,
    Distributor,
    Dpn,
    Cost,
    Priority,
}

/// Normalized column names and the item field each one fills.
const COLUMN_ALIASES: &[(&str, Slot)] = &[
    ("ipn", Slot::Ipn),
    ("part_number", Slot::Ipn),
    ("internal_part_number", Slot::Ipn),
    ("category", Slot::Category),
    ("type", Slot::Category),
    ("value", Slot::Value),
    ("package", Slot::Package),
    ("description", Slot::Description),
    ("manufacturer", Slot::Manufacturer),
    ("mfg", Slot::Manufacturer),
    ("mpn", Slot::Mpn),
    ("mfgpn", Slot::Mpn),
    ("manufacturer_part_number", Slot::Mpn),
    ("distributor", Slot::Distributor),
    ("dpn", Slot::Dpn),
    ("distributor_part_number", Slot::Dpn),
    ("lcsc", Slot::Dpn),
    ("sku", Slot::Dpn),
    ("cost", Slot::Cost),
    ("price", Slot::Cost),
    ("unit_price", Slot::Cost),
    ("priority", Slot::Priority),
];

fn slot_for(column: &str) -> Option<Slot> {
    let normalized = normalize_field_name(column);
    let bare = normalized.strip_prefix("i:").unwrap_or(&normalized);
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == bare)
        .map(|(_, slot)| *slot)
}

fn parse_cost(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['$', '€', '£', '¥'])
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned).ok()
}

fn parse_priority(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    raw.parse::<u32>().ok().or_else(|| {
        let f = raw.parse::<f64>().ok()?;
        (f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as u32)
    })
}

/// Turn table rows into inventory items.
pub fn items_from_table(table: &Table, source: &str) -> Vec<InventoryItem> {
    let slots: HashMap<&str, Slot> = table
        .columns
        .iter()
        .filter_map(|c| slot_for(c).map(|s| (c.as_str(), s)))
        .collect();

    let mut items = Vec::with_capacity(table.rows.len());
    for (row_index, row) in table.rows.iter().enumerate() {
        let mut item = InventoryItem {
            source: source.to_string(),
            row: row_index,
            ..Default::default()
        };
        for column in &table.columns {
            let Some(value) = row.get(column).filter(|v| !v.is_empty()) else {
                continue;
            };
            let target = match slots.get(column.as_str()) {
                Some(Slot::Ipn) => &mut item.ipn,
                Some(Slot::Category) => &mut item.category,
                Some(Slot::Value) => &mut item.value,
                Some(Slot::Package) => &mut item.package,
                Some(Slot::Description) => &mut item.description,
                Some(Slot::Manufacturer) => &mut item.manufacturer,
                Some(Slot::Mpn) => &mut item.mpn,
                Some(Slot::Distributor) => &mut item.distributor,
                Some(Slot::Dpn) => &mut item.dpn,
                Some(Slot::Cost) => {
                    item.cost = parse_cost(value);
                    if item.cost.is_none() {
                        log::warn!("{}: ignoring unreadable cost {value:?}", item.location());
                    }
                    continue;
                }
                Some(Slot::Priority) => {
                    item.priority = parse_priority(value);
                    if item.priority.is_none() {
                        log::warn!("{}: ignoring unreadable priority {value:?}", item.location());
                    }
                    continue;
                }
                None => {
                    item.fields.insert(
                        normalize_field_name(column),
                        Property {
                            name: column.clone(),
                            value: value.clone(),
                        },
                    );
                    continue;
                }
            };
            if target.is_empty() {
                *target = value.clone();
            }
        }
        items.push(item);
    }
    items
}

fn load_source(path: &Path) -> Result<Vec<InventoryItem>, InventoryError> {
    let table = read_table(path)?;
    let has_key = table
        .columns
        .iter()
        .any(|c| matches!(slot_for(c), Some(Slot::Ipn | Slot::Value)));
    if !has_key {
        return Err(InventoryError::NotAnInventory {
            path: path.to_path_buf(),
        });
    }
    Ok(items_from_table(&table, &path.display().to_string()))
}

/// Read every inventory source in parallel, returning items in source order.
#[instrument(name = "load_inventories", skip_all)]
pub fn load_inventories(paths: &[PathBuf]) -> Result<Vec<InventoryItem>, InventoryError> {
    let loaded: Vec<_> = paths.par_iter().map(|p| load_source(p)).collect();
    let mut items = Vec::new();
    for (path, result) in paths.iter().zip(loaded) {
        let source_items = result?;
        log::debug!("Loaded {} items from {}", source_items.len(), path.display());
        items.extend(source_items);
    }
    Ok(items)
}

/// Items of all sources after conflict screening.
#[derive(Debug, Clone, Default)]
pub struct MergedInventory {
    /// Items visible to matching, in source order.
    pub items: Vec<InventoryItem>,
    /// Rows that share an IPN with an earlier row but describe another part.
    pub conflicts: Vec<InventoryItem>,
    pub warnings: Vec<Warning>,
}

/// Combine items from every source.
///
/// Rows sharing a non-empty IPN must agree on category, value and package.
/// A disagreeing row is reported once, kept aside in
/// [`MergedInventory::conflicts`] and hidden from matching; the first-seen
/// row stays authoritative. Rows that differ only in sourcing are kept.
pub fn merge_inventories(items: Vec<InventoryItem>) -> MergedInventory {
    let mut merged = MergedInventory::default();
    let mut first_by_ipn: HashMap<String, usize> = HashMap::new();

    for item in items {
        let ipn = item.ipn.trim().to_string();
        if ipn.is_empty() {
            merged.items.push(item);
            continue;
        }
        match first_by_ipn.get(&ipn) {
            None => {
                first_by_ipn.insert(ipn, merged.items.len());
                merged.items.push(item);
            }
            Some(&first) => {
                let reference = &merged.items[first];
                let differences = reference.attribute_differences(&item);
                if differences.is_empty() {
                    merged.items.push(item);
                    continue;
                }
                merged.warnings.push(Warning::InventoryConflict {
                    ipn,
                    first_source: reference.location(),
                    conflicting_source: item.location(),
                    differences,
                });
                merged.conflicts.push(item);
            }
        }
    }

    log::debug!(
        "Merged inventory: {} items, {} conflicts",
        merged.items.len(),
        merged.conflicts.len()
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::read_table_from;

    fn items(csv: &str) -> Vec<InventoryItem> {
        let table = read_table_from(csv.as_bytes(), b',').unwrap();
        items_from_table(&table, "inv.csv")
    }

    #[test]
    fn test_column_aliases() {
        let items = items(
            "Part Number,Type,Value,Package,MFG,MFGPN,Distributor,LCSC,Unit Price,Priority,Tolerance\n\
             RES-10K,Resistor,10K,0603,Yageo,RC0603FR-0710KL,LCSC,C25804,$0.0012,2,1%\n",
        );
        let item = &items[0];
        assert_eq!(item.ipn, "RES-10K");
        assert_eq!(item.category, "Resistor");
        assert_eq!(item.manufacturer, "Yageo");
        assert_eq!(item.mpn, "RC0603FR-0710KL");
        assert_eq!(item.dpn, "C25804");
        assert_eq!(item.cost, Some(Decimal::new(12, 4)));
        assert_eq!(item.priority, Some(2));
        assert_eq!(item.field("tolerance").as_deref(), Some("1%"));
        assert_eq!(item.location(), "inv.csv:1");
    }

    #[test]
    fn test_bad_numbers_are_ignored() {
        let items = items("IPN,Cost,Priority\nX,n/a,first\n");
        assert_eq!(items[0].cost, None);
        assert_eq!(items[0].priority, None);
        assert_eq!(parse_priority("3.0"), Some(3));
        assert_eq!(parse_cost(" € 1.50 "), Some(Decimal::new(150, 2)));
    }

    #[test]
    fn test_merge_conflicting_package() {
        let merged = merge_inventories(items(
            "IPN,Category,Value,Package,Distributor,Priority\n\
             X1,RES,10K,0603,LCSC,1\n\
             X1,RES,10k,0603,Digikey,2\n\
             X1,RES,10K,0805,Mouser,3\n\
             ,RES,1K,0603,,\n",
        ));
        assert_eq!(merged.items.len(), 3);
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].distributor, "Mouser");
        assert_eq!(
            merged.warnings,
            vec![Warning::InventoryConflict {
                ipn: "X1".to_string(),
                first_source: "inv.csv:1".to_string(),
                conflicting_source: "inv.csv:3".to_string(),
                differences: vec!["package".to_string()],
            }]
        );
    }

    #[test]
    fn test_load_inventories_in_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.tsv");
        std::fs::write(&a, "IPN,Value\nA1,1K\n").unwrap();
        std::fs::write(&b, "IPN\tValue\nB1\t2K\nB2\t3K\n").unwrap();

        let loaded = load_inventories(&[a, b.clone()]).unwrap();
        let ipns: Vec<&str> = loaded.iter().map(|i| i.ipn.as_str()).collect();
        assert_eq!(ipns, vec!["A1", "B1", "B2"]);
        assert_eq!(loaded[2].source, b.display().to_string());

        let bogus = dir.path().join("notes.csv");
        std::fs::write(&bogus, "Name,Comment\nfoo,bar\n").unwrap();
        let err = load_inventories(&[bogus]).unwrap_err();
        assert!(matches!(err, InventoryError::NotAnInventory { .. }));
    }
}
