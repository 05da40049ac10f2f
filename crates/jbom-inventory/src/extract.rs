//! Build inventory rows from a design's components.

use std::collections::{BTreeSet, HashMap};

use jbom_sch::component::Category;
use jbom_sch::{Component, InventoryItem, MatchOutcome, NaturalString};
use serde::Serialize;

use crate::matcher::{MatchConfig, match_component};
use crate::source::MergedInventory;
use crate::table::Table;

/// Columns of an extracted inventory, readable back by the inventory loader.
pub const INVENTORY_COLUMNS: [&str; 12] = [
    "IPN",
    "Category",
    "Value",
    "Package",
    "Description",
    "Manufacturer",
    "MPN",
    "Distributor",
    "DPN",
    "Cost",
    "Priority",
    "References",
];

/// One distinct part used by the design.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedPart {
    pub item: InventoryItem,
    /// Whether the IPN came from the schematic rather than being generated.
    pub ipn_from_design: bool,
    pub references: BTreeSet<NaturalString>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions<'a> {
    /// Skip parts that already resolve against this inventory.
    pub missing_from: Option<(&'a MergedInventory, &'a MatchConfig)>,
}

/// Part number for a part that has none: `<CATEGORY>_<VALUE>_<PACKAGE>`.
pub fn generate_ipn(category: Category, value: &str, package: &str) -> String {
    [category.code(), value, package]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join("-"))
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_uppercase()
}

fn first_field(components: &[&Component], name: &str) -> String {
    components
        .iter()
        .find_map(|c| c.field(name))
        .unwrap_or_default()
}

/// Group physical, in-BOM components into distinct parts.
///
/// Parts are keyed by category, normalized value and package and returned in
/// natural order of their first reference.
pub fn extract_parts(components: &[Component], options: &ExtractOptions<'_>) -> Vec<ExtractedPart> {
    let mut groups: Vec<(Vec<&Component>, Category, String, String)> = Vec::new();
    let mut index: HashMap<(Category, String, String), usize> = HashMap::new();

    for component in components {
        if component.is_virtual() || component.exclude_from_bom {
            continue;
        }
        let category = component.category();
        let value = component.normalized_value(true);
        let package = component.package();
        let key = (category, value.to_ascii_uppercase(), package.to_ascii_uppercase());
        match index.get(&key) {
            Some(&i) => groups[i].0.push(component),
            None => {
                index.insert(key, groups.len());
                groups.push((vec![component], category, value, package));
            }
        }
    }

    let mut parts: Vec<ExtractedPart> = Vec::with_capacity(groups.len());
    for (members, category, value, package) in groups {
        if let Some((inventory, config)) = options.missing_from {
            let visible: Vec<&InventoryItem> = inventory.items.iter().collect();
            let (found, _) = match_component(members[0], &visible, config, &config.rules());
            if found.outcome != MatchOutcome::Unresolved {
                log::debug!("{} already stocked", members[0].reference);
                continue;
            }
        }

        let design_ipn = members.iter().find_map(|c| c.ipn()).map(str::to_string);
        let ipn_from_design = design_ipn.is_some();
        let item = InventoryItem {
            ipn: design_ipn.unwrap_or_else(|| generate_ipn(category, &value, &package)),
            category: category.code().to_string(),
            value,
            package,
            description: first_field(&members, "description"),
            manufacturer: first_field(&members, "manufacturer"),
            mpn: first_field(&members, "mpn"),
            distributor: first_field(&members, "distributor"),
            dpn: first_field(&members, "dpn"),
            ..Default::default()
        };
        parts.push(ExtractedPart {
            item,
            ipn_from_design,
            references: members
                .iter()
                .map(|c| NaturalString::from(c.reference.as_str()))
                .collect(),
        });
    }

    parts.sort_by(|a, b| a.references.first().cmp(&b.references.first()));
    parts
}

/// Render extracted parts as an inventory table.
pub fn parts_table(parts: &[ExtractedPart]) -> Table {
    let mut table = Table::new(INVENTORY_COLUMNS);
    for part in parts {
        let item = &part.item;
        let references = part
            .references
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.push_cells([
            item.ipn.clone(),
            item.category.clone(),
            item.value.clone(),
            item.package.clone(),
            item.description.clone(),
            item.manufacturer.clone(),
            item.mpn.clone(),
            item.distributor.clone(),
            item.dpn.clone(),
            String::new(),
            String::new(),
            references,
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{items_from_table, merge_inventories};

    fn component(reference: &str, lib_id: &str, value: &str, footprint: &str) -> Component {
        Component {
            reference: reference.to_string(),
            lib_id: lib_id.to_string(),
            value: value.to_string(),
            footprint: footprint.to_string(),
            ..Default::default()
        }
    }

    fn design() -> Vec<Component> {
        let mut u1 = component("U1", "Amplifier_Operational:LM358", "LM358", "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm");
        u1.set_property("IPN", "IC-0007");
        u1.set_property("Manufacturer", "TI");
        let mut excluded = component("R9", "Device:R", "0", "Resistor_SMD:R_0603_1608Metric");
        excluded.exclude_from_bom = true;
        vec![
            component("R10", "Device:R", "10k", "Resistor_SMD:R_0603_1608Metric"),
            component("R2", "Device:R", "10K", "Resistor_SMD:R_0603_1608Metric"),
            component("C1", "Device:C", "100nF", "Capacitor_SMD:C_0402_1005Metric"),
            u1,
            component("#PWR01", "power:GND", "GND", ""),
            excluded,
        ]
    }

    #[test]
    fn test_extract_groups_and_ipns() {
        let parts = extract_parts(&design(), &ExtractOptions::default());
        let summary: Vec<(String, bool, String)> = parts
            .iter()
            .map(|p| {
                let refs: Vec<&str> = p.references.iter().map(|r| r.as_str()).collect();
                (p.item.ipn.clone(), p.ipn_from_design, refs.join(" "))
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("CAP_100N_0402".to_string(), false, "C1".to_string()),
                ("RES_10K0_0603".to_string(), false, "R2 R10".to_string()),
                ("IC-0007".to_string(), true, "U1".to_string()),
            ]
        );
        assert_eq!(parts[2].item.manufacturer, "TI");
        assert_eq!(parts[2].item.package, "SOIC-8");
    }

    #[test]
    fn test_missing_only() {
        let table = crate::table::read_table_from(
            "IPN,Category,Value,Package\nR-10K,RES,10K,0603\n".as_bytes(),
            b',',
        )
        .unwrap();
        let inventory = merge_inventories(items_from_table(&table, "inv.csv"));
        let config = MatchConfig::default();
        let options = ExtractOptions {
            missing_from: Some((&inventory, &config)),
        };
        let parts = extract_parts(&design(), &options);
        let ipns: Vec<&str> = parts.iter().map(|p| p.item.ipn.as_str()).collect();
        assert_eq!(ipns, vec!["CAP_100N_0402", "IC-0007"]);
    }

    #[test]
    fn test_parts_table_reads_back() {
        let parts = extract_parts(&design(), &ExtractOptions::default());
        let table = parts_table(&parts);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1]["References"], "R2, R10");

        let mut csv = Vec::new();
        crate::table::write_table(&mut csv, &table, b',').unwrap();
        insta::assert_snapshot!(String::from_utf8(csv).unwrap(), @r#"
        IPN,Category,Value,Package,Description,Manufacturer,MPN,Distributor,DPN,Cost,Priority,References
        CAP_100N_0402,CAP,100n,0402,,,,,,,,C1
        RES_10K0_0603,RES,10K0,0603,,,,,,,,"R2, R10"
        IC-0007,IC,LM358,SOIC-8,,TI,,,,,,U1
        "#);

        let items = items_from_table(&table, "extract.csv");
        assert_eq!(items[1].ipn, "RES_10K0_0603");
        assert_eq!(items[1].field("references").as_deref(), Some("R2, R10"));
    }

    #[test]
    fn test_generate_ipn() {
        assert_eq!(generate_ipn(Category::Led, "red", "0805"), "LED_RED_0805");
        assert_eq!(generate_ipn(Category::Con, "Conn 01x04", ""), "CON_CONN-01X04");
    }
}
