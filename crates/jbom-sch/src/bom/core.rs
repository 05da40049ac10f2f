use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{Category, Component};
use crate::inventory::InventoryItem;
use crate::natural_string::NaturalString;

use super::field::BomField;

/// How a component's inventory item was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The component carried an IPN present in the inventory.
    Exact,
    Heuristic { confidence: u8 },
    /// Several distinct IPNs tied; the most preferred one was picked anyway.
    Ambiguous { confidence: u8 },
    Unresolved,
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOutcome::Exact => f.write_str("exact"),
            MatchOutcome::Heuristic { confidence } => write!(f, "heuristic ({confidence})"),
            MatchOutcome::Ambiguous { confidence } => write!(f, "ambiguous ({confidence})"),
            MatchOutcome::Unresolved => f.write_str("unresolved"),
        }
    }
}

/// The inventory decision for one component reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<InventoryItem>,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomOptions {
    /// Keep do-not-populate parts, marked as DNP.
    pub include_dnp: bool,
    /// Keep parts flagged "exclude from BOM".
    pub include_excluded: bool,
    /// Keep `#` references (power symbols, flags).
    pub include_virtual: bool,
}

impl BomOptions {
    /// Whether `component` belongs in the BOM under these options.
    pub fn keeps(&self, component: &Component) -> bool {
        (self.include_virtual || !component.is_virtual())
            && (self.include_excluded || !component.exclude_from_bom)
            && (self.include_dnp || !component.dnp)
    }
}

/// One purchasable line of the BOM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomRow {
    pub references: BTreeSet<NaturalString>,
    pub quantity: usize,
    pub value: String,
    pub footprint: String,
    pub package: String,
    pub category: Category,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datasheet: String,
    /// IPN of the matched item, else whatever the schematic carried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<InventoryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dnp: bool,
    #[serde(skip)]
    pub components: Vec<Component>,
}

impl BomRow {
    pub fn first_reference(&self) -> &str {
        self.references.iter().next().map(NaturalString::as_str).unwrap_or("")
    }

    pub fn references_joined(&self) -> String {
        self.references
            .iter()
            .map(NaturalString::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First non-empty value of a component field among the grouped parts.
    pub fn component_field(&self, name: &str) -> Option<String> {
        self.components.iter().find_map(|c| c.field(name))
    }

    pub fn render(&self, field: &BomField) -> String {
        field.render(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Item {
        ipn: String,
        source: Option<(String, usize)>,
        dnp: bool,
    },
    Spec {
        category: Category,
        value: String,
        footprint: String,
        ipn: Option<String>,
        dnp: bool,
    },
}

fn group_key(component: &Component, item: Option<&InventoryItem>) -> GroupKey {
    match item {
        Some(item) if !item.ipn.trim().is_empty() => GroupKey::Item {
            ipn: item.ipn.clone(),
            source: None,
            dnp: component.dnp,
        },
        // Unnumbered inventory rows are identified by where they came from.
        Some(item) => GroupKey::Item {
            ipn: String::new(),
            source: Some((item.source.clone(), item.row)),
            dnp: component.dnp,
        },
        None => GroupKey::Spec {
            category: component.category(),
            value: component.normalized_value(false).to_ascii_uppercase(),
            footprint: component.footprint.clone(),
            ipn: component.ipn().map(str::to_string),
            dnp: component.dnp,
        },
    }
}

/// Grouped bill of materials.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bom {
    pub rows: Vec<BomRow>,
}

impl Bom {
    /// Group components into purchasable rows.
    ///
    /// `assignments` maps reference designators to inventory decisions;
    /// components without one are grouped by category, value and footprint.
    pub fn build(
        components: &[Component],
        assignments: &HashMap<String, Assignment>,
        options: &BomOptions,
    ) -> Self {
        let mut rows: Vec<BomRow> = Vec::new();
        let mut index: HashMap<GroupKey, usize> = HashMap::new();

        for component in components.iter().filter(|c| options.keeps(c)) {
            let assignment = assignments.get(&component.reference);
            let item = assignment.and_then(|a| a.item.as_ref());
            let key = group_key(component, item);

            if let Some(&i) = index.get(&key) {
                let row = &mut rows[i];
                log::debug!(
                    "Grouping {} with {} ({})",
                    component.reference,
                    row.first_reference(),
                    row.value
                );
                row.references.insert(NaturalString::from(component.reference.as_str()));
                row.components.push(component.clone());
                row.quantity = row.references.len();
                continue;
            }

            let ipn = item
                .map(|i| i.ipn.trim())
                .filter(|ipn| !ipn.is_empty())
                .or_else(|| component.ipn())
                .map(str::to_string);
            let description = item
                .map(|i| i.description.trim())
                .filter(|d| !d.is_empty())
                .unwrap_or(component.description.trim())
                .to_string();

            index.insert(key, rows.len());
            rows.push(BomRow {
                references: BTreeSet::from([NaturalString::from(component.reference.as_str())]),
                quantity: 1,
                value: component.value.trim().to_string(),
                footprint: component.footprint.clone(),
                package: component.package(),
                category: component.category(),
                description,
                datasheet: component.datasheet.clone(),
                ipn,
                item: item.cloned(),
                outcome: assignment.map(|a| a.outcome),
                dnp: component.dnp,
                components: vec![component.clone()],
            });
        }

        // Non-DNP first, then by first reference
        rows.sort_by(|a, b| {
            a.dnp
                .cmp(&b.dnp)
                .then_with(|| natord::compare(a.first_reference(), b.first_reference()))
        });

        log::debug!("Built BOM with {} rows", rows.len());
        Bom { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of placed parts across all rows.
    pub fn part_count(&self) -> usize {
        self.rows.iter().map(|r| r.quantity).sum()
    }

    /// Render the given `(header, field)` columns as text cells.
    pub fn render(&self, columns: &[(String, BomField)]) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| columns.iter().map(|(_, field)| row.render(field)).collect())
            .collect()
    }

    /// Rows as JSON objects keyed by column header.
    pub fn to_json(&self, columns: &[(String, BomField)]) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object: BTreeMap<&str, String> = columns
                    .iter()
                    .map(|(header, field)| (header.as_str(), row.render(field)))
                    .collect();
                serde_json::json!(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}
