use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::component::{Category, PropertyMap, lookup_field, normalize_field_name};
use crate::value::{ValueKind, parse_value, values_equal};

/// One purchasable part from an inventory source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Opaque internal part number; may be empty for unnumbered rows.
    pub ipn: String,
    pub category: String,
    pub value: String,
    pub package: String,
    pub description: String,
    pub manufacturer: String,
    pub mpn: String,
    pub distributor: String,
    pub dpn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    /// 1 is the most preferred source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Columns without a dedicated slot, keyed by normalized name.
    #[serde(skip_serializing_if = "PropertyMap::is_empty", default)]
    pub fields: PropertyMap,
    /// File the row came from.
    pub source: String,
    /// Zero-based data row within `source`.
    pub row: usize,
}

impl InventoryItem {
    pub fn category_code(&self) -> Category {
        Category::from_name(&self.category)
    }

    /// Sort key where a missing priority ranks after every explicit one.
    pub fn priority_rank(&self) -> u32 {
        self.priority.unwrap_or(u32::MAX)
    }

    /// `source:row` label for warnings and reports.
    pub fn location(&self) -> String {
        format!("{}:{}", self.source, self.row + 1)
    }

    pub fn numeric_value(&self) -> Option<f64> {
        parse_value(&self.value, ValueKind::for_category(self.category_code())?)
    }

    /// Value of a field by name; `I:` prefixes are accepted and ignored.
    pub fn field(&self, name: &str) -> Option<String> {
        let normalized = normalize_field_name(name);
        let bare = normalized.strip_prefix("i:").unwrap_or(&normalized);
        let promoted = match bare {
            "ipn" => Some(self.ipn.as_str()),
            "category" => Some(self.category.as_str()),
            "value" => Some(self.value.as_str()),
            "package" => Some(self.package.as_str()),
            "description" => Some(self.description.as_str()),
            "manufacturer" => Some(self.manufacturer.as_str()),
            "mpn" => Some(self.mpn.as_str()),
            "distributor" => Some(self.distributor.as_str()),
            "dpn" => Some(self.dpn.as_str()),
            _ => None,
        };
        if let Some(v) = promoted {
            return Some(v.trim().to_string()).filter(|v| !v.is_empty());
        }
        match bare {
            "cost" => self.cost.map(|c| c.normalize().to_string()),
            "priority" => self.priority.map(|p| p.to_string()),
            _ => {
                let prefixed = format!("i:{bare}");
                lookup_field(&self.fields, &[prefixed.as_str(), bare]).map(str::to_string)
            }
        }
    }

    /// Names of the electro-mechanical attributes that differ from `other`.
    ///
    /// Rows sharing an IPN must describe the same physical part; sourcing
    /// columns (distributor, cost, priority) may differ freely.
    pub fn attribute_differences(&self, other: &InventoryItem) -> Vec<String> {
        let mut differences = Vec::new();
        if self.category_code() != other.category_code() {
            differences.push("category".to_string());
        }
        let same_value = match (self.numeric_value(), other.numeric_value()) {
            (Some(a), Some(b)) => values_equal(a, b),
            _ => self.value.trim().eq_ignore_ascii_case(other.value.trim()),
        };
        if !same_value {
            differences.push("value".to_string());
        }
        if !self.package.trim().eq_ignore_ascii_case(other.package.trim()) {
            differences.push("package".to_string());
        }
        differences
    }
}
