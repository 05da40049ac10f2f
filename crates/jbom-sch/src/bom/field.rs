use crate::component::normalize_field_name;

use super::core::BomRow;

/// A named BOM output column.
///
/// `I:<name>` reads an inventory field of the matched item, `C:<name>` a
/// component property; any other unknown key is treated like `C:<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BomField {
    Reference,
    Quantity,
    Value,
    Footprint,
    Package,
    Category,
    Description,
    Ipn,
    Manufacturer,
    Mpn,
    Distributor,
    Dpn,
    Cost,
    Dnp,
    Match,
    Datasheet,
    Inventory(String),
    Component(String),
}

impl BomField {
    pub const DEFAULT: [(&'static str, &'static str); 9] = [
        ("Reference", "reference"),
        ("Quantity", "quantity"),
        ("Value", "value"),
        ("Footprint", "footprint"),
        ("Description", "description"),
        ("IPN", "ipn"),
        ("Manufacturer", "manufacturer"),
        ("MPN", "mpn"),
        ("DNP", "dnp"),
    ];

    pub fn from_key(key: &str) -> Self {
        let trimmed = key.trim();
        if let Some(name) = strip_prefix_ci(trimmed, "i:") {
            return BomField::Inventory(name.to_string());
        }
        if let Some(name) = strip_prefix_ci(trimmed, "c:") {
            return BomField::Component(name.to_string());
        }
        match normalize_field_name(trimmed).as_str() {
            "reference" | "references" | "designator" | "designators" | "ref" => BomField::Reference,
            "quantity" | "qty" => BomField::Quantity,
            "value" | "comment" => BomField::Value,
            "footprint" => BomField::Footprint,
            "package" => BomField::Package,
            "category" | "type" => BomField::Category,
            "description" => BomField::Description,
            "ipn" => BomField::Ipn,
            "manufacturer" | "mfg" => BomField::Manufacturer,
            "mpn" | "manufacturer_part_number" => BomField::Mpn,
            "distributor" => BomField::Distributor,
            "dpn" | "distributor_part_number" | "lcsc" => BomField::Dpn,
            "cost" | "price" | "unit_price" => BomField::Cost,
            "dnp" => BomField::Dnp,
            "match" => BomField::Match,
            "datasheet" => BomField::Datasheet,
            _ => BomField::Component(trimmed.to_string()),
        }
    }

    pub(super) fn render(&self, row: &BomRow) -> String {
        let item_field = |name: &str| row.item.as_ref().and_then(|i| i.field(name));
        let text = match self {
            BomField::Reference => Some(row.references_joined()),
            BomField::Quantity => Some(row.quantity.to_string()),
            BomField::Value => Some(row.value.clone()),
            BomField::Footprint => Some(row.footprint.clone()),
            BomField::Package => item_field("package").or_else(|| Some(row.package.clone())),
            BomField::Category => Some(row.category.to_string()),
            BomField::Description => Some(row.description.clone()),
            BomField::Ipn => row.ipn.clone(),
            BomField::Datasheet => Some(row.datasheet.clone()),
            // Sourcing columns fall back to what the schematic carried
            BomField::Manufacturer => {
                item_field("manufacturer").or_else(|| row.component_field("manufacturer"))
            }
            BomField::Mpn => item_field("mpn").or_else(|| row.component_field("mpn")),
            BomField::Distributor => {
                item_field("distributor").or_else(|| row.component_field("distributor"))
            }
            BomField::Dpn => item_field("dpn"),
            BomField::Cost => item_field("cost"),
            BomField::Dnp => row.dnp.then(|| "DNP".to_string()),
            BomField::Match => row.outcome.map(|o| o.to_string()),
            BomField::Inventory(name) => item_field(name),
            BomField::Component(name) => row.component_field(name),
        };
        text.unwrap_or_default()
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_aliases() {
        assert_eq!(BomField::from_key("Qty"), BomField::Quantity);
        assert_eq!(BomField::from_key("Designator"), BomField::Reference);
        assert_eq!(BomField::from_key("LCSC"), BomField::Dpn);
        assert_eq!(
            BomField::from_key("I:Voltage"),
            BomField::Inventory("Voltage".to_string())
        );
        assert_eq!(
            BomField::from_key("c:Tolerance"),
            BomField::Component("Tolerance".to_string())
        );
        assert_eq!(
            BomField::from_key("Tolerance"),
            BomField::Component("Tolerance".to_string())
        );
    }
}
