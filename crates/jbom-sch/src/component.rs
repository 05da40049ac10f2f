use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::{ValueKind, format_value, parse_value};

/// Coarse part classification shared by schematic components and inventory rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Res,
    Cap,
    Ind,
    Led,
    Dio,
    Q,
    Ic,
    Con,
    Sw,
    Xtal,
    Fuse,
    Rly,
    Tp,
    Other,
}

impl Category {
    pub fn code(self) -> &'static str {
        match self {
            Self::Res => "RES",
            Self::Cap => "CAP",
            Self::Ind => "IND",
            Self::Led => "LED",
            Self::Dio => "DIO",
            Self::Q => "Q",
            Self::Ic => "IC",
            Self::Con => "CON",
            Self::Sw => "SW",
            Self::Xtal => "XTAL",
            Self::Fuse => "FUSE",
            Self::Rly => "RLY",
            Self::Tp => "TP",
            Self::Other => "OTHER",
        }
    }

    /// Interpret a category name as written in inventory sheets.
    ///
    /// Accepts codes (`RES`), words (`Resistor`, `capacitors`) and single
    /// designator letters (`R`, `C`). Unknown names map to [`Category::Other`].
    pub fn from_name(name: &str) -> Self {
        let lowered = name.trim().to_ascii_lowercase();
        let word = lowered.strip_suffix('s').filter(|w| w.len() > 2).unwrap_or(&lowered);
        match word {
            "res" | "resistor" | "r" => Self::Res,
            "cap" | "capacitor" | "c" => Self::Cap,
            "ind" | "inductor" | "l" | "ferrite" | "ferrite bead" | "fb" => Self::Ind,
            "led" => Self::Led,
            "dio" | "diode" | "d" => Self::Dio,
            "q" | "transistor" | "mosfet" | "fet" | "bjt" => Self::Q,
            "ic" | "u" | "mcu" | "chip" => Self::Ic,
            "con" | "conn" | "connector" | "j" | "p" => Self::Con,
            "sw" | "switch" => Self::Sw,
            "xtal" | "crystal" | "oscillator" | "resonator" | "y" => Self::Xtal,
            "fuse" | "f" | "polyfuse" => Self::Fuse,
            "rly" | "relay" | "k" => Self::Rly,
            "tp" | "testpoint" | "test point" => Self::Tp,
            _ => Self::Other,
        }
    }

    /// Category implied by a reference designator prefix (`R12` -> RES).
    pub fn from_reference(reference: &str) -> Self {
        let prefix: String = reference
            .trim_start_matches('#')
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        match prefix.to_ascii_uppercase().as_str() {
            "LED" => Self::Led,
            "IC" => Self::Ic,
            "CN" => Self::Con,
            "S" => Self::Sw,
            "X" => Self::Xtal,
            "FB" => Self::Ind,
            other => Self::from_name(other),
        }
    }

    /// Category implied by a library symbol id (`Device:C_Small` -> CAP).
    fn from_lib_id(lib_id: &str) -> Option<Self> {
        let symbol = lib_id.rsplit(':').next()?.to_ascii_lowercase();
        let head = symbol.split(['_', '-']).next()?;
        let category = match head {
            "r" | "resistor" => Self::Res,
            "c" | "cp" | "capacitor" => Self::Cap,
            "l" | "inductor" | "ferritebead" => Self::Ind,
            "led" => Self::Led,
            "d" | "diode" => Self::Dio,
            "q" => Self::Q,
            "crystal" | "resonator" => Self::Xtal,
            "fuse" | "polyfuse" => Self::Fuse,
            "conn" | "connector" => Self::Con,
            "sw" => Self::Sw,
            "relay" => Self::Rly,
            "testpoint" => Self::Tp,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lowercase a field name and turn separators into `_`, so `Manufacturer Part
/// Number`, `manufacturer-part-number` and `MANUFACTURER_PART_NUMBER` agree.
pub fn normalize_field_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// A named value keeping the name as the user wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

/// Field map keyed by [`normalize_field_name`].
pub type PropertyMap = BTreeMap<String, Property>;

/// Non-empty value of `name` in `map`, trying each spelling in order.
pub fn lookup_field<'a>(map: &'a PropertyMap, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        map.get(&normalize_field_name(name))
            .map(|p| p.value.trim())
            .filter(|v| !v.is_empty())
    })
}

/// Case-insensitive truthiness for flag-like fields (`DNP`, `Exclude from BOM`).
pub fn is_truthy(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    !v.is_empty() && !matches!(v.as_str(), "0" | "no" | "n" | "false" | "off")
}

static IMPERIAL_SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[_\-\s:])(01005|0201|0402|0603|0805|1008|1206|1210|1806|1812|2010|2512|2920)(?:[_\-\s]|$)")
        .unwrap()
});

static NAMED_PACKAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[_\s:])(SOT-?\d+(?:-\d+)?|SOD-?\d+[A-Z]*|SOIC-\d+|SSOP-\d+|TSSOP-\d+|MSOP-\d+|SOP-\d+|QFN-\d+|DFN-\d+|LQFP-\d+|TQFP-\d+|QFP-\d+|BGA-\d+|DIP-\d+|TO-\d+[A-Z]*(?:-\d+)?|SMA|SMB|SMC)(?:[_\s]|$)",
    )
    .unwrap()
});

/// Package name implied by a footprint: an imperial chip size (`0603`), a
/// standard package (`SOT-23`), or the footprint name without its library.
pub fn package_from_footprint(footprint: &str) -> String {
    let name = footprint.rsplit(':').next().unwrap_or(footprint).trim();
    if let Some(caps) = IMPERIAL_SIZE_RE.captures(name) {
        return caps[1].to_string();
    }
    if let Some(caps) = NAMED_PACKAGE_RE.captures(name) {
        return caps[1].to_ascii_uppercase();
    }
    name.to_string()
}

/// A schematic component after multi-unit consolidation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Component {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub lib_id: String,
    pub datasheet: String,
    pub description: String,
    /// Every other symbol property, including `I:`/`C:` prefixed fields.
    pub properties: PropertyMap,
    pub units: BTreeSet<i64>,
    pub dnp: bool,
    pub exclude_from_bom: bool,
    pub exclude_from_board: bool,
    /// Sheet file the component was found on.
    pub sheet: PathBuf,
}

impl Component {
    /// Power flags, power symbols and other `#` references have no physical part.
    pub fn is_virtual(&self) -> bool {
        self.reference.starts_with('#')
    }

    /// Non-empty property value, looked up by any spelling of `name`.
    pub fn property(&self, name: &str) -> Option<&str> {
        lookup_field(&self.properties, &[name])
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(
            normalize_field_name(name),
            Property {
                name: name.to_string(),
                value: value.into(),
            },
        );
    }

    /// Internal part number carried on the symbol, if the designer set one.
    pub fn ipn(&self) -> Option<&str> {
        lookup_field(&self.properties, &["IPN", "I:IPN"])
    }

    pub fn category(&self) -> Category {
        if let Some(name) = lookup_field(&self.properties, &["Category", "I:Category"]) {
            let category = Category::from_name(name);
            if category != Category::Other {
                return category;
            }
        }
        Category::from_lib_id(&self.lib_id).unwrap_or_else(|| Category::from_reference(&self.reference))
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        ValueKind::for_category(self.category())
    }

    /// Value in base SI units, for resistors, capacitors and inductors.
    pub fn numeric_value(&self) -> Option<f64> {
        parse_value(&self.value, self.value_kind()?)
    }

    /// Canonical value text: the normalized form when the value parses,
    /// the trimmed raw text otherwise.
    pub fn normalized_value(&self, eia: bool) -> String {
        match (self.value_kind(), self.numeric_value()) {
            (Some(kind), Some(v)) => format_value(v, kind, eia),
            _ => self.value.trim().to_string(),
        }
    }

    pub fn package(&self) -> String {
        lookup_field(&self.properties, &["Package", "C:Package"])
            .map(str::to_string)
            .unwrap_or_else(|| package_from_footprint(&self.footprint))
    }

    /// Value of a field for matching and output columns.
    ///
    /// Promoted fields are answered from their typed slots; everything else
    /// prefers the `C:`-prefixed spelling, then the plain one.
    pub fn field(&self, name: &str) -> Option<String> {
        let normalized = normalize_field_name(name);
        let bare = normalized.strip_prefix("c:").unwrap_or(&normalized);
        let promoted = match bare {
            "reference" => Some(self.reference.as_str()),
            "value" => Some(self.value.as_str()),
            "footprint" => Some(self.footprint.as_str()),
            "datasheet" => Some(self.datasheet.as_str()),
            "description" => Some(self.description.as_str()),
            "lib_id" => Some(self.lib_id.as_str()),
            _ => None,
        };
        if let Some(v) = promoted {
            return Some(v.trim().to_string()).filter(|v| !v.is_empty());
        }
        if bare == "package" {
            return Some(self.package()).filter(|p| !p.is_empty());
        }
        if bare == "category" {
            return Some(self.category().to_string());
        }
        let prefixed = format!("c:{bare}");
        lookup_field(&self.properties, &[prefixed.as_str(), bare]).map(str::to_string)
    }
}
