//! `jbom.toml`: matching knobs and fabricator presets.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jbom_inventory::MatchConfig;
use jbom_sch::{BomField, PosColumn};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "jbom.toml";

/// `(header, field key)` pairs as written in the config file.
pub type ColumnSpec = Vec<(String, String)>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingSection {
    pub min_confidence: Option<u8>,
    /// Merged over the built-in weights; 0 disables a field.
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FabricatorConfig {
    pub distributor: Option<String>,
    pub bom_columns: Option<ColumnSpec>,
    pub pos_columns: Option<ColumnSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JbomConfig {
    #[serde(default)]
    pub matching: MatchingSection,
    #[serde(default)]
    pub fabricators: BTreeMap<String, FabricatorConfig>,
}

fn columns(pairs: &[(&str, &str)]) -> ColumnSpec {
    pairs
        .iter()
        .map(|(header, key)| (header.to_string(), key.to_string()))
        .collect()
}

const FABRICATOR_POS: [(&str, &str); 5] = [
    ("Designator", "reference"),
    ("Mid X", "x"),
    ("Mid Y", "y"),
    ("Layer", "side"),
    ("Rotation", "rotation"),
];

/// Presets shipped with jbom; a config entry of the same name replaces them.
pub fn builtin_fabricator(name: &str) -> Option<FabricatorConfig> {
    let fabricator = match name {
        "generic" => FabricatorConfig::default(),
        "jlc" | "jlcpcb" => FabricatorConfig {
            distributor: Some("LCSC".to_string()),
            bom_columns: Some(columns(&[
                ("Comment", "value"),
                ("Designator", "reference"),
                ("Footprint", "package"),
                ("LCSC Part #", "dpn"),
            ])),
            pos_columns: Some(columns(&FABRICATOR_POS)),
        },
        "pcbway" => FabricatorConfig {
            distributor: None,
            bom_columns: Some(columns(&[
                ("Designator", "reference"),
                ("Quantity", "quantity"),
                ("Value", "value"),
                ("Package", "package"),
                ("Manufacturer", "manufacturer"),
                ("Manufacturer Part Number", "mpn"),
                ("Description", "description"),
            ])),
            pos_columns: Some(columns(&FABRICATOR_POS)),
        },
        "seeed" => FabricatorConfig {
            distributor: None,
            bom_columns: Some(columns(&[
                ("Designator", "reference"),
                ("MPN", "mpn"),
                ("Qty", "quantity"),
            ])),
            pos_columns: Some(columns(&FABRICATOR_POS)),
        },
        _ => return None,
    };
    Some(fabricator)
}

impl JbomConfig {
    /// Read `explicit`, else `jbom.toml` in `project_dir` when present.
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = project_dir.join(CONFIG_FILE);
                if !candidate.is_file() {
                    log::debug!("No {CONFIG_FILE} in {}", project_dir.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::debug!("Loaded config {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Matching configuration after applying the file and CLI overrides.
    pub fn match_config(&self, min_confidence: Option<u8>, distributor: Option<String>) -> MatchConfig {
        let mut config = MatchConfig::default();
        if let Some(min) = min_confidence.or(self.matching.min_confidence) {
            config.min_confidence = min;
        }
        for (field, weight) in &self.matching.weights {
            config.weights.insert(field.to_ascii_lowercase(), *weight);
        }
        config.weights.retain(|_, weight| *weight > 0);
        config.distributor = distributor;
        config
    }

    pub fn fabricator(&self, name: &str) -> Result<FabricatorConfig> {
        if let Some((_, fabricator)) = self.fabricators.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            return Ok(fabricator.clone());
        }
        builtin_fabricator(&name.to_ascii_lowercase()).ok_or_else(|| {
            let mut known: Vec<String> = ["generic", "jlc", "pcbway", "seeed"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            known.extend(self.fabricators.keys().cloned());
            anyhow::anyhow!("Unknown fabricator '{name}' (known: {})", known.join(", "))
        })
    }
}

/// BOM columns from `--fields`, the fabricator preset, or the defaults.
pub fn bom_columns(fields: Option<&str>, fabricator: &FabricatorConfig) -> Vec<(String, BomField)> {
    if let Some(fields) = fields {
        return fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| (f.to_string(), BomField::from_key(f)))
            .collect();
    }
    match &fabricator.bom_columns {
        Some(columns) => columns
            .iter()
            .map(|(header, key)| (header.clone(), BomField::from_key(key)))
            .collect(),
        None => BomField::DEFAULT
            .iter()
            .map(|(header, key)| (header.to_string(), BomField::from_key(key)))
            .collect(),
    }
}

/// POS columns from the fabricator preset, or the defaults.
pub fn pos_columns(fabricator: &FabricatorConfig) -> Result<Vec<(String, PosColumn)>> {
    let Some(columns) = &fabricator.pos_columns else {
        return Ok(PosColumn::DEFAULT
            .iter()
            .map(|(header, column)| (header.to_string(), *column))
            .collect());
    };
    columns.iter()
        .map(|(header, key)| {
            PosColumn::from_key(key)
                .map(|column| (header.clone(), column))
                .ok_or_else(|| anyhow::anyhow!("Unknown placement column '{key}' for header '{header}'"))
        })
        .collect()
}
