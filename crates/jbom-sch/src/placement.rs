//! Pick-and-place (POS) data from KiCad boards.

use std::fmt;
use std::str::FromStr;

use jbom_sexpr::Sexpr;
use jbom_sexpr::board::{BoardError, FootprintInfo, aux_axis_origin, extract_footprints};
use serde::{Deserialize, Serialize};

use crate::component::package_from_footprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    /// `B.Cu` and every other `B.` layer is the bottom side.
    pub fn from_layer(layer: &str) -> Self {
        if layer.starts_with("B.") {
            Side::Bottom
        } else {
            Side::Top
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
        })
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "front" | "f" => Ok(Side::Top),
            "bottom" | "back" | "b" => Ok(Side::Bottom),
            other => Err(format!("unknown board side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mount {
    Smd,
    ThroughHole,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mount::Smd => "SMD",
            Mount::ThroughHole => "THT",
        })
    }
}

/// A footprint placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbComponent {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    /// Millimeters, relative to the chosen [`PlacementOrigin`].
    pub x: f64,
    pub y: f64,
    /// Degrees in `[0, 360)`.
    pub rotation: f64,
    pub side: Side,
    pub mount: Mount,
    pub dnp: bool,
    pub exclude_from_pos: bool,
}

impl PcbComponent {
    pub fn is_virtual(&self) -> bool {
        self.reference.starts_with('#')
    }

    pub fn package(&self) -> String {
        package_from_footprint(&self.footprint)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementOrigin {
    /// Page coordinates exactly as stored in the board file.
    #[default]
    Board,
    /// Relative to the board's auxiliary axis origin.
    Aux,
}

/// Map any angle into `[0, 360)`.
pub fn normalize_rotation(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    let r = if r >= 360.0 { r - 360.0 } else { r };
    if r == 0.0 { 0.0 } else { r }
}

fn mount_type(fp: &FootprintInfo) -> Mount {
    if fp.has_attr("smd") {
        return Mount::Smd;
    }
    if fp.has_attr("through_hole") {
        return Mount::ThroughHole;
    }
    let smd_pads = fp.pad_types.iter().any(|t| t == "smd");
    let tht_pads = fp.pad_types.iter().any(|t| t == "thru_hole");
    if smd_pads && !tht_pads {
        Mount::Smd
    } else {
        Mount::ThroughHole
    }
}

/// Read every footprint of a board as a placement record.
pub fn extract_pcb(root: &Sexpr, origin: PlacementOrigin) -> Result<Vec<PcbComponent>, BoardError> {
    let footprints = extract_footprints(root)?;
    let (ox, oy) = match origin {
        PlacementOrigin::Board => (0.0, 0.0),
        PlacementOrigin::Aux => aux_axis_origin(root)?.unwrap_or((0.0, 0.0)),
    };

    let placements = footprints
        .iter()
        .map(|fp| {
            let (x, y, rot) = fp
                .at
                .as_ref()
                .map(|at| (at.x, at.y, at.rot.unwrap_or(0.0)))
                .unwrap_or_default();
            let dnp = fp.has_attr("dnp")
                || fp
                    .property("DNP")
                    .is_some_and(crate::component::is_truthy);
            PcbComponent {
                reference: fp.reference.clone().unwrap_or_default(),
                value: fp.value.clone().unwrap_or_default(),
                footprint: fp.fpid.clone().unwrap_or_default(),
                x: x - ox,
                y: y - oy,
                rotation: normalize_rotation(rot),
                side: Side::from_layer(fp.layer.as_deref().unwrap_or("F.Cu")),
                mount: mount_type(fp),
                dnp,
                exclude_from_pos: fp.has_attr("exclude_from_pos_files") || fp.has_attr("virtual"),
            }
        })
        .collect();
    Ok(placements)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Mm,
    Inch,
}

impl Units {
    fn convert(self, mm: f64) -> f64 {
        match self {
            Units::Mm => mm,
            Units::Inch => mm / 25.4,
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" => Ok(Units::Mm),
            "in" | "inch" | "inches" => Ok(Units::Inch),
            other => Err(format!("unknown unit '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PosOptions {
    pub units: Units,
    pub smd_only: bool,
    /// Only placements on this side; both sides when `None`.
    pub side: Option<Side>,
    pub include_dnp: bool,
    pub include_virtual: bool,
}

/// Placements to emit, filtered by `options` and sorted naturally by reference.
pub fn pos_rows<'a>(placements: &'a [PcbComponent], options: &PosOptions) -> Vec<&'a PcbComponent> {
    let mut rows: Vec<&PcbComponent> = placements
        .iter()
        .filter(|p| !p.reference.is_empty())
        .filter(|p| options.include_virtual || !p.is_virtual())
        .filter(|p| !p.exclude_from_pos)
        .filter(|p| options.include_dnp || !p.dnp)
        .filter(|p| !options.smd_only || p.mount == Mount::Smd)
        .filter(|p| options.side.is_none_or(|side| p.side == side))
        .collect();
    rows.sort_by(|a, b| natord::compare(&a.reference, &b.reference));
    rows
}

/// A named POS output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosColumn {
    Reference,
    Value,
    Footprint,
    Package,
    X,
    Y,
    Rotation,
    Side,
    Mount,
    Dnp,
}

impl PosColumn {
    pub const DEFAULT: [(&'static str, PosColumn); 8] = [
        ("Ref", PosColumn::Reference),
        ("Val", PosColumn::Value),
        ("Package", PosColumn::Footprint),
        ("PosX", PosColumn::X),
        ("PosY", PosColumn::Y),
        ("Rot", PosColumn::Rotation),
        ("Side", PosColumn::Side),
        ("Type", PosColumn::Mount),
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        let column = match crate::component::normalize_field_name(key).as_str() {
            "reference" | "ref" | "designator" => PosColumn::Reference,
            "value" | "val" | "comment" => PosColumn::Value,
            "footprint" => PosColumn::Footprint,
            "package" => PosColumn::Package,
            "x" | "posx" | "mid_x" => PosColumn::X,
            "y" | "posy" | "mid_y" => PosColumn::Y,
            "rotation" | "rot" => PosColumn::Rotation,
            "side" | "layer" => PosColumn::Side,
            "mount" | "type" => PosColumn::Mount,
            "dnp" => PosColumn::Dnp,
            _ => return None,
        };
        Some(column)
    }

    pub fn render(self, p: &PcbComponent, units: Units) -> String {
        match self {
            PosColumn::Reference => p.reference.clone(),
            PosColumn::Value => p.value.clone(),
            PosColumn::Footprint => p.footprint.clone(),
            PosColumn::Package => p.package(),
            PosColumn::X => format!("{:.4}", units.convert(p.x)),
            PosColumn::Y => format!("{:.4}", units.convert(p.y)),
            PosColumn::Rotation => format!("{:.4}", p.rotation),
            PosColumn::Side => p.side.to_string(),
            PosColumn::Mount => p.mount.to_string(),
            PosColumn::Dnp if p.dnp => "DNP".to_string(),
            PosColumn::Dnp => String::new(),
        }
    }
}
