//! KiCad board file (.kicad_pcb) utilities.
//!
//! Reads footprints from every board generation we have seen in the wild:
//! KiCad 5 `(module ...)` with `fp_text` labels, KiCad 6/7 `(footprint ...)`
//! with `fp_text`, and KiCad 8+ footprints carrying `(property ...)` nodes.

use crate::kicad::props::{at, atom_prop, properties};
use crate::{Sexpr, Span};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("expected a kicad_pcb root node, found {found}")]
    NotABoard { found: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FootprintAt {
    pub x: f64,
    pub y: f64,
    pub rot: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FootprintInfo {
    /// Footprint identifier from `(footprint "<LIB:NAME>" ...)`.
    pub fpid: Option<String>,
    pub layer: Option<String>,
    pub at: Option<FootprintAt>,
    pub reference: Option<String>,
    pub value: Option<String>,
    /// Tokens of the `(attr ...)` node, e.g. `smd`, `exclude_from_pos_files`.
    pub attrs: Vec<String>,
    /// All `(property "NAME" "VALUE" ...)` pairs, in file order.
    pub properties: Vec<(String, String)>,
    /// Pad types (`smd`, `thru_hole`, `np_thru_hole`, `connect`), one per pad.
    pub pad_types: Vec<String>,
    /// Byte span of the full footprint list node within the source text.
    pub span: Span,
}

impl FootprintInfo {
    pub fn has_attr(&self, attr: &str) -> bool {
        self.attrs.iter().any(|a| a == attr)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn check_root(root: &Sexpr) -> Result<&[Sexpr], BoardError> {
    let list = root.as_list().filter(|_| root.tag() == Some("kicad_pcb"));
    list.ok_or_else(|| BoardError::NotABoard {
        found: root
            .tag()
            .map(str::to_string)
            .unwrap_or_else(|| "a non-list atom".to_string()),
    })
}

/// Extract every footprint placed on the board.
pub fn extract_footprints(root: &Sexpr) -> Result<Vec<FootprintInfo>, BoardError> {
    let root_list = check_root(root)?;

    let mut out = Vec::new();
    for node in root_list.iter().skip(1) {
        let Some(items) = node.as_list() else {
            continue;
        };
        if !matches!(
            items.first().and_then(Sexpr::as_sym),
            Some("footprint" | "module")
        ) {
            continue;
        }

        let mut reference = None;
        let mut value = None;
        let mut attrs = Vec::new();
        let mut pad_types = Vec::new();

        for child in items.iter().skip(1) {
            let Some(list) = child.as_list() else {
                continue;
            };
            match list.first().and_then(Sexpr::as_sym) {
                Some("fp_text") => {
                    let text = list.get(2).and_then(Sexpr::as_atom).map(str::to_string);
                    match list.get(1).and_then(Sexpr::as_sym) {
                        Some("reference") => reference = reference.or(text),
                        Some("value") => value = value.or(text),
                        _ => {}
                    }
                }
                Some("attr") => {
                    attrs.extend(
                        list.iter()
                            .skip(1)
                            .filter_map(|n| n.as_sym().map(str::to_string)),
                    );
                }
                Some("pad") => {
                    if let Some(kind) = list.get(2).and_then(Sexpr::as_sym) {
                        pad_types.push(kind.to_string());
                    }
                }
                _ => {}
            }
        }

        let properties = properties(items);
        let lookup = |name: &str| {
            properties
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, v)| v.clone())
        };
        // KiCad 8 moved the labels into properties
        let reference = lookup("Reference").or(reference);
        let value = lookup("Value").or(value);

        out.push(FootprintInfo {
            fpid: items.get(1).and_then(Sexpr::as_atom).map(str::to_string),
            layer: atom_prop(items, "layer"),
            at: at(items).map(|(x, y, rot)| FootprintAt { x, y, rot }),
            reference,
            value,
            attrs,
            properties,
            pad_types,
            span: node.span,
        });
    }

    log::debug!("Extracted {} footprints from board", out.len());
    Ok(out)
}

/// The auxiliary (drill/place file) origin from `(setup (aux_axis_origin x y))`.
pub fn aux_axis_origin(root: &Sexpr) -> Result<Option<(f64, f64)>, BoardError> {
    let root_list = check_root(root)?;
    let Some(setup) = crate::find_child_list(root_list, "setup") else {
        return Ok(None);
    };
    let Some(origin) = crate::find_child_list(setup, "aux_axis_origin") else {
        return Ok(None);
    };
    let x = origin.get(1).and_then(Sexpr::as_number);
    let y = origin.get(2).and_then(Sexpr::as_number);
    Ok(x.zip(y))
}
