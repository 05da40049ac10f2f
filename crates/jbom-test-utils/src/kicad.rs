//! Builders for minimal KiCad project files.
//!
//! The output carries only the nodes jbom reads, in the layout KiCad 8
//! writes them, so tests stay short but realistic.

use std::fmt::Write;

/// A placed schematic symbol.
#[derive(Debug, Clone, Default)]
pub struct Symbol {
    pub reference: String,
    pub lib_id: String,
    pub value: String,
    pub footprint: String,
    pub unit: i64,
    pub dnp: bool,
    pub in_bom: bool,
    pub properties: Vec<(String, String)>,
}

impl Symbol {
    pub fn new(reference: &str, lib_id: &str, value: &str, footprint: &str) -> Self {
        Self {
            reference: reference.to_string(),
            lib_id: lib_id.to_string(),
            value: value.to_string(),
            footprint: footprint.to_string(),
            unit: 1,
            dnp: false,
            in_bom: true,
            properties: Vec::new(),
        }
    }

    pub fn resistor(reference: &str, value: &str, size: &str) -> Self {
        Self::new(
            reference,
            "Device:R",
            value,
            &format!("Resistor_SMD:R_{size}_{}Metric", metric_code(size)),
        )
    }

    pub fn capacitor(reference: &str, value: &str, size: &str) -> Self {
        Self::new(
            reference,
            "Device:C",
            value,
            &format!("Capacitor_SMD:C_{size}_{}Metric", metric_code(size)),
        )
    }

    pub fn power(reference: &str, net: &str) -> Self {
        Self::new(reference, &format!("power:{net}"), net, "")
    }

    pub fn unit(mut self, unit: i64) -> Self {
        self.unit = unit;
        self
    }

    pub fn dnp(mut self) -> Self {
        self.dnp = true;
        self
    }

    pub fn exclude_from_bom(mut self) -> Self {
        self.in_bom = false;
        self
    }

    pub fn property(mut self, name: &str, value: &str) -> Self {
        self.properties.push((name.to_string(), value.to_string()));
        self
    }
}

fn metric_code(size: &str) -> &'static str {
    match size {
        "0201" => "0603",
        "0402" => "1005",
        "0603" => "1608",
        "0805" => "2012",
        "1206" => "3216",
        _ => "0000",
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Builder for a `.kicad_sch` file.
#[derive(Debug, Clone, Default)]
pub struct SchematicBuilder {
    symbols: Vec<Symbol>,
    sheets: Vec<(String, String)>,
}

impl SchematicBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: Symbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    /// Reference a child sheet file, relative to this sheet.
    pub fn sheet(mut self, name: &str, file: &str) -> Self {
        self.sheets.push((name.to_string(), file.to_string()));
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::from(
            "(kicad_sch\n\t(version 20231120)\n\t(generator \"eeschema\")\n\t(paper \"A4\")\n\t(lib_symbols)\n",
        );
        for (i, s) in self.symbols.iter().enumerate() {
            let x = 50.8 + 10.16 * i as f64;
            let _ = writeln!(
                out,
                "\t(symbol\n\t\t(lib_id {})\n\t\t(at {x} 50.8 0)\n\t\t(unit {})\n\t\t(in_bom {})\n\t\t(on_board yes)\n\t\t(dnp {})\n\t\t(uuid \"00000000-0000-0000-0000-{:012}\")",
                quote(&s.lib_id),
                s.unit,
                yes_no(s.in_bom),
                yes_no(s.dnp),
                i + 1
            );
            let mut props = vec![
                ("Reference".to_string(), s.reference.clone()),
                ("Value".to_string(), s.value.clone()),
                ("Footprint".to_string(), s.footprint.clone()),
                ("Datasheet".to_string(), "~".to_string()),
            ];
            props.extend(s.properties.iter().cloned());
            for (name, value) in props {
                let _ = writeln!(
                    out,
                    "\t\t(property {} {}\n\t\t\t(at {x} 50.8 0)\n\t\t\t(effects (font (size 1.27 1.27)))\n\t\t)",
                    quote(&name),
                    quote(&value)
                );
            }
            out.push_str("\t)\n");
        }
        for (i, (name, file)) in self.sheets.iter().enumerate() {
            let y = 100.0 + 30.0 * i as f64;
            let _ = writeln!(
                out,
                "\t(sheet\n\t\t(at 100 {y})\n\t\t(size 20 20)\n\t\t(uuid \"10000000-0000-0000-0000-{:012}\")\n\t\t(property \"Sheetname\" {})\n\t\t(property \"Sheetfile\" {})\n\t)",
                i + 1,
                quote(name),
                quote(file)
            );
        }
        out.push_str(")\n");
        out
    }
}

/// A footprint placed on a board.
#[derive(Debug, Clone)]
pub struct Footprint {
    pub reference: String,
    pub value: String,
    pub fpid: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub bottom: bool,
    pub attrs: Vec<String>,
}

/// Builder for a `.kicad_pcb` file.
#[derive(Debug, Clone, Default)]
pub struct BoardBuilder {
    aux_origin: Option<(f64, f64)>,
    footprints: Vec<Footprint>,
}

impl BoardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aux_origin(mut self, x: f64, y: f64) -> Self {
        self.aux_origin = Some((x, y));
        self
    }

    /// Add an SMD footprint on the top side.
    pub fn smd(self, reference: &str, value: &str, fpid: &str, x: f64, y: f64, rotation: f64) -> Self {
        self.footprint(Footprint {
            reference: reference.to_string(),
            value: value.to_string(),
            fpid: fpid.to_string(),
            x,
            y,
            rotation,
            bottom: false,
            attrs: vec!["smd".to_string()],
        })
    }

    pub fn footprint(mut self, footprint: Footprint) -> Self {
        self.footprints.push(footprint);
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::from("(kicad_pcb\n\t(version 20240108)\n\t(generator \"pcbnew\")\n");
        out.push_str("\t(setup\n\t\t(pad_to_mask_clearance 0)\n");
        if let Some((x, y)) = self.aux_origin {
            let _ = writeln!(out, "\t\t(aux_axis_origin {x} {y})");
        }
        out.push_str("\t)\n");
        for fp in &self.footprints {
            let layer = if fp.bottom { "B.Cu" } else { "F.Cu" };
            let pad = if fp.attrs.iter().any(|a| a == "through_hole") {
                "thru_hole circle"
            } else {
                "smd roundrect"
            };
            let _ = writeln!(
                out,
                "\t(footprint {}\n\t\t(layer {})\n\t\t(at {} {} {})\n\t\t(property \"Reference\" {}\n\t\t\t(at 0 -1.5 0)\n\t\t\t(layer \"F.SilkS\")\n\t\t)\n\t\t(property \"Value\" {}\n\t\t\t(at 0 1.5 0)\n\t\t\t(layer \"F.Fab\")\n\t\t)\n\t\t(attr {})\n\t\t(pad \"1\" {pad} (at -0.8 0) (size 0.8 0.8) (layers \"F.Cu\"))\n\t\t(pad \"2\" {pad} (at 0.8 0) (size 0.8 0.8) (layers \"F.Cu\"))\n\t)",
                quote(&fp.fpid),
                quote(layer),
                fp.x,
                fp.y,
                fp.rotation,
                quote(&fp.reference),
                quote(&fp.value),
                fp.attrs.join(" ")
            );
        }
        out.push_str(")\n");
        out
    }
}

/// An empty-but-valid `.kicad_pro` body.
pub const PROJECT_FILE: &str = "{\n  \"meta\": {\n    \"filename\": \"board.kicad_pro\",\n    \"version\": 1\n  }\n}\n";
