//! Component extraction from KiCad schematic (`.kicad_sch`) trees.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use jbom_sexpr::Sexpr;
use jbom_sexpr::kicad::{
    SymbolInstance, int_prop, legacy_symbol_instances, properties, string_prop, symbol_instances,
    yes_no_prop,
};

use crate::component::{Component, is_truthy, normalize_field_name};
use crate::warning::Warning;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("expected a {expected} root node, found {found}")]
    WrongRoot { expected: &'static str, found: String },
}

/// A child sheet referenced from a schematic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub name: String,
    /// Path as written in the file, relative to the referencing sheet.
    pub file: String,
}

/// Everything extracted from one schematic file.
#[derive(Debug, Clone, Default)]
pub struct SchematicSheet {
    pub components: Vec<Component>,
    pub sheets: Vec<SheetRef>,
    pub warnings: Vec<Warning>,
}

fn root_items<'a>(root: &'a Sexpr, expected: &'static str) -> Result<&'a [Sexpr], ExtractError> {
    match root.as_list() {
        Some(items) if root.tag() == Some(expected) => Ok(items),
        _ => Err(ExtractError::WrongRoot {
            expected,
            found: root.tag().unwrap_or("a non-list atom").to_string(),
        }),
    }
}

/// Sheet references (`(sheet ...)` nodes) of a schematic, in file order.
pub fn sheet_refs(root: &Sexpr) -> Result<Vec<SheetRef>, ExtractError> {
    root_items(root, "kicad_sch")?;
    let refs = root
        .find_all_lists("sheet")
        .into_iter()
        .filter_map(|sheet| {
            let props: BTreeMap<String, String> = properties(sheet)
                .into_iter()
                .map(|(name, value)| (normalize_field_name(&name), value))
                .collect();
            let name = props
                .get("sheetname")
                .or_else(|| props.get("sheet_name"))
                .cloned()
                .unwrap_or_default();
            let file = props
                .get("sheetfile")
                .or_else(|| props.get("sheet_file"))
                .filter(|f| !f.trim().is_empty())?
                .clone();
            Some(SheetRef { name, file })
        })
        .collect();
    Ok(refs)
}

fn is_unannotated(reference: &str) -> bool {
    reference.is_empty() || reference.ends_with('?')
}

/// Pick the designators a placed symbol is known by.
///
/// KiCad 7+ records one instance per use of the sheet, so a sheet placed
/// twice yields two references for one symbol.
fn instance_references(
    property_reference: &str,
    instances: &[SymbolInstance],
    legacy: Option<&str>,
) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for instance in instances {
        if !is_unannotated(&instance.reference) && !refs.contains(&instance.reference) {
            refs.push(instance.reference.clone());
        }
    }
    if !refs.is_empty() {
        return refs;
    }
    if is_unannotated(property_reference) {
        if let Some(legacy) = legacy {
            return vec![legacy.to_string()];
        }
    }
    vec![property_reference.to_string()]
}

fn symbol_component(symbol: &[Sexpr], reference: String, sheet_path: &Path) -> Component {
    let mut component = Component {
        reference,
        lib_id: string_prop(symbol, "lib_id").unwrap_or_default(),
        sheet: sheet_path.to_path_buf(),
        ..Default::default()
    };

    if let Some(unit) = int_prop(symbol, "unit") {
        component.units.insert(unit);
    }
    component.exclude_from_bom = yes_no_prop(symbol, "in_bom") == Some(false);
    component.exclude_from_board = yes_no_prop(symbol, "on_board") == Some(false);
    component.dnp = yes_no_prop(symbol, "dnp") == Some(true);

    for (name, value) in properties(symbol) {
        match normalize_field_name(&name).as_str() {
            "reference" => {}
            "value" => component.value = value,
            "footprint" => component.footprint = value,
            "datasheet" => component.datasheet = if value == "~" { String::new() } else { value },
            "description" => component.description = value,
            "dnp" | "do_not_populate" => {
                component.dnp |= is_truthy(&value);
                component.set_property(&name, value);
            }
            "exclude_from_bom" => {
                component.exclude_from_bom |= is_truthy(&value);
                component.set_property(&name, value);
            }
            _ => component.set_property(&name, value),
        }
    }

    component
}

/// Extract the placed symbols and sheet references of one schematic file.
///
/// Library definitions under `lib_symbols` are ignored. Units of multi-unit
/// symbols are merged with [`merge_units`]. `project` selects which project's
/// instance data to use when a sheet file is shared between projects.
pub fn extract_schematic(
    root: &Sexpr,
    sheet_path: &Path,
    project: Option<&str>,
) -> Result<SchematicSheet, ExtractError> {
    let items = root_items(root, "kicad_sch")?;

    let legacy: HashMap<String, String> = legacy_symbol_instances(root)
        .into_iter()
        .filter_map(|inst| {
            let uuid = inst.path.rsplit('/').next()?.to_string();
            Some((uuid, inst.reference))
        })
        .collect();

    let mut components = Vec::new();
    for node in items.iter().filter(|n| n.tag() == Some("symbol")) {
        let Some(symbol) = node.as_list() else {
            continue;
        };

        let mut instances = symbol_instances(symbol);
        if let Some(project) = project {
            if instances.iter().any(|i| i.project.as_deref() == Some(project)) {
                instances.retain(|i| i.project.as_deref() == Some(project));
            }
        }

        let property_reference = properties(symbol)
            .into_iter()
            .find(|(name, _)| name == "Reference")
            .map(|(_, value)| value)
            .unwrap_or_default();
        let uuid = string_prop(symbol, "uuid").unwrap_or_default();
        let refs = instance_references(
            &property_reference,
            &instances,
            legacy.get(&uuid).map(String::as_str),
        );

        for reference in refs {
            components.push(symbol_component(symbol, reference, sheet_path));
        }
    }

    let mut warnings = Vec::new();
    let components = merge_units(components, &mut warnings);
    log::debug!(
        "Extracted {} components from {}",
        components.len(),
        sheet_path.display()
    );

    Ok(SchematicSheet {
        components,
        sheets: sheet_refs(root)?,
        warnings,
    })
}

fn merge_text_field(
    reference: &str,
    field: &str,
    existing: &mut String,
    incoming: String,
    warnings: &mut Vec<Warning>,
) {
    if incoming.trim().is_empty() || *existing == incoming {
        return;
    }
    if !existing.trim().is_empty() {
        warnings.push(Warning::UnitPropertyConflict {
            reference: reference.to_string(),
            field: field.to_string(),
            kept: incoming.clone(),
            discarded: existing.clone(),
        });
    }
    *existing = incoming;
}

fn merge_into(target: &mut Component, unit: Component, warnings: &mut Vec<Warning>) {
    let reference = target.reference.clone();
    merge_text_field(&reference, "Value", &mut target.value, unit.value, warnings);
    merge_text_field(
        &reference,
        "Footprint",
        &mut target.footprint,
        unit.footprint,
        warnings,
    );
    merge_text_field(
        &reference,
        "Datasheet",
        &mut target.datasheet,
        unit.datasheet,
        warnings,
    );
    merge_text_field(
        &reference,
        "Description",
        &mut target.description,
        unit.description,
        warnings,
    );

    for (key, property) in unit.properties {
        match target.properties.get_mut(&key) {
            Some(existing) => {
                let name = property.name.clone();
                merge_text_field(&reference, &name, &mut existing.value, property.value, warnings);
            }
            None => {
                target.properties.insert(key, property);
            }
        }
    }

    target.units.extend(unit.units);
    target.dnp |= unit.dnp;
    target.exclude_from_bom |= unit.exclude_from_bom;
    target.exclude_from_board |= unit.exclude_from_board;
}

/// Consolidate symbols that share a reference designator and library symbol
/// into one component per reference, keeping first-appearance order.
///
/// Conflicting non-empty fields produce [`Warning::UnitPropertyConflict`] and
/// the later unit's value is kept. Symbols that share a reference but not a
/// library symbol stay separate; that is an annotation error in the design.
pub fn merge_units(components: Vec<Component>, warnings: &mut Vec<Warning>) -> Vec<Component> {
    let mut merged: Vec<Component> = Vec::with_capacity(components.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for component in components {
        let key = (component.reference.clone(), component.lib_id.clone());
        match index.get(&key) {
            Some(&i) => merge_into(&mut merged[i], component, warnings),
            None => {
                if merged
                    .iter()
                    .any(|c| c.reference == component.reference && !c.is_virtual())
                {
                    log::warn!(
                        "{} is used by more than one library symbol ({}), keeping both",
                        component.reference,
                        component.lib_id
                    );
                }
                index.insert(key, merged.len());
                merged.push(component);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbom_sexpr::parse;
    use std::path::PathBuf;

    fn extract(input: &str) -> SchematicSheet {
        let root = parse(input).unwrap();
        extract_schematic(&root, Path::new("test.kicad_sch"), None).unwrap()
    }

    #[test]
    fn test_extracts_placed_symbols_only() {
        let sheet = extract(
            r##"(kicad_sch (version 20231120)
                (lib_symbols
                    (symbol "Device:R" (property "Reference" "R") (property "Value" "R")))
                (symbol (lib_id "Device:R") (at 10 20 0) (unit 1) (in_bom yes) (on_board yes) (dnp no)
                    (uuid "u-1")
                    (property "Reference" "R1" (at 0 0 0))
                    (property "Value" "10K")
                    (property "Footprint" "Resistor_SMD:R_0603_1608Metric")
                    (property "Datasheet" "~")
                    (property "Tolerance" "1%"))
                (symbol (lib_id "power:GND") (unit 1) (in_bom yes)
                    (property "Reference" "#PWR01")
                    (property "Value" "GND")))"##,
        );

        assert_eq!(sheet.components.len(), 2);
        let r1 = &sheet.components[0];
        assert_eq!(r1.reference, "R1");
        assert_eq!(r1.value, "10K");
        assert_eq!(r1.footprint, "Resistor_SMD:R_0603_1608Metric");
        assert_eq!(r1.datasheet, "");
        assert_eq!(r1.property("tolerance"), Some("1%"));
        assert_eq!(r1.sheet, PathBuf::from("test.kicad_sch"));
        assert!(!r1.dnp && !r1.exclude_from_bom);
        assert!(sheet.components[1].is_virtual());
        assert!(sheet.warnings.is_empty());
    }

    #[test]
    fn test_flags_from_nodes_and_properties() {
        let sheet = extract(
            r#"(kicad_sch
                (symbol (lib_id "Device:C") (in_bom no) (on_board no)
                    (property "Reference" "C1") (property "Value" "100n"))
                (symbol (lib_id "Device:C") (dnp yes)
                    (property "Reference" "C2") (property "Value" "100n"))
                (symbol (lib_id "Device:C")
                    (property "Reference" "C3") (property "DNP" "1")))"#,
        );

        let c = &sheet.components;
        assert!(c[0].exclude_from_bom && c[0].exclude_from_board && !c[0].dnp);
        assert!(c[1].dnp);
        assert!(c[2].dnp);
    }

    #[test]
    fn test_multi_unit_symbols_merge_by_reference() {
        let sheet = extract(
            r#"(kicad_sch
                (symbol (lib_id "Amplifier_Operational:LM358") (unit 1)
                    (property "Reference" "U1") (property "Value" "LM358")
                    (property "Footprint" "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm"))
                (symbol (lib_id "Device:R") (unit 1)
                    (property "Reference" "R1") (property "Value" "1K"))
                (symbol (lib_id "Amplifier_Operational:LM358") (unit 2)
                    (property "Reference" "U1") (property "Value" "LM358")
                    (property "MPN" "LM358DR"))
                (symbol (lib_id "Amplifier_Operational:LM358") (unit 3)
                    (property "Reference" "U1") (property "Value" "LM358")))"#,
        );

        assert_eq!(sheet.components.len(), 2);
        let u1 = &sheet.components[0];
        assert_eq!(u1.reference, "U1");
        assert_eq!(u1.units.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(u1.footprint, "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm");
        assert_eq!(u1.property("MPN"), Some("LM358DR"));
        assert!(sheet.warnings.is_empty());
    }

    #[test]
    fn test_unit_conflict_keeps_last_and_warns() {
        let sheet = extract(
            r#"(kicad_sch
                (symbol (lib_id "Device:Q_Dual") (unit 1)
                    (property "Reference" "Q1") (property "MPN" "AAA"))
                (symbol (lib_id "Device:Q_Dual") (unit 2)
                    (property "Reference" "Q1") (property "MPN" "BBB")))"#,
        );

        assert_eq!(sheet.components.len(), 1);
        assert_eq!(sheet.components[0].property("mpn"), Some("BBB"));
        assert_eq!(
            sheet.warnings,
            vec![Warning::UnitPropertyConflict {
                reference: "Q1".to_string(),
                field: "MPN".to_string(),
                kept: "BBB".to_string(),
                discarded: "AAA".to_string(),
            }]
        );
    }

    #[test]
    fn test_instance_references() {
        let sheet = extract(
            r#"(kicad_sch
                (symbol (lib_id "Device:R") (uuid "s1")
                    (property "Reference" "R?") (property "Value" "1K")
                    (instances (project "demo"
                        (path "/root/a" (reference "R1") (unit 1))
                        (path "/root/b" (reference "R101") (unit 1))))))"#,
        );
        let refs: Vec<&str> = sheet.components.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["R1", "R101"]);
    }

    #[test]
    fn test_legacy_instance_table() {
        let sheet = extract(
            r#"(kicad_sch
                (symbol (lib_id "Device:R") (uuid "abcd")
                    (property "Reference" "R?") (property "Value" "1K"))
                (symbol_instances (path "/abcd" (reference "R9") (unit 1))))"#,
        );
        assert_eq!(sheet.components[0].reference, "R9");
    }

    #[test]
    fn test_sheet_refs() {
        let sheet = extract(
            r#"(kicad_sch
                (sheet (at 10 10) (size 20 20)
                    (property "Sheetname" "Power") (property "Sheetfile" "power.kicad_sch"))
                (sheet (property "Sheet name" "IO") (property "Sheet file" "sub/io.kicad_sch"))
                (sheet (property "Sheetname" "Broken")))"#,
        );
        assert_eq!(
            sheet.sheets,
            vec![
                SheetRef {
                    name: "Power".to_string(),
                    file: "power.kicad_sch".to_string()
                },
                SheetRef {
                    name: "IO".to_string(),
                    file: "sub/io.kicad_sch".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_wrong_root() {
        let root = parse("(kicad_pcb)").unwrap();
        let err = extract_schematic(&root, Path::new("x"), None).unwrap_err();
        assert_eq!(
            err,
            ExtractError::WrongRoot {
                expected: "kicad_sch",
                found: "kicad_pcb".to_string()
            }
        );
    }
}
