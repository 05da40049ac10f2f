//! KiCad schematic (`.kicad_sch`) helpers.

use crate::Sexpr;

use super::props::{child_list, int_prop, string_prop};

/// One annotated instance of a placed symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInstance {
    /// Hierarchical UUID path, e.g. `/root-uuid/symbol-uuid`.
    pub path: String,
    pub reference: String,
    pub unit: Option<i64>,
    /// Owning project name for KiCad 7+ instance data.
    pub project: Option<String>,
}

/// Instances recorded on the symbol itself (KiCad 7 and later):
/// `(instances (project "NAME" (path "/..." (reference "R1") (unit 1))))`.
pub fn symbol_instances(symbol: &[Sexpr]) -> Vec<SymbolInstance> {
    let Some(instances) = child_list(symbol, "instances") else {
        return Vec::new();
    };

    instances
        .iter()
        .skip(1)
        .filter_map(Sexpr::as_list)
        .filter(|project| project.first().and_then(Sexpr::as_sym) == Some("project"))
        .flat_map(|project| {
            let name = project.get(1).and_then(Sexpr::as_str).map(str::to_string);
            project
                .iter()
                .skip(1)
                .filter_map(Sexpr::as_list)
                .filter_map(instance_from_path_list)
                .map(move |mut instance| {
                    instance.project = name.clone();
                    instance
                })
        })
        .collect()
}

/// The root-level instance table of KiCad 6 schematics:
/// `(symbol_instances (path "/uuid" (reference "R1") (unit 1) ...))`.
pub fn legacy_symbol_instances(root: &Sexpr) -> Vec<SymbolInstance> {
    let Some(table) = root.find_list("symbol_instances") else {
        return Vec::new();
    };
    table
        .iter()
        .skip(1)
        .filter_map(Sexpr::as_list)
        .filter_map(instance_from_path_list)
        .collect()
}

fn instance_from_path_list(items: &[Sexpr]) -> Option<SymbolInstance> {
    if items.first().and_then(Sexpr::as_sym) != Some("path") {
        return None;
    }
    let path = items.get(1)?.as_str()?.to_string();
    let reference = string_prop(items, "reference")?;
    Some(SymbolInstance {
        path,
        reference,
        unit: int_prop(items, "unit"),
        project: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn test_symbol_instances() {
        let node = parse(
            r#"(symbol (lib_id "Device:R")
                (instances
                    (project "demo"
                        (path "/aaa/bbb" (reference "R7") (unit 1))
                        (path "/aaa/ccc" (reference "R8") (unit 1)))))"#,
        )
        .unwrap();
        let found = symbol_instances(node.as_list().unwrap());
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].reference, "R8");
        assert_eq!(found[1].path, "/aaa/ccc");
        assert_eq!(found[0].unit, Some(1));
        assert_eq!(found[0].project.as_deref(), Some("demo"));
    }

    #[test]
    fn test_legacy_symbol_instances() {
        let root = parse(
            r#"(kicad_sch
                (symbol_instances
                    (path "/1234" (reference "U1") (unit 2) (value "LM358"))
                    (path "/5678" (unit 1))))"#,
        )
        .unwrap();
        let found = legacy_symbol_instances(&root);
        assert_eq!(
            found,
            vec![SymbolInstance {
                path: "/1234".to_string(),
                reference: "U1".to_string(),
                unit: Some(2),
                project: None,
            }]
        );
    }
}
