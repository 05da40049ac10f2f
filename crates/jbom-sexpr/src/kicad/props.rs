//! Common KiCad-ish S-expression query helpers.
//!
//! Many KiCad formats use small list nodes that behave like key/value properties:
//! `(tag "value")`, `(tag 123)`, `(tag yes)`, etc. These helpers standardize querying.

use crate::{Sexpr, find_child_list, number_as_f64};

/// Find a direct child list `(tag ...)` within `list`.
pub fn child_list<'a>(list: &'a [Sexpr], tag: &str) -> Option<&'a [Sexpr]> {
    find_child_list(list, tag)
}

/// Find a string property `(tag "VALUE")` within `list`.
pub fn string_prop(list: &[Sexpr], tag: &str) -> Option<String> {
    child_list(list, tag)?
        .get(1)?
        .as_str()
        .map(|s| s.to_string())
}

/// Like [`string_prop`] but also accepts an unquoted value, as older
/// KiCad versions write `(layer F.Cu)` where newer ones write `(layer "F.Cu")`.
pub fn atom_prop(list: &[Sexpr], tag: &str) -> Option<String> {
    child_list(list, tag)?
        .get(1)?
        .as_atom()
        .map(|s| s.to_string())
}

/// Find a boolean property that is represented as `(tag yes)` or `(tag no)`.
///
/// KiCad 8 also writes a bare `(tag)` to mean yes for some flags.
pub fn yes_no_prop(list: &[Sexpr], tag: &str) -> Option<bool> {
    let items = child_list(list, tag)?;
    match items.get(1) {
        None => Some(true),
        Some(value) => match value.as_atom()? {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
    }
}

/// Find an integer property `(tag 123)` within `list`.
pub fn int_prop(list: &[Sexpr], tag: &str) -> Option<i64> {
    child_list(list, tag)?.get(1)?.as_int()
}

/// All `(property "NAME" "VALUE" ...)` pairs directly inside `list`, in file order.
///
/// A property without a value yields an empty string.
pub fn properties(list: &[Sexpr]) -> Vec<(String, String)> {
    list.iter()
        .skip(1)
        .filter_map(Sexpr::as_list)
        .filter(|items| items.first().and_then(Sexpr::as_sym) == Some("property"))
        .filter_map(|items| {
            let name = items.get(1)?.as_atom()?;
            let value = items.get(2).and_then(Sexpr::as_atom).unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Placement `(at x y [rot])` of a symbol or footprint.
pub fn at(list: &[Sexpr]) -> Option<(f64, f64, Option<f64>)> {
    let at = child_list(list, "at")?;
    let x = number_as_f64(at.get(1)?)?;
    let y = number_as_f64(at.get(2)?)?;
    let rot = at.get(3).and_then(number_as_f64);
    Some((x, y, rot))
}
