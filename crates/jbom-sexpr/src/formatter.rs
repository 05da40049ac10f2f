//! Serialization of S-expression trees back to text.
//!
//! - [`to_compact_string`] writes a tree on one line
//! - [`to_pretty_string`] writes it KiCad-style, one child list per line with
//!   tab indentation
//!
//! Both walk the tree with an explicit stack and reproduce numeric atoms from
//! their parsed lexeme, so `parse(serialize(parse(t))) == parse(t)`.

use crate::{Sexpr, SexprKind};

enum Step<'a> {
    Node(&'a Sexpr, usize),
    Text(&'static str),
    Newline(usize),
}

/// Serialize a tree on a single line.
pub fn to_compact_string(sexpr: &Sexpr) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Node(sexpr, 0)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Node(node, depth) => match node.as_list() {
                Some(items) => {
                    out.push('(');
                    stack.push(Step::Text(")"));
                    for (idx, item) in items.iter().enumerate().rev() {
                        stack.push(Step::Node(item, depth + 1));
                        if idx > 0 {
                            stack.push(Step::Text(" "));
                        }
                    }
                }
                None => write_atom(node, &mut out),
            },
            Step::Text(text) => out.push_str(text),
            Step::Newline(depth) => push_newline(&mut out, depth),
        }
    }

    out
}

/// Serialize a tree with one nested list per line, tab indented.
///
/// Lists without nested lists stay on one line, so `(at 10 20 90)` reads the
/// same as in a KiCad file. The result ends with a newline.
pub fn to_pretty_string(sexpr: &Sexpr) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Node(sexpr, 0)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Node(node, depth) => {
                let Some(items) = node.as_list() else {
                    write_atom(node, &mut out);
                    continue;
                };
                let split = items.iter().position(Sexpr::is_list).unwrap_or(items.len());
                if split == items.len() {
                    out.push_str(&to_compact_string(node));
                    continue;
                }

                out.push('(');
                for (idx, atom) in items[..split].iter().enumerate() {
                    if idx > 0 {
                        out.push(' ');
                    }
                    write_atom(atom, &mut out);
                }

                stack.push(Step::Text(")"));
                stack.push(Step::Newline(depth));
                for child in items[split..].iter().rev() {
                    stack.push(Step::Node(child, depth + 1));
                    stack.push(Step::Newline(depth + 1));
                }
            }
            Step::Text(text) => out.push_str(text),
            Step::Newline(depth) => push_newline(&mut out, depth),
        }
    }

    out.push('\n');
    out
}

fn push_newline(out: &mut String, depth: usize) {
    out.push('\n');
    out.extend(std::iter::repeat_n('\t', depth));
}

fn write_atom(sexpr: &Sexpr, out: &mut String) {
    match &sexpr.kind {
        SexprKind::Symbol(s) => out.push_str(s),
        SexprKind::String(s) => out.push_str(&quote_string(s)),
        SexprKind::Int(n) => match sexpr.raw_atom.as_deref() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&n.to_string()),
        },
        SexprKind::F64(f) => match sexpr.raw_atom.as_deref() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&trim_float(format!("{f}"))),
        },
        SexprKind::List(_) => out.push_str(&to_compact_string(sexpr)),
    }
}

/// Quote a string value, escaping special characters.
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

fn trim_float(s: String) -> String {
    if !s.contains('.') {
        // keep floats distinguishable from ints when re-parsed
        return format!("{s}.0");
    }
    let trimmed = s.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{to_compact_string, to_pretty_string};
    use crate::{Sexpr, parse};

    #[test]
    fn compact_preserves_numeric_lexemes() {
        let input = "(setup (pad_to_mask_clearance 0.050000) (aux_axis_origin 100 50.8))";
        let parsed = parse(input).unwrap();
        assert_eq!(to_compact_string(&parsed), input);
    }

    #[test]
    fn compact_escapes_strings() {
        let sexpr = Sexpr::list(vec![
            Sexpr::symbol("property"),
            Sexpr::string("Description"),
            Sexpr::string("say \"hi\"\nnow"),
        ]);
        assert_eq!(
            to_compact_string(&sexpr),
            r#"(property "Description" "say \"hi\"\nnow")"#
        );
    }

    #[test]
    fn synthetic_floats_reparse_as_floats() {
        let sexpr = Sexpr::list(vec![Sexpr::symbol("at"), Sexpr::float(10.0), Sexpr::float(2.5)]);
        let text = to_compact_string(&sexpr);
        assert_eq!(text, "(at 10.0 2.5)");
        assert_eq!(parse(&text).unwrap(), sexpr);
    }

    #[test]
    fn pretty_indents_nested_lists() {
        let parsed = parse(
            r#"(kicad_sch (version 20231120) (symbol (lib_id "Device:R") (at 10 20 0)))"#,
        )
        .unwrap();
        let expected = "(kicad_sch\n\t(version 20231120)\n\t(symbol\n\t\t(lib_id \"Device:R\")\n\t\t(at 10 20 0)\n\t)\n)\n";
        assert_eq!(to_pretty_string(&parsed), expected);
    }

    #[test]
    fn pretty_keeps_leading_atoms_on_open_line() {
        let parsed = parse(r#"(property "Reference" "R1" (at 1 2 0))"#).unwrap();
        assert_eq!(
            to_pretty_string(&parsed),
            "(property \"Reference\" \"R1\"\n\t(at 1 2 0)\n)\n"
        );
    }

    #[test]
    fn roundtrip_through_both_serializers() {
        let inputs = [
            "(simple list)",
            "(nested (list with) (multiple levels) trailing)",
            r#"(with "quoted string" and atoms 1.27 -3 "esc\\aped")"#,
            "(pin passive line (at 0 0 0) (length 2.54) (name \"1\") (number \"1\"))",
            "()",
            "(at -nan +inf 1e999)",
        ];

        for input in inputs {
            let parsed = parse(input).unwrap();
            let compact = parse(&to_compact_string(&parsed)).unwrap();
            let pretty = parse(&to_pretty_string(&parsed)).unwrap();
            assert_eq!(parsed, compact, "compact roundtrip failed for: {input}");
            assert_eq!(parsed, pretty, "pretty roundtrip failed for: {input}");
        }
    }
}
