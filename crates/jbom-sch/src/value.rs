//! Parsing and formatting of passive component values.
//!
//! Designers write the same resistance as `10k`, `10K`, `10kΩ` or `10K0`,
//! and the same capacitance as `100nF`, `0.1uF` or `100n`. Everything here
//! works in base SI units (ohms, farads, henries) as `f64`.
//!
//! Accepted grammar after the unit suffix is stripped:
//! `MANTISSA [MULTIPLIER [DIGITS]]`, where a multiplier followed by digits
//! acts as the decimal point (`4R7` = 4.7, `1K5` = 1500, `2m2` = 0.0022).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::component::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Resistor,
    Capacitor,
    Inductor,
}

impl ValueKind {
    pub fn for_category(category: Category) -> Option<Self> {
        match category {
            Category::Res => Some(Self::Resistor),
            Category::Cap => Some(Self::Capacitor),
            Category::Ind => Some(Self::Inductor),
            _ => None,
        }
    }

    fn unit_letter(self) -> &'static str {
        match self {
            Self::Resistor => "R",
            Self::Capacitor => "F",
            Self::Inductor => "H",
        }
    }

    fn unit_suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Resistor => &["ohms", "ohm", "\u{03A9}", "\u{2126}", "R"],
            Self::Capacitor => &["F"],
            Self::Inductor => &["H"],
        }
    }

    /// Decimal exponents of the multipliers used when formatting.
    fn prefix_exponents(self) -> &'static [i32] {
        match self {
            Self::Resistor => &[9, 6, 3, 0],
            Self::Capacitor | Self::Inductor => &[0, -3, -6, -9, -12],
        }
    }

    fn prefix_symbol(self, exp: i32) -> &'static str {
        match (self, exp) {
            (_, 9) => "G",
            (_, 6) => "M",
            (_, 3) => "K",
            (Self::Resistor, 0) => "R",
            (_, 0) => "",
            (_, -3) => "m",
            (_, -6) => "u",
            (_, -9) => "n",
            _ => "p",
        }
    }
}

static VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?|\.\d+)([pnu\x{00B5}\x{03BC}mkKMGR]?)(\d*)$").unwrap());

fn multiplier_exponent(symbol: &str) -> i32 {
    match symbol {
        "p" => -12,
        "n" => -9,
        "u" | "\u{00B5}" | "\u{03BC}" => -6,
        "m" => -3,
        "k" | "K" => 3,
        "M" => 6,
        "G" => 9,
        _ => 0,
    }
}

/// The part of a free-form value field that carries the quantity.
///
/// `"10k 1%"` yields `10k`; `"100 nF"` yields `100nF`.
fn value_token(raw: &str) -> Option<String> {
    let mut tokens = raw.split_whitespace();
    let first = tokens.next()?;
    let numeric_only = first.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',');
    let token = match tokens.next() {
        Some(second) if numeric_only && second.chars().next().is_some_and(char::is_alphabetic) => {
            format!("{first}{second}")
        }
        _ => first.to_string(),
    };
    Some(normalize_commas(&token))
}

/// A lone comma followed by one or two digits is a decimal comma (`4,7k`);
/// any other comma separates thousands (`1,000`, `1,000,000`).
fn normalize_commas(token: &str) -> String {
    let mut commas = token.match_indices(',');
    let (Some((at, _)), None) = (commas.next(), commas.next()) else {
        return token.replace(',', "");
    };
    let fraction_digits = token[at + 1..].chars().take_while(char::is_ascii_digit).count();
    if fraction_digits < 3 {
        token.replacen(',', ".", 1)
    } else {
        token.replace(',', "")
    }
}

fn strip_unit(token: &str, kind: ValueKind) -> &str {
    for suffix in kind.unit_suffixes() {
        let split = token.len().saturating_sub(suffix.len());
        if token.is_char_boundary(split) && token[split..].eq_ignore_ascii_case(suffix) {
            return &token[..split];
        }
    }
    token
}

/// Parse a component value into base SI units.
///
/// Returns `None` for text that is not a quantity (`LM358`, `DNP`). The
/// number is assembled as decimal text and parsed once, so `100nF` yields
/// exactly `1e-7`.
pub fn parse_value(raw: &str, kind: ValueKind) -> Option<f64> {
    let token = value_token(raw)?;
    let body = strip_unit(&token, kind);
    let caps = VALUE_RE.captures(body)?;

    let mantissa = &caps[1];
    let multiplier = caps.get(2).map_or("", |m| m.as_str());
    let digits = caps.get(3).map_or("", |m| m.as_str());

    // `4R7` style only works when the multiplier is the decimal point
    if !digits.is_empty() && (multiplier.is_empty() || mantissa.contains('.')) {
        return None;
    }

    let exponent = multiplier_exponent(multiplier);
    let mantissa = if mantissa.starts_with('.') {
        format!("0{mantissa}")
    } else {
        mantissa.to_string()
    };
    let text = if digits.is_empty() {
        format!("{mantissa}e{exponent}")
    } else {
        format!("{mantissa}.{digits}e{exponent}")
    };
    text.parse::<f64>().ok()
}

/// Significant digits of a positive number and the decimal exponent of the
/// first one: `4700` with 3 digits is `("470", 3)`.
fn significant_digits(value: f64, count: usize) -> (String, i32) {
    let sci = format!("{:.*e}", count.saturating_sub(1), value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits = mantissa.chars().filter(char::is_ascii_digit).collect();
    (digits, exp.parse().unwrap_or(0))
}

/// Format a value in base SI units.
///
/// With `eia == false` the shortest conventional form is produced
/// (`4K7`, `100R`, `100nF`, `2.2uF`, `2.2mH`). With `eia == true` the value is
/// written with three significant digits and the multiplier as decimal point
/// (`10K0`, `4K70`, `100R`, `2u20`, `2m20`).
pub fn format_value(value: f64, kind: ValueKind, eia: bool) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    if magnitude == 0.0 {
        return format!("0{}", kind.unit_letter());
    }

    let (digits, exp) = significant_digits(magnitude, if eia { 3 } else { 9 });
    let prefixes = kind.prefix_exponents();
    let prefix_exp = prefixes
        .iter()
        .copied()
        .find(|p| *p <= exp)
        .unwrap_or(prefixes[prefixes.len() - 1]);

    let point = exp + 1 - prefix_exp;
    let (int_part, mut frac_part) = if point <= 0 {
        ("0".to_string(), format!("{}{digits}", "0".repeat((-point) as usize)))
    } else if point as usize >= digits.len() {
        (
            format!("{digits}{}", "0".repeat(point as usize - digits.len())),
            String::new(),
        )
    } else {
        let (int, frac) = digits.split_at(point as usize);
        (int.to_string(), frac.to_string())
    };

    if !eia || int_part == "0" {
        frac_part = frac_part.trim_end_matches('0').to_string();
    }

    let prefix = kind.prefix_symbol(prefix_exp);
    match kind {
        ValueKind::Resistor => format!("{sign}{int_part}{prefix}{frac_part}"),
        _ if eia => {
            let marker = if prefix.is_empty() {
                kind.unit_letter()
            } else {
                prefix
            };
            format!("{sign}{int_part}{marker}{frac_part}")
        }
        _ => {
            let unit = kind.unit_letter();
            if frac_part.is_empty() {
                format!("{sign}{int_part}{prefix}{unit}")
            } else {
                format!("{sign}{int_part}.{frac_part}{prefix}{unit}")
            }
        }
    }
}

/// Relative comparison used wherever two normalized values must agree.
pub fn values_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= scale * 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resistor_notations() {
        assert_eq!(parse_value("10K", ValueKind::Resistor), Some(10000.0));
        assert_eq!(parse_value("10k", ValueKind::Resistor), Some(10000.0));
        assert_eq!(parse_value("4R7", ValueKind::Resistor), Some(4.7));
        assert_eq!(parse_value("1K5", ValueKind::Resistor), Some(1500.0));
        assert_eq!(parse_value("4k7", ValueKind::Resistor), Some(4700.0));
        assert_eq!(parse_value("100R", ValueKind::Resistor), Some(100.0));
        assert_eq!(parse_value("2M2", ValueKind::Resistor), Some(2_200_000.0));
        assert_eq!(parse_value("10kΩ", ValueKind::Resistor), Some(10000.0));
        assert_eq!(parse_value("4.7 kohm", ValueKind::Resistor), Some(4700.0));
        assert_eq!(parse_value("10K 1%", ValueKind::Resistor), Some(10000.0));
        assert_eq!(parse_value("100mR", ValueKind::Resistor), Some(0.1));
        assert_eq!(parse_value("10K0", ValueKind::Resistor), Some(10000.0));
    }

    #[test]
    fn parses_capacitor_and_inductor_notations() {
        assert_eq!(parse_value("100nF", ValueKind::Capacitor), Some(1e-7));
        assert_eq!(parse_value("0.1uF", ValueKind::Capacitor), Some(1e-7));
        assert_eq!(parse_value("100n", ValueKind::Capacitor), Some(1e-7));
        assert_eq!(parse_value("4p7", ValueKind::Capacitor), Some(4.7e-12));
        assert_eq!(parse_value("2.2µF", ValueKind::Capacitor), Some(2.2e-6));
        assert_eq!(parse_value("1,5uF", ValueKind::Capacitor), Some(1.5e-6));
        assert_eq!(parse_value("2m2H", ValueKind::Inductor), Some(0.0022));
        assert_eq!(parse_value("10uH", ValueKind::Inductor), Some(1e-5));
    }

    #[test]
    fn comma_as_decimal_or_thousands_separator() {
        assert_eq!(parse_value("4,7k", ValueKind::Resistor), Some(4700.0));
        assert_eq!(parse_value("2,2uF", ValueKind::Capacitor), Some(2.2e-6));
        assert_eq!(parse_value("0,47 uF", ValueKind::Capacitor), Some(0.47e-6));
        assert_eq!(parse_value("1,000", ValueKind::Resistor), Some(1000.0));
        assert_eq!(parse_value("1,000pF", ValueKind::Capacitor), Some(1e-9));
        assert_eq!(parse_value("1,000,000", ValueKind::Resistor), Some(1e6));
    }

    #[test]
    fn rejects_free_text() {
        assert_eq!(parse_value("LM358", ValueKind::Resistor), None);
        assert_eq!(parse_value("", ValueKind::Capacitor), None);
        assert_eq!(parse_value("DNP", ValueKind::Capacitor), None);
        assert_eq!(parse_value("4.7K7", ValueKind::Resistor), None);
    }

    #[test]
    fn formats_short_form() {
        assert_eq!(format_value(10000.0, ValueKind::Resistor, false), "10K");
        assert_eq!(format_value(4700.0, ValueKind::Resistor, false), "4K7");
        assert_eq!(format_value(4.7, ValueKind::Resistor, false), "4R7");
        assert_eq!(format_value(100.0, ValueKind::Resistor, false), "100R");
        assert_eq!(format_value(2_200_000.0, ValueKind::Resistor, false), "2M2");
        assert_eq!(format_value(0.1, ValueKind::Resistor, false), "0R1");
        assert_eq!(format_value(0.0, ValueKind::Resistor, false), "0R");
        assert_eq!(format_value(1e-7, ValueKind::Capacitor, false), "100nF");
        assert_eq!(format_value(2.2e-6, ValueKind::Capacitor, false), "2.2uF");
        assert_eq!(format_value(1e-5, ValueKind::Inductor, false), "10uH");
        assert_eq!(format_value(0.0022, ValueKind::Inductor, false), "2.2mH");
    }

    #[test]
    fn formats_eia_form() {
        assert_eq!(format_value(10000.0, ValueKind::Resistor, true), "10K0");
        assert_eq!(format_value(4700.0, ValueKind::Resistor, true), "4K70");
        assert_eq!(format_value(100.0, ValueKind::Resistor, true), "100R");
        assert_eq!(format_value(1e6, ValueKind::Resistor, true), "1M00");
        assert_eq!(format_value(1e-7, ValueKind::Capacitor, true), "100n");
        assert_eq!(format_value(2.2e-6, ValueKind::Capacitor, true), "2u20");
        assert_eq!(format_value(0.0022, ValueKind::Inductor, true), "2m20");
    }

    #[test]
    fn parse_format_parse_is_stable() {
        let cases = [
            ("10K", ValueKind::Resistor),
            ("4R7", ValueKind::Resistor),
            ("1K5", ValueKind::Resistor),
            ("33.2k", ValueKind::Resistor),
            ("100nF", ValueKind::Capacitor),
            ("4.7pF", ValueKind::Capacitor),
            ("1uF", ValueKind::Capacitor),
            ("2m2H", ValueKind::Inductor),
            ("15uH", ValueKind::Inductor),
        ];
        for (raw, kind) in cases {
            let first = parse_value(raw, kind).unwrap();
            for eia in [false, true] {
                let formatted = format_value(first, kind, eia);
                let second = parse_value(&formatted, kind)
                    .unwrap_or_else(|| panic!("{formatted} did not parse back"));
                assert!(values_equal(first, second), "{raw} -> {formatted}");
            }
        }
    }
}
