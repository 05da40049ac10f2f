//! Correlate schematic components with inventory items.
//!
//! Each component first tries an exact IPN lookup. Failing that, every
//! visible item of a compatible category is scored by the first heuristic
//! [`Rule`] that applies to it, and the best candidate is selected by score,
//! then priority, then source order.

use std::collections::{BTreeMap, HashMap};

use jbom_sch::component::Category;
use jbom_sch::value::{parse_value, values_equal};
use jbom_sch::{Assignment, Component, InventoryItem, MatchOutcome, Warning};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::source::MergedInventory;

pub const EXACT_SCORE: u8 = 100;
pub const TYPE_VALUE_PACKAGE_SCORE: u8 = 85;
pub const TYPE_VALUE_SCORE: u8 = 60;
/// Property matches alone never reach the value-based tiers.
pub const PROPERTY_SCORE_CAP: u8 = 59;

fn default_weights() -> BTreeMap<String, u32> {
    [
        ("package", 20),
        ("manufacturer", 15),
        ("mpn", 40),
        ("tolerance", 10),
        ("voltage", 10),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Matching knobs, read from the `[matching]` table of `jbom.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    /// Best scores below this leave the component unresolved.
    pub min_confidence: u8,
    /// Field name to points for property-weighted matching.
    pub weights: BTreeMap<String, u32>,
    /// Only items from this distributor are considered.
    #[serde(skip)]
    pub distributor: Option<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_confidence: 50,
            weights: default_weights(),
            distributor: None,
        }
    }
}

impl MatchConfig {
    /// Heuristic rules in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        vec![
            Rule::TypeValuePackage,
            Rule::TypeValue,
            Rule::PropertyWeighted {
                weights: self.weights.clone(),
            },
        ]
    }

    fn visible(&self, item: &InventoryItem) -> bool {
        match &self.distributor {
            Some(filter) => item.distributor.trim().eq_ignore_ascii_case(filter.trim()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    ExactIpn,
    TypeValuePackage,
    TypeValue,
    PropertyWeighted { weights: BTreeMap<String, u32> },
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::ExactIpn => "exact_ipn",
            Rule::TypeValuePackage => "type_value_package",
            Rule::TypeValue => "type_value",
            Rule::PropertyWeighted { .. } => "property_weighted",
        }
    }

    /// Score `item` for `component`, or `None` when the rule does not apply.
    pub fn score(&self, component: &Component, item: &InventoryItem) -> Option<u8> {
        match self {
            Rule::ExactIpn => {
                let ipn = component.ipn()?;
                (!item.ipn.trim().is_empty() && item.ipn.trim() == ipn).then_some(EXACT_SCORE)
            }
            Rule::TypeValuePackage => (same_value(component, item) && same_package(component, item))
                .then_some(TYPE_VALUE_PACKAGE_SCORE),
            Rule::TypeValue => same_value(component, item).then_some(TYPE_VALUE_SCORE),
            Rule::PropertyWeighted { weights } => {
                let total: u32 = weights
                    .iter()
                    .filter(|(field, _)| same_field(component, item, field))
                    .map(|(_, weight)| *weight)
                    .sum();
                (total > 0).then(|| total.min(PROPERTY_SCORE_CAP as u32) as u8)
            }
        }
    }
}

/// Items without a category may stand in for anything.
fn compatible_category(component: &Component, item: &InventoryItem) -> bool {
    item.category.trim().is_empty() || Category::from_name(&item.category) == component.category()
}

fn same_value(component: &Component, item: &InventoryItem) -> bool {
    let (a, b) = (component.value.trim(), item.value.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let numeric = component
        .value_kind()
        .and_then(|kind| Some((parse_value(a, kind)?, parse_value(b, kind)?)));
    match numeric {
        Some((x, y)) => values_equal(x, y),
        None => a.eq_ignore_ascii_case(b),
    }
}

fn same_package(component: &Component, item: &InventoryItem) -> bool {
    let package = item.package.trim();
    if package.is_empty() {
        return false;
    }
    component.package().trim().eq_ignore_ascii_case(package)
        || component
            .footprint
            .split([':', '_', ' '])
            .any(|token| token.eq_ignore_ascii_case(package))
}

fn same_field(component: &Component, item: &InventoryItem, field: &str) -> bool {
    match (component.field(field), item.field(field)) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

/// One scored inventory item for a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub item: InventoryItem,
    pub score: u8,
    pub rule: &'static str,
}

impl Candidate {
    /// Items sharing a non-empty IPN are sourcing alternatives of one part.
    fn part_key(&self) -> String {
        match self.item.ipn.trim() {
            "" => self.item.location(),
            ipn => ipn.to_string(),
        }
    }
}

/// The matching result of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub reference: String,
    /// Every candidate, best first.
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<InventoryItem>,
    pub outcome: MatchOutcome,
}

impl Match {
    pub fn assignment(&self) -> Assignment {
        Assignment {
            item: self.selected.clone(),
            outcome: self.outcome,
        }
    }
}

fn rank(candidates: &mut [(usize, Candidate)]) {
    candidates.sort_by(|(ia, a), (ib, b)| {
        b.score
            .cmp(&a.score)
            .then(a.item.priority_rank().cmp(&b.item.priority_rank()))
            .then(ia.cmp(ib))
    });
}

/// Match a single component against the visible inventory items.
pub fn match_component(
    component: &Component,
    items: &[&InventoryItem],
    config: &MatchConfig,
    rules: &[Rule],
) -> (Match, Vec<Warning>) {
    let reference = component.reference.clone();
    let mut warnings = Vec::new();

    let mut exact: Vec<(usize, Candidate)> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let score = Rule::ExactIpn.score(component, item)?;
            Some((
                index,
                Candidate {
                    item: (*item).clone(),
                    score,
                    rule: Rule::ExactIpn.name(),
                },
            ))
        })
        .collect();
    if !exact.is_empty() {
        rank(&mut exact);
        let candidates: Vec<Candidate> = exact.into_iter().map(|(_, c)| c).collect();
        let selected = candidates.first().map(|c| c.item.clone());
        log::debug!("{reference}: exact IPN match");
        return (
            Match {
                reference,
                candidates,
                selected,
                outcome: MatchOutcome::Exact,
            },
            warnings,
        );
    }

    let mut scored: Vec<(usize, Candidate)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| compatible_category(component, item))
        .filter_map(|(index, item)| {
            let (rule, score) = rules
                .iter()
                .find_map(|rule| rule.score(component, item).map(|score| (rule, score)))?;
            Some((
                index,
                Candidate {
                    item: (*item).clone(),
                    score,
                    rule: rule.name(),
                },
            ))
        })
        .collect();
    rank(&mut scored);
    let candidates: Vec<Candidate> = scored.into_iter().map(|(_, c)| c).collect();

    let Some(best) = candidates.first() else {
        log::debug!("{reference}: no inventory candidates");
        return (
            Match {
                reference,
                candidates,
                selected: None,
                outcome: MatchOutcome::Unresolved,
            },
            warnings,
        );
    };

    if best.score < config.min_confidence {
        warnings.push(Warning::LowConfidenceMatch {
            reference: reference.clone(),
            best_score: best.score,
            threshold: config.min_confidence,
        });
        return (
            Match {
                reference,
                candidates,
                selected: None,
                outcome: MatchOutcome::Unresolved,
            },
            warnings,
        );
    }

    let mut tied: Vec<String> = Vec::new();
    for candidate in candidates.iter().take_while(|c| c.score == best.score) {
        let key = candidate.part_key();
        if !tied.contains(&key) {
            tied.push(key);
        }
    }
    let outcome = if tied.len() > 1 {
        warnings.push(Warning::AmbiguousMatch {
            reference: reference.clone(),
            ipns: tied,
        });
        MatchOutcome::Ambiguous {
            confidence: best.score,
        }
    } else {
        MatchOutcome::Heuristic {
            confidence: best.score,
        }
    };
    let selected = Some(best.item.clone());

    (
        Match {
            reference,
            candidates,
            selected,
            outcome,
        },
        warnings,
    )
}

/// Match every physical component against the merged inventory.
///
/// Virtual references are skipped. Results and warnings keep the order of
/// `components`.
#[instrument(name = "match_components", skip_all)]
pub fn match_components(
    components: &[Component],
    inventory: &MergedInventory,
    config: &MatchConfig,
) -> (Vec<Match>, Vec<Warning>) {
    let visible: Vec<&InventoryItem> = inventory.items.iter().filter(|i| config.visible(i)).collect();
    if let Some(distributor) = &config.distributor {
        log::debug!(
            "Distributor filter {distributor}: {} of {} items visible",
            visible.len(),
            inventory.items.len()
        );
    }
    let rules = config.rules();

    let results: Vec<_> = components
        .par_iter()
        .filter(|c| !c.is_virtual())
        .map(|c| match_component(c, &visible, config, &rules))
        .collect();

    let mut matches = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (m, w) in results {
        matches.push(m);
        warnings.extend(w);
    }
    (matches, warnings)
}

/// Per-reference inventory decisions for BOM aggregation.
pub fn assignments(matches: &[Match]) -> HashMap<String, Assignment> {
    matches
        .iter()
        .map(|m| (m.reference.clone(), m.assignment()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::merge_inventories;

    fn resistor(reference: &str, value: &str, size: &str) -> Component {
        Component {
            reference: reference.to_string(),
            lib_id: "Device:R".to_string(),
            value: value.to_string(),
            footprint: format!("Resistor_SMD:R_{size}_1608Metric"),
            ..Default::default()
        }
    }

    fn item(ipn: &str, value: &str, package: &str, priority: Option<u32>, row: usize) -> InventoryItem {
        InventoryItem {
            ipn: ipn.to_string(),
            category: "RES".to_string(),
            value: value.to_string(),
            package: package.to_string(),
            priority,
            source: "inv.csv".to_string(),
            row,
            ..Default::default()
        }
    }

    fn run(components: &[Component], items: Vec<InventoryItem>, config: &MatchConfig) -> (Vec<Match>, Vec<Warning>) {
        match_components(components, &merge_inventories(items), config)
    }

    #[test]
    fn test_exact_ipn_prefers_priority() {
        let mut r1 = resistor("R1", "10K", "0603");
        r1.set_property("IPN", "X1");
        let (matches, warnings) = run(
            &[r1],
            vec![
                item("X1", "10K", "0603", Some(2), 0),
                item("X1", "10K", "0603", Some(1), 1),
                item("X2", "10K", "0603", Some(1), 2),
            ],
            &MatchConfig::default(),
        );
        let m = &matches[0];
        assert_eq!(m.outcome, MatchOutcome::Exact);
        assert_eq!(m.candidates.len(), 2);
        let selected = m.selected.as_ref().unwrap();
        assert_eq!((selected.ipn.as_str(), selected.priority), ("X1", Some(1)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_heuristic_tiers() {
        let (matches, warnings) = run(
            &[resistor("R1", "10000", "0603")],
            vec![
                item("R-10K-0805", "10K", "0805", None, 0),
                item("R-10K-0603", "10k", "0603", None, 1),
            ],
            &MatchConfig::default(),
        );
        let m = &matches[0];
        assert_eq!(m.outcome, MatchOutcome::Heuristic { confidence: 85 });
        let ranked: Vec<(&str, u8, &str)> = m
            .candidates
            .iter()
            .map(|c| (c.item.ipn.as_str(), c.score, c.rule))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("R-10K-0603", 85, "type_value_package"),
                ("R-10K-0805", 60, "type_value"),
            ]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_tie_between_parts_is_ambiguous() {
        let (matches, warnings) = run(
            &[resistor("R7", "10K", "0603")],
            vec![
                item("YAGEO-10K", "10K", "0603", Some(2), 0),
                item("VISHAY-10K", "10K", "0603", Some(1), 1),
            ],
            &MatchConfig::default(),
        );
        let m = &matches[0];
        assert_eq!(m.outcome, MatchOutcome::Ambiguous { confidence: 85 });
        assert_eq!(m.selected.as_ref().unwrap().ipn, "VISHAY-10K");
        assert_eq!(
            warnings,
            vec![Warning::AmbiguousMatch {
                reference: "R7".to_string(),
                ipns: vec!["VISHAY-10K".to_string(), "YAGEO-10K".to_string()],
            }]
        );
    }

    #[test]
    fn test_low_confidence_leaves_unresolved() {
        let (matches, warnings) = run(
            &[resistor("R3", "10K", "0603"), resistor("R4", "", "")],
            vec![item("R-1K", "1K", "0603", None, 0)],
            &MatchConfig::default(),
        );
        assert_eq!(matches[0].outcome, MatchOutcome::Unresolved);
        assert_eq!(matches[0].selected, None);
        assert_eq!(matches[0].candidates[0].rule, "property_weighted");
        assert_eq!(
            warnings,
            vec![Warning::LowConfidenceMatch {
                reference: "R3".to_string(),
                best_score: 20,
                threshold: 50,
            }]
        );
        // nothing in common, nothing to warn about
        assert!(matches[1].candidates.is_empty());
        assert_eq!(matches[1].outcome, MatchOutcome::Unresolved);
    }

    #[test]
    fn test_distributor_filter_and_categories() {
        let mut lcsc = item("R-10K", "10K", "0603", None, 0);
        lcsc.distributor = "LCSC".to_string();
        let mut digikey = item("R-10K-DK", "10K", "0603", None, 1);
        digikey.distributor = "Digikey".to_string();
        let mut cap = item("C-10K", "10K", "0603", None, 2);
        cap.category = "Capacitor".to_string();
        cap.distributor = "lcsc".to_string();

        let config = MatchConfig {
            distributor: Some("lcsc".to_string()),
            ..Default::default()
        };
        let (matches, _) = run(
            &[resistor("R1", "10K", "0603"), resistor("#PWR01", "GND", "")],
            vec![digikey, cap, lcsc],
            &config,
        );
        assert_eq!(matches.len(), 1);
        let ipns: Vec<&str> = matches[0].candidates.iter().map(|c| c.item.ipn.as_str()).collect();
        assert_eq!(ipns, vec!["R-10K"]);
    }

    #[test]
    fn test_property_weights_are_capped() {
        let mut component = resistor("R1", "47K", "0402");
        component.set_property("Manufacturer", "Yageo");
        component.set_property("MPN", "RC0402FR-0747KL");
        let mut part = item("", "", "0402", None, 0);
        part.manufacturer = "YAGEO".to_string();
        part.mpn = "RC0402FR-0747KL".to_string();

        let rule = MatchConfig::default().rules().remove(2);
        assert_eq!(rule.score(&component, &part), Some(PROPERTY_SCORE_CAP));
        assert_eq!(Rule::TypeValue.score(&component, &part), None);
    }

    #[test]
    fn test_package_from_footprint_token() {
        let component = Component {
            reference: "Q1".to_string(),
            lib_id: "Device:Q_NMOS_GSD".to_string(),
            value: "AO3400A".to_string(),
            footprint: "Package_TO_SOT_SMD:SOT-23".to_string(),
            ..Default::default()
        };
        let mut part = item("Q-AO3400", "ao3400a", "sot-23", None, 0);
        part.category = "Transistor".to_string();
        assert_eq!(Rule::TypeValuePackage.score(&component, &part), Some(85));
    }

    #[test]
    fn test_assignments_by_reference() {
        let (matches, _) = run(
            &[resistor("R1", "10K", "0603")],
            vec![item("R-10K", "10K", "0603", None, 0)],
            &MatchConfig::default(),
        );
        let map = assignments(&matches);
        assert_eq!(map["R1"].outcome, MatchOutcome::Heuristic { confidence: 85 });
        assert_eq!(map["R1"].item.as_ref().unwrap().ipn, "R-10K");
    }
}
