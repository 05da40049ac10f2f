#![cfg(not(target_os = "windows"))]

use jbom_test_utils::kicad::PROJECT_FILE;
use jbom_test_utils::sandbox::Sandbox;
use jbom_test_utils::{SchematicBuilder, Symbol, assert_snapshot};

fn project() -> Sandbox {
    let schematic = SchematicBuilder::new()
        .symbol(Symbol::resistor("R1", "10K", "0603"))
        .symbol(Symbol::resistor("R2", "10k", "0603"))
        .symbol(Symbol::capacitor("C1", "100nF", "0402"))
        .symbol(
            Symbol::new("U1", "Regulator_Linear:AMS1117-3.3", "AMS1117-3.3", "Package_TO_SOT_SMD:SOT-223-3_TabPin2")
                .property("IPN", "IC-0001")
                .property("Manufacturer", "AMS"),
        )
        .symbol(Symbol::power("#PWR01", "GND"))
        .build();
    let mut sb = Sandbox::new();
    sb.write("board/board.kicad_pro", PROJECT_FILE)
        .write("board/board.kicad_sch", schematic);
    sb
}

#[test]
fn test_inventory_extract() {
    let output = project().snapshot_run("jbom", ["inventory", "board"]);
    assert_snapshot!(output, @r#"
    Exit Code: 0
    --- STDOUT ---
    IPN,Category,Value,Package,Description,Manufacturer,MPN,Distributor,DPN,Cost,Priority,References
    CAP_100N_0402,CAP,100n,0402,,,,,,,,C1
    RES_10K0_0603,RES,10K0,0603,,,,,,,,"R1, R2"
    IC-0001,IC,AMS1117-3.3,SOT-223-3,,AMS,,,,,,U1
    --- STDERR ---
    "#);
}

#[test]
fn test_inventory_missing_only_round_trip() {
    let mut sb = project();
    let out = sb.run_unchecked("jbom", ["inventory", "board", "-o", "stock.tsv"]);
    assert!(out.success(), "{}", out.stderr);

    // everything extracted is covered by the extract itself
    let out = sb.run_unchecked("jbom", ["inventory", "board", "-i", "stock.tsv", "--missing-only"]);
    assert!(out.success(), "{}", out.stderr);
    assert_eq!(
        out.stdout,
        "IPN,Category,Value,Package,Description,Manufacturer,MPN,Distributor,DPN,Cost,Priority,References\n"
    );

    sb.write(
        "partial.csv",
        "IPN,Category,Value,Package\nRES_10K0_0603,RES,10K,0603\n",
    );
    let out = sb.run_unchecked("jbom", ["inventory", "board", "-i", "partial.csv", "--missing-only", "-f", "json"]);
    assert!(out.success(), "{}", out.stderr);
    let parts: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();
    let ipns: Vec<&str> = parts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["item"]["ipn"].as_str().unwrap())
        .collect();
    assert_eq!(ipns, vec!["CAP_100N_0402", "IC-0001"]);
}

#[test]
fn test_missing_only_needs_inventory() {
    let out = project().run_unchecked("jbom", ["inventory", "board", "--missing-only"]);
    assert_eq!(out.code, Some(2));
}
