// End-to-end tests for the lfuse binary: --json stdout contract, exit codes,
// --partial and rollup output.
//
// Run with: cargo test -p ledgerfuse-cli --test cli_tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn lfuse() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lfuse"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../fusion/tests/fixtures")
}

/// Copy the fixture set into a temp dir, applying `edit` to one config file.
fn fixture_copy(config: &str, edit: impl Fn(String) -> String) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for entry in std::fs::read_dir(fixtures_dir()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_owned();
        std::fs::copy(&path, dir.path().join(name)).unwrap();
    }
    let config_path = dir.path().join(config);
    let text = std::fs::read_to_string(&config_path).unwrap();
    std::fs::write(&config_path, edit(text)).unwrap();
    dir
}

fn run(args: &[&str]) -> Output {
    lfuse().args(args).output().expect("run lfuse")
}

fn path_str(p: &Path) -> &str {
    p.to_str().unwrap()
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be one JSON value.\nParse error: {e}\nstdout:\n{trimmed}"))
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// lfuse revenue
// ===========================================================================

#[test]
fn revenue_json_is_single_value_and_passes() {
    let config = fixtures_dir().join("revenue.toml");
    let output = run(&["revenue", path_str(&config), "--json"]);

    assert!(output.status.success(), "exit: {:?}\nstderr: {}", output.status, stderr(&output));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["meta"]["kind"], "revenue");
    assert_eq!(val["validation"]["passed"], true);
    assert_eq!(val["tiers"].as_array().unwrap().len(), 3);
    assert!(stderr(&output).contains("validation passed"));
}

#[test]
fn revenue_without_json_keeps_stdout_empty() {
    let config = fixtures_dir().join("revenue.toml");
    let output = run(&["revenue", path_str(&config)]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn reconciliation_failure_exits_5_and_still_writes_output() {
    let dir = fixture_copy("revenue.toml", |t| {
        t.replace("remainder_threshold_cents = 100", "remainder_threshold_cents = 5000")
    });
    let out_file = dir.path().join("fused.json");
    let output = run(&[
        "revenue",
        path_str(&dir.path().join("revenue.toml")),
        "--output",
        path_str(&out_file),
    ]);

    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("hint:"));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    assert_eq!(written["validation"]["passed"], false);
}

#[test]
fn partial_keeps_accepted_years() {
    let dir = fixture_copy("revenue.toml", |t| {
        t.replace("remainder_threshold_cents = 100", "remainder_threshold_cents = 5000")
    });
    let output = run(&["revenue", path_str(&dir.path().join("revenue.toml")), "--json", "--partial"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&output.stdout);
    let years: Vec<i64> = val["tiers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["year"].as_i64().unwrap())
        .collect();
    assert_eq!(years, vec![2020, 2021]);
    assert!(val["records"].as_array().unwrap().iter().all(|r| r["year"] != 2022));
    // The rejected year stays visible in the validation block.
    assert_eq!(val["validation"]["passed"], false);
}

#[test]
fn missing_column_exits_4() {
    let dir = fixture_copy("revenue.toml", |t| {
        t.replace("donor = \"government_donor\"", "donor = \"gov_name\"")
    });
    let output = run(&["revenue", path_str(&dir.path().join("revenue.toml"))]);
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("gov_name"));
}

#[test]
fn rollup_dir_gets_per_year_files() {
    let dir = tempfile::tempdir().unwrap();
    let rollups = dir.path().join("rollups");
    let config = fixtures_dir().join("revenue.toml");
    let output = run(&["revenue", path_str(&config), "--rollup-dir", path_str(&rollups)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    for year in 2020..=2022 {
        assert!(rollups.join(format!("entity-revenue-{year}.json")).exists());
        assert!(rollups.join(format!("donors-{year}.json")).exists());
    }
    let trends: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(rollups.join("contributor-trends.json")).unwrap())
            .unwrap();
    assert_eq!(trends["years"], serde_json::json!([2020, 2021, 2022]));
}

// ===========================================================================
// lfuse expenses
// ===========================================================================

#[test]
fn expenses_json_is_single_value() {
    let config = fixtures_dir().join("expenses.toml");
    let output = run(&["expenses", path_str(&config), "--json"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&output.stdout);
    assert_eq!(val["meta"]["kind"], "expenses");
    assert_eq!(val["secondary_years"], serde_json::json!([2020]));
    assert_eq!(val["records"].as_array().unwrap().len(), 9);
}

#[test]
fn wrong_config_kind_exits_3() {
    let config = fixtures_dir().join("revenue.toml");
    let output = run(&["expenses", path_str(&config)]);
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_years_exit_6() {
    let dir = fixture_copy("expenses.toml", |t| t.replace("end = 2020", "end = 2021"));
    let output = run(&["expenses", path_str(&dir.path().join("expenses.toml"))]);
    assert_eq!(output.status.code(), Some(6), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("2021"));
}

// ===========================================================================
// lfuse check
// ===========================================================================

#[test]
fn check_accepts_fixture_configs() {
    for name in ["revenue.toml", "expenses.toml"] {
        let config = fixtures_dir().join(name);
        let output = run(&["check", path_str(&config), "--json"]);
        assert!(output.status.success(), "{name}: {}", stderr(&output));
        let val = assert_single_json(&output.stdout);
        assert_eq!(val["valid"], true);
    }
}

#[test]
fn check_rejects_inverted_year_range() {
    let dir = fixture_copy("revenue.toml", |t| t.replace("start = 2020", "start = 2030"));
    let output = run(&["check", path_str(&dir.path().join("revenue.toml"))]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).starts_with("error:"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = run(&["reconcile"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_config_argument_is_usage_error() {
    let output = run(&["revenue"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn help_exits_cleanly() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("revenue"));
}
