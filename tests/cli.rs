//! E2E tests for the budgetc pipeline commands

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

/// The binary, run from `dir` with no ambient config or log filters
fn budgetc(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_budgetc"));
    cmd.current_dir(dir)
        .env_remove("BUDGETC_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success(), "Command failed: {:?}", output);
    output
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn normalize_mints_reproducible_ids() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    for out in [&first, &second] {
        run(budgetc(dir.path())
            .arg("--config")
            .arg(data("budgetc.json"))
            .arg("normalize")
            .arg(data("checking-2025.csv"))
            .arg("-o")
            .arg(out));
    }

    let rows = lines(&first);
    assert_eq!(rows[0], "id,date,description,amount,account,category,note");
    assert_eq!(rows.len(), 5);
    assert!(rows[1].ends_with(",2025-05-01,PAYROLL ACME,3100.00,Checking,,"));
    assert!(rows[4].ends_with(",2025-06-02,SHELL OIL 5544,-40.10,Checking,,"));

    let ids: Vec<&str> = rows[1..].iter().map(|r| r.split(',').next().unwrap()).collect();
    assert!(ids.iter().all(|id| id.len() == 10));
    assert_ne!(ids[1], ids[2], "duplicate rows must get distinct ids");
    assert_eq!(rows, lines(&second));
}

#[test]
fn normalize_without_matching_importer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("savings.csv");
    fs::copy(data("checking-2025.csv"), &raw).unwrap();

    let output = budgetc(dir.path())
        .arg("--config")
        .arg(data("budgetc.json"))
        .args(["normalize", "savings.csv", "-o", "out.csv"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no importer matched"));
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn config_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    run(budgetc(dir.path())
        .env("BUDGETC_CONFIG", data("budgetc.json"))
        .arg("normalize")
        .arg(data("checking-2025.csv"))
        .args(["-o", "out.csv"]));
    assert_eq!(lines(&dir.path().join("out.csv")).len(), 5);
}

#[test]
fn split_by_month() {
    let dir = tempfile::tempdir().unwrap();
    run(budgetc(dir.path())
        .arg("split")
        .arg(data("transactions.csv"))
        .args(["--by", "month", "-o", "periods"]));

    let may = lines(&dir.path().join("periods/2025-05-transactions.csv"));
    let june = lines(&dir.path().join("periods/2025-06-transactions.csv"));
    assert_eq!(may.len(), 6);
    assert_eq!(june.len(), 2);
    assert!(june[1].starts_with("t06,"));
}

#[test]
fn csv_and_json_changesets_apply_identically() {
    let dir = tempfile::tempdir().unwrap();
    for (changes, out) in [("changes.csv", "from-csv.csv"), ("changes.json", "from-json.csv")] {
        run(budgetc(dir.path())
            .arg("apply")
            .arg(data("transactions.csv"))
            .arg(data(changes))
            .args(["-o", out]));
    }

    let from_csv = lines(&dir.path().join("from-csv.csv"));
    assert_eq!(from_csv, lines(&dir.path().join("from-json.csv")));

    assert_eq!(from_csv.len(), 8);
    assert_eq!(from_csv[3], "t03,2025-05-03,WM SUPERCENTER #1234,-254.20,Checking,Groceries,");
    assert_eq!(from_csv[4], "t04,2025-05-10,SHELL OIL 5544,-40.10,Checking,Fuel,fill up");
    assert!(from_csv[5].ends_with(",2025-05-12,WM SUPERCENTER #44,-50.00,Checking,Groceries,"));
    assert!(from_csv[6].ends_with(",2025-05-12,WM SUPERCENTER #44,-30.00,Checking,Household,"));
    assert!(from_csv[7].ends_with(",2025-05-20,CASH GIFT,50.00,Wallet,Gifts,"));
    assert!(from_csv.iter().all(|row| !row.starts_with("t05,") && !row.starts_with("t06,")));
}

#[test]
fn dangling_reference_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = budgetc(dir.path())
        .arg("apply")
        .arg(data("transactions.csv"))
        .arg(data("dangling.csv"))
        .args(["-o", "out.csv"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("delete references unknown id 't99'"), "{stderr}");
    assert!(!dir.path().join("out.csv").exists());
    assert!(!dir.path().join("out.csv.tmp").exists());
}

#[test]
fn balanced_splits_flag_rejects_uneven_split() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("uneven.csv"),
        "type,id,amount,category\nsplit,t05,-50.00,Groceries\nsplit,t05,-20.00,Household\n",
    )
    .unwrap();

    let output = budgetc(dir.path())
        .arg("apply")
        .arg(data("transactions.csv"))
        .args(["uneven.csv", "--balanced-splits", "-o", "out.csv"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("split t05"));

    run(budgetc(dir.path())
        .arg("apply")
        .arg(data("transactions.csv"))
        .args(["uneven.csv", "-o", "out.csv"]));
    assert_eq!(lines(&dir.path().join("out.csv")).len(), 8);
}

#[test]
fn categorize_without_input_writes_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    run(budgetc(dir.path())
        .arg("categorize")
        .arg(data("transactions.csv"))
        .arg("--categorized")
        .arg(data("history.csv"))
        .args(["--no-input", "-o", "suggested.csv"]));

    let rows = lines(&dir.path().join("suggested.csv"));
    assert_eq!(
        rows,
        [
            "type,id,date,description,amount,account,category,note",
            "update,t03,,,,,suggested:Groceries,",
            "update,t04,,,,,suggested:Fuel,",
            "update,t05,,,,,suggested:Groceries,",
        ]
    );

    // a second run appends
    run(budgetc(dir.path())
        .arg("categorize")
        .arg(data("transactions.csv"))
        .arg("--categorized")
        .arg(data("history.csv"))
        .args(["--no-input", "--auto-confirm", "-o", "suggested.csv"]));
    let rows = lines(&dir.path().join("suggested.csv"));
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[4], "update,t03,,,,,Groceries,");
}

#[test]
fn categorize_overwrite_with_nothing_recorded_removes_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    fs::write(&out, "type,id,category\nupdate,t99,Stale\n").unwrap();

    // no history shares a token with the uncategorized rows
    run(budgetc(dir.path())
        .arg("categorize")
        .arg(data("transactions.csv"))
        .args(["--no-input", "-o", "out.csv"]));
    assert_eq!(lines(&out).len(), 2);

    run(budgetc(dir.path())
        .arg("categorize")
        .arg(data("transactions.csv"))
        .args(["--no-input", "--overwrite", "-o", "out.csv"]));
    assert!(!out.exists());
}

#[test]
fn categorize_interactive_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = budgetc(dir.path())
        .arg("categorize")
        .arg(data("transactions.csv"))
        .arg("--categorized")
        .arg(data("history.csv"))
        .args(["-o", "answers.json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"c\ne\nGas\nq\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1) Groceries (1.00)"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("answers.json")).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"type": "update", "id": "t03", "category": "Groceries"},
            {"type": "update", "id": "t04", "category": "Gas"}
        ])
    );
}

#[test]
fn report_after_apply() {
    let dir = tempfile::tempdir().unwrap();
    run(budgetc(dir.path())
        .arg("apply")
        .arg(data("transactions.csv"))
        .arg(data("changes.csv"))
        .args(["-o", "final.csv"]));

    let output = run(budgetc(dir.path())
        .arg("report")
        .arg("--budget")
        .arg(data("budget.json"))
        .args(["--transactions", "final.csv", "--period", "2025-05", "-f", "csv"]));
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.starts_with(
        "section,period,type,name,budget,actual,variance,start_balance,end_balance,goal,reconcile_amount,notes"
    ));
    assert!(stdout.contains("category,2025-05,expense,Groceries,300.00,304.20,4.20,"));
    assert!(stdout.contains("fund,2025-05,fund,Emergency Fund,100.00,0.00,,1500.00,1600.00,2000.00,,"));
    assert!(stdout.contains("summary,,,Cash flow,,1555.70,"));
    assert!(stdout.contains("summary,,,Net variance,,15.70,"));

    let text = run(budgetc(dir.path())
        .arg("report")
        .arg("--budget")
        .arg(data("budget.json"))
        .args(["--transactions", "final.csv", "--period", "2025-05"]));
    let text = String::from_utf8_lossy(&text.stdout);
    assert!(text.contains("BUDGET REPORT (2025-05)"));
    assert!(text.contains("Emergency Fund"));
}

#[test]
fn list_filters_and_suggests() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(budgetc(dir.path())
        .arg("list")
        .arg(data("transactions.csv"))
        .args(["--filter", "amount<0", "--filter", "desc~wm", "--csv"]));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<&str> = stdout.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
    assert_eq!(ids, ["t03", "t05"]);

    let output = run(budgetc(dir.path())
        .arg("list")
        .arg(data("transactions.csv"))
        .args(["--uncategorized", "--suggest", "--categorized"])
        .arg(data("history.csv")));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Groceries (1.00), Household (0.50)"));
    assert!(stdout.contains("3 transactions"));

    let output = budgetc(dir.path())
        .arg("list")
        .arg(data("transactions.csv"))
        .args(["--filter", "colour=red"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn init_files_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    run(budgetc(dir.path()).args(["init", "config"]));
    let config = fs::read_to_string(dir.path().join("budgetc.json")).unwrap();
    assert!(config.contains("\"dateColumn\": \"Date\""));

    let again = budgetc(dir.path()).args(["init", "config"]).output().unwrap();
    assert!(!again.status.success());
    run(budgetc(dir.path()).args(["init", "config", "--force"]));

    run(budgetc(dir.path()).args(["init", "budget", "--period", "2025-07", "-o", "budget.csv"]));
    let budget = lines(&dir.path().join("budget.csv"));
    assert_eq!(budget[0], "period,type,name,budget,balance,goal,reconcile_amount,override_actual,notes");
    assert_eq!(budget.len(), 4);

    run(budgetc(dir.path()).args(["init", "changeset", "-o", "changes.json"]));
    assert!(dir.path().join("changes.json").exists());

    let output = run(budgetc(dir.path()).args(["schema", "changeset-header"]));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "type,id,date,description,amount,account,category,note"
    );
    let output = run(budgetc(dir.path()).args(["schema", "json-schema"]));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"type\""));
}
