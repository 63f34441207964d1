//! Binary-level CLI tests. Everything here runs offline: manual-mode
//! connect and the error paths never touch the network.

use assert_cmd::Command;
use predicates::prelude::*;
use sidekey::config::DATA_DIR_ENV;
use tempfile::TempDir;

fn sidekey(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sidekey").expect("binary");
    cmd.current_dir(data_dir.path());
    cmd.env(DATA_DIR_ENV, data_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_the_command_surface() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("connect"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("trade"))
        .stdout(predicate::str::contains("orders"))
        .stdout(predicate::str::contains("balance"));
}

#[test]
fn manual_connect_prints_an_approval_link_and_import_hint() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .args(["connect", "ops", "--manual", "--budget", "USDC:100"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://approve.sidekey.dev/grant?request=",
        ))
        .stdout(predicate::str::contains("budget=USDC%3A100"))
        .stdout(predicate::str::contains("sidekey import ops --request"));

    // The pending request landed encrypted in the data directory
    let requests: Vec<_> = std::fs::read_dir(dir.path().join("requests"))
        .unwrap()
        .collect();
    assert_eq!(requests.len(), 1);
}

#[test]
fn trade_without_a_session_fails_with_a_named_wallet() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .args([
            "trade", "ghost", "--market", "0xabc", "--outcome", "yes", "--amount", "10",
            "--dry-run",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no session stored for wallet 'ghost'"));
}

#[test]
fn import_rejects_a_malformed_request_id() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .args(["import", "ops", "--request", "not-a-uuid", "--ciphertext", "AAAA"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn import_of_an_unknown_request_fails() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .args([
            "import",
            "ops",
            "--request",
            "00000000-0000-4000-8000-000000000000",
            "--ciphertext",
            "AAAA",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no pending request"));
}

#[test]
fn wallet_names_with_path_separators_are_rejected() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .args(["connect", "a/../../x", "--manual"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wallet names"));
    // Nothing was written anywhere under (or above) the data directory
    assert!(!dir.path().join("requests").exists());
}

#[test]
fn budget_flags_are_validated_before_any_request_is_created() {
    let dir = TempDir::new().unwrap();
    sidekey(&dir)
        .args(["connect", "ops", "--manual", "--budget", "USDC"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("budget"));
    assert!(!dir.path().join("requests").exists());
}
