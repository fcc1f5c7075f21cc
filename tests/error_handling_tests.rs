use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config_dir = temp_dir.path().join(".immocrm");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("rc"), format!("data.location={}\n", db_path.display())).unwrap();
    std::env::set_var("HOME", temp_dir.path().to_str().unwrap());
    (temp_dir, guard)
}

fn get_crm_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("immocrm").unwrap();
    cmd.env("HOME", temp_dir.path());
    cmd
}

fn sign_in(temp_dir: &TempDir) {
    get_crm_cmd(temp_dir).args(["login", "alice"]).assert().success();
    get_crm_cmd(temp_dir).args(["org", "create", "Agence du Port"]).assert().success();
}

#[test]
fn test_not_logged_in_error() {
    let (temp_dir, _guard) = setup_test_env();

    get_crm_cmd(&temp_dir).args(["contacts", "list"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"))
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_no_organization_selected_error() {
    let (temp_dir, _guard) = setup_test_env();
    get_crm_cmd(&temp_dir).args(["login", "alice"]).assert().success();

    // Blocked before anything is written
    get_crm_cmd(&temp_dir).args(["deals", "add", "Loft"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No organization selected"));
}

#[test]
fn test_contact_not_found_error() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["contacts", "show", "deadbeef"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_unknown_stage_suggests_nearest() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);
    get_crm_cmd(&temp_dir).args(["contacts", "add", "Claire", "Martin"]).assert().success();
    let output = get_crm_cmd(&temp_dir).args(["contacts", "list", "--json"]).output().unwrap();
    let contacts: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = contacts[0]["id"].as_str().unwrap().to_string();

    get_crm_cmd(&temp_dir).args(["contacts", "move", &id, "mandats"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown stage 'mandats'"))
        .stderr(predicate::str::contains("Did you mean: mandat"));
}

#[test]
fn test_unknown_stage_in_filter() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["deals", "list", "stage=vendus"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("vendus"));
}

#[test]
fn test_invalid_probability_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["deals", "add", "Loft", "--probability", "140"]).assert()
        .failure()
        .stderr(predicate::str::contains("Probability must be between 0 and 100"));
}

#[test]
fn test_invalid_amount_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["deals", "add", "Loft", "--amount", "beaucoup"]).assert()
        .failure()
        .stderr(predicate::str::contains("Invalid amount"));
}

#[test]
fn test_oversized_amount_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["deals", "add", "Domaine", "--amount", "100000000000000000"]).assert()
        .failure()
        .stderr(predicate::str::contains("Amount cannot exceed"));
    get_crm_cmd(&temp_dir).args(["deals", "list"]).assert()
        .success()
        .stdout(predicate::str::contains("No deals found."));
}

#[test]
fn test_invalid_activity_type_suggests_nearest() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["activities", "add", "Rappeler", "--type", "apel"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid activity type"))
        .stderr(predicate::str::contains("Did you mean: appel"));
}

#[test]
fn test_invalid_due_date_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);

    get_crm_cmd(&temp_dir).args(["activities", "add", "Rappeler", "--due", "someday"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn test_empty_modify_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);
    get_crm_cmd(&temp_dir).args(["deals", "add", "Loft"]).assert().success();
    let output = get_crm_cmd(&temp_dir).args(["deals", "list", "--json"]).output().unwrap();
    let deals: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = deals[0]["id"].as_str().unwrap().to_string();

    get_crm_cmd(&temp_dir).args(["deals", "modify", &id]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Nothing to update"));
}

#[test]
fn test_only_owners_add_members() {
    let (temp_dir, _guard) = setup_test_env();
    sign_in(&temp_dir);
    get_crm_cmd(&temp_dir).args(["org", "add-member", "bob"]).assert().success()
        .stdout(predicate::str::contains("Added bob as agent"));

    // bob is an agent of the single organization
    get_crm_cmd(&temp_dir).args(["login", "bob"]).assert().success();
    get_crm_cmd(&temp_dir).args(["org", "add-member", "carol"]).assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Permission denied"));
}
