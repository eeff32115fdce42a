use assert_cmd::Command;
use predicates::prelude::*;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper function to create a page file inside a fresh temporary directory
fn create_page(text: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("TeamPage.txt");
    fs::write(&path, text).unwrap();
    (temp_dir, path)
}

/// Helper to set up environment for a test
fn setup_test_env() {
    // Clear any environment variables that might interfere
    env::remove_var("ACL_CONFIG_PATH");
    env::remove_var("ACL_DIRECTORY_PATH");
}

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wiki-acl").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn test_cli_help() {
    setup_test_env();

    let mut cmd = Command::cargo_bin("wiki-acl").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wiki ACL CLI"))
        .stdout(predicate::str::contains("normalize"));
}

#[test]
fn test_parse_prints_canonical_acl() {
    setup_test_env();
    let (dir, page) = create_page("Intro\n[{ ALLOW  edit Devin , Charlie }]\n[{ALLOW view Charlie}]\n[{ALLOW delete Devin}]\n");

    cli(&dir)
        .arg("parse")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[{ALLOW delete Devin}]\n[{ALLOW edit Charlie,Devin}]\n[{ALLOW view Charlie}]\n",
        ));
}

#[test]
fn test_parse_reports_malformed_directives() {
    setup_test_env();
    let (dir, page) = create_page("[{ALLOW fly Bob}]\n[{ALLOW view Alice}]\n");

    cli(&dir)
        .args(["parse", "--format", "json"])
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"malformed\""))
        .stdout(predicate::str::contains("[{ALLOW fly Bob}]"))
        .stdout(predicate::str::contains("\"canonical\": \"[{ALLOW view Alice}]\\n\""));
}

#[test]
fn test_check_allow_and_deny() {
    setup_test_env();
    let (dir, page) = create_page("[{ALLOW edit Charlie, Herman}]");

    cli(&dir)
        .args(["check", "--action", "view", "--names", "Herman"])
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOW"))
        .stdout(predicate::str::contains("view on TeamPage for Herman"))
        .stdout(predicate::str::contains("DENY").not());

    cli(&dir)
        .args(["check", "--action", "delete", "--names", "Herman"])
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("DENY"))
        .stdout(predicate::str::contains("delete on TeamPage"));
}

#[test]
fn test_check_expression_dialect_with_directory() {
    setup_test_env();
    let (dir, page) = create_page("[{ALLOW edit Editors AND NOT Guests}]");
    let directory = dir.path().join("directory.yaml");
    fs::write(
        &directory,
        "users: [Alice, Bob]\ngroups:\n  Editors: [Alice, Bob]\n  Guests: [Bob]\n",
    )
    .unwrap();

    cli(&dir)
        .args(["--dialect", "expression", "--directory"])
        .arg(&directory)
        .args(["check", "--action", "comment", "--subject", "Alice"])
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOW"))
        .stdout(predicate::str::contains("comment on TeamPage"));

    cli(&dir)
        .args(["--dialect", "expression", "--directory"])
        .arg(&directory)
        .args(["check", "--action", "edit", "--subject", "Bob"])
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("DENY"))
        .stdout(predicate::str::contains("edit on TeamPage"));
}

#[test]
fn test_check_rejects_unknown_action() {
    setup_test_env();
    let (dir, page) = create_page("[{ALLOW edit Bob}]");

    cli(&dir)
        .args(["check", "--action", "fly", "--names", "Bob"])
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown permission action: fly"));
}

#[test]
fn test_normalize_rewrites_page() {
    setup_test_env();
    let (dir, page) = create_page("Notes\n[{ALLOW  edit  Bob ,Alice}]\nMore [{ALLOW fly Eve}]\n");

    cli(&dir)
        .arg("normalize")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("Normalized"))
        .stderr(predicate::str::contains("kept malformed directive"));

    assert_eq!(
        fs::read_to_string(&page).unwrap(),
        "[{ALLOW edit Alice,Bob}]\nNotes\nMore [{ALLOW fly Eve}]\n"
    );
}

#[test]
fn test_config_show_uses_project_config() {
    setup_test_env();
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config").join("config.acl.yaml"),
        r#"id: acl
name: Test ACL Configuration
provider: authz
version: 1.0.0
values:
  dialect: expression
  default_policy: deny
"#,
    )
    .unwrap();

    cli(&dir)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dialect\": \"expression\""))
        .stdout(predicate::str::contains("\"default_policy\": \"deny\""));
}

#[test]
fn test_invalid_config_fails() {
    setup_test_env();
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.yaml");
    fs::write(&config, "id: acl\nname: ACL\nprovider: authz\nversion: '1'\nvalues:\n  implications:\n    view: [edit]\n    edit: [view]\n").unwrap();

    cli(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("implication cycle"));
}
