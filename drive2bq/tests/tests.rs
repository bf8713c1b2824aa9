use cli_test_dir::*;

#[test]
fn help_flag() {
    let testdir = TestDir::new("drive2bq", "help_flag");
    let output = testdir.cmd().arg("--help").expect_success();
    assert!(output.stdout_str().contains("drive2bq"));
    assert!(output.stdout_str().contains("--folder-id"));
}

#[test]
fn version_flag() {
    let testdir = TestDir::new("drive2bq", "version_flag");
    let output = testdir.cmd().arg("--version").expect_success();
    assert!(output.stdout_str().contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_folder_id_fails() {
    let testdir = TestDir::new("drive2bq", "missing_folder_id_fails");
    let output = testdir
        .cmd()
        .env("DRIVE2BQ_CONFIG_DIR", testdir.path("config"))
        .env_remove("RUST_LOG")
        .expect_failure();
    assert!(output.stdout_str().contains("drive.folder_id"));
}

#[test]
fn invalid_config_fails() {
    let testdir = TestDir::new("drive2bq", "invalid_config_fails");
    testdir.create_file("drive2bq.toml", "[csv]\nencoding = \"ebcdic\"\n");
    let output = testdir
        .cmd()
        .args(["--config", "drive2bq.toml", "--folder-id", "abc"])
        .env_remove("RUST_LOG")
        .expect_failure();
    assert!(output.stdout_str().contains("csv.encoding"));
}

#[test]
fn unknown_log_format_is_rejected() {
    let testdir = TestDir::new("drive2bq", "unknown_log_format_is_rejected");
    testdir
        .cmd()
        .args(["--log-format", "xml"])
        .expect_failure();
}
