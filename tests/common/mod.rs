// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::{NamedTempFile, TempDir};

pub const HEADER: &str = "timestamp,ip,method,url,status,response_time";

/// Path of the built logshard binary
pub fn logshard_binary() -> &'static str {
    env!("CARGO_BIN_EXE_logshard")
}

/// Command isolated from any config.json in the working directory or the
/// user's config dir
pub fn logshard_command(workdir: &Path) -> Command {
    let mut cmd = Command::new(logshard_binary());
    cmd.current_dir(workdir)
        .env("XDG_CONFIG_HOME", workdir.join("xdg"))
        .env("HOME", workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Run logshard with `args` from inside `workdir`
pub fn run_logshard_in(workdir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = logshard_command(workdir)
        .args(args)
        .output()
        .expect("Failed to execute logshard");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run logshard over a temporary log file holding `file_content`.
/// `--file <path>` is put in front of `args`.
pub fn run_logshard_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let workdir = TempDir::new().expect("Failed to create temp dir");
    let log_file = write_log_file(workdir.path(), "access.csv", file_content);

    let mut full_args = vec!["--file", log_file.to_str().unwrap()];
    full_args.extend_from_slice(args);
    run_logshard_in(workdir.path(), &full_args)
}

/// Write `content` to `dir/name` and return the path
pub fn write_log_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write log file");
    path
}

/// Header plus the given data rows, newline terminated
pub fn access_log(rows: &[&str]) -> String {
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    content
}

/// Header plus `count` generated rows; every seventh row is a 500
pub fn generated_access_log(count: usize) -> String {
    let mut content = String::from(HEADER);
    content.push('\n');
    for i in 0..count {
        let status = if i % 7 == 0 { 500 } else { 200 };
        content.push_str(&format!(
            "2024-01-15 10:{:02}:{:02},10.0.{}.{},GET,/item/{},{},{}\n",
            (i / 60) % 60,
            i % 60,
            i % 3,
            i % 5,
            i,
            status,
            100 + (i % 3) * 100
        ));
    }
    content
}

/// Parse each stdout line as JSON
pub fn parse_json_lines(output: &str) -> Vec<serde_json::Value> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Failed to parse JSON line"))
        .collect()
}

/// Temporary config file with the given JSON body
pub fn config_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(body.as_bytes())
        .expect("Failed to write to temp file");
    file
}
