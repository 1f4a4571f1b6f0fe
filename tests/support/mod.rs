// Helper functions are shared across multiple test crates; not every helper is
// referenced in each test module.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) const CALLS_LOG: &str = "calls.log";

/// Writes an `s9s` stand-in that replays canned output.
///
/// The script picks the first noun (`cluster`, `backup`, `job`) and the first
/// verb flag among its arguments and prints `<noun>_<verb>.out` to stdout and
/// `<noun>_<verb>.err` to stderr when those files exist next to it. A
/// `<noun>_<verb>.queue` file takes precedence over `.out`: each call prints
/// and consumes its first line, and the last line repeats. Every invocation is
/// appended to `calls.log`.
pub(crate) fn write_fake_s9s(dir: &Path) -> Result<PathBuf> {
    let script = format!(
        r#"#!/bin/sh
set -eu

dir="{dir}"
noun=""
verb=""
for arg in "$@"; do
  case "$arg" in
    cluster|backup|job)
      if [ -z "$noun" ]; then noun="$arg"; fi
      ;;
    --list|--create|--drop|--restore|--delete|--create-database|--log)
      if [ -z "$verb" ]; then verb="${{arg#--}}"; fi
      ;;
  esac
done

printf "%s\n" "$*" >> "$dir/{CALLS_LOG}"

if [ -f "$dir/${{noun}}_${{verb}}.err" ]; then
  cat "$dir/${{noun}}_${{verb}}.err" >&2
fi
queue="$dir/${{noun}}_${{verb}}.queue"
if [ -f "$queue" ]; then
  head -n 1 "$queue"
  if [ "$(wc -l < "$queue")" -gt 1 ]; then
    tail -n +2 "$queue" > "$queue.next"
    mv "$queue.next" "$queue"
  fi
  exit 0
fi
if [ -f "$dir/${{noun}}_${{verb}}.out" ]; then
  cat "$dir/${{noun}}_${{verb}}.out"
fi
exit 0
"#,
        dir = dir.display()
    );
    let path = dir.join("s9s");
    fs::write(&path, script).context("Failed to write fake s9s script")?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o700))
        .context("Failed to set fake s9s permissions")?;
    Ok(path)
}

pub(crate) fn set_s9s_stdout(dir: &Path, key: &str, stdout: &str) -> Result<()> {
    fs::write(dir.join(format!("{key}.out")), stdout)
        .with_context(|| format!("Failed to write canned stdout for {key}"))
}

pub(crate) fn set_s9s_stderr(dir: &Path, key: &str, stderr: &str) -> Result<()> {
    fs::write(dir.join(format!("{key}.err")), stderr)
        .with_context(|| format!("Failed to write canned stderr for {key}"))
}

/// Queues one line of stdout per call for `key`; the last line repeats.
pub(crate) fn set_s9s_queue(dir: &Path, key: &str, lines: &[&str]) -> Result<()> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(dir.join(format!("{key}.queue")), contents)
        .with_context(|| format!("Failed to write canned queue for {key}"))
}

pub(crate) fn s9s_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join(CALLS_LOG))
        .unwrap_or_default()
        .lines()
        .map(ToString::to_string)
        .collect()
}

/// One row of `backup --list --long --batch` with a time-only CREATED column.
pub(crate) fn backup_row(id: u64, title: &str) -> String {
    let id = id.to_string();
    let fields = [
        id.as_str(),
        "-",
        "1",
        "COMPLETED",
        "pipas",
        "10.0.3.12",
        "",
        "",
        "",
        "09:14:02",
        "",
        "",
        "",
        "",
        "",
        "1.2MiB",
        title,
    ];
    fields.join(" ")
}

pub(crate) fn sync_response(metadata: Value) -> Value {
    json!({
        "type": "sync",
        "status": "Success",
        "status_code": 200,
        "operation": "",
        "error_code": 0,
        "error": "",
        "metadata": metadata
    })
}

pub(crate) fn async_response(operation_id: &str) -> Value {
    json!({
        "type": "async",
        "status": "Operation created",
        "status_code": 100,
        "operation": format!("/1.0/operations/{operation_id}"),
        "error_code": 0,
        "error": "",
        "metadata": {"id": operation_id}
    })
}

pub(crate) fn instance_json(name: &str, status: &str) -> Value {
    json!({
        "name": name,
        "status": status,
        "type": "container",
        "location": "none"
    })
}

/// Serves `GET /1.0/instances/<name>` with the given status.
pub(crate) async fn stub_instance(server: &MockServer, name: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/1.0/instances/{name}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(sync_response(instance_json(name, status))),
        )
        .mount(server)
        .await;
}

/// Serves the wait endpoint of an operation that ended successfully.
pub(crate) async fn stub_operation_success(server: &MockServer, id: &str, metadata: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/1.0/operations/{id}/wait")))
        .respond_with(ResponseTemplate::new(200).set_body_json(sync_response(json!({
            "id": id,
            "status": "Success",
            "status_code": 200,
            "err": "",
            "metadata": metadata
        }))))
        .mount(server)
        .await;
}

/// Serves the wait endpoint of an operation that failed.
pub(crate) async fn stub_operation_failure(server: &MockServer, id: &str, err: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/1.0/operations/{id}/wait")))
        .respond_with(ResponseTemplate::new(200).set_body_json(sync_response(json!({
            "id": id,
            "status": "Failure",
            "status_code": 400,
            "err": err,
            "metadata": null
        }))))
        .mount(server)
        .await;
}
