//! Parsers for the positional text the CLI prints in `--batch` mode.
//!
//! Lines are split on single spaces, so runs of spaces yield empty fields and
//! the offsets below count them.

use super::types::{ClusterInfo, ClusterStatus, JobInfo, JobStatus};

const CLUSTER_ID_FIELD: usize = 0;
const CLUSTER_STATUS_FIELD: usize = 1;
const BACKUP_ID_FIELD: usize = 0;
// time-only CREATED column (backup taken today)
const BACKUP_TITLE_FIELD_TODAY: usize = 16;
// date and time CREATED column (older backups)
const BACKUP_TITLE_FIELD_OLDER: usize = 17;
const JOB_ID_FIELD: usize = 0;
const JOB_STATUS_FIELD: usize = 2;

/// Removes ANSI escape sequences (`ESC [ ... final-byte`).
#[must_use]
pub fn strip_ansi(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\u{1b}' {
            output.push(ch);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if ('@'..='~').contains(&next) {
                    break;
                }
            }
        }
    }
    output
}

#[must_use]
pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

/// Parses `cluster --list --long --batch --cluster-name=...` output.
#[must_use]
pub fn parse_cluster_listing(stdout: &str) -> Option<ClusterInfo> {
    let clean = strip_ansi(stdout);
    let fields: Vec<&str> = clean.split(' ').collect();
    let id = fields.get(CLUSTER_ID_FIELD).copied().unwrap_or_default();
    if !is_numeric(id) {
        return None;
    }
    let status = fields.get(CLUSTER_STATUS_FIELD).copied().unwrap_or_default();
    let status = status.trim().parse::<ClusterStatus>().ok()?;
    Some(ClusterInfo {
        id: id.parse().ok()?,
        status,
    })
}

/// Parses `backup --list --long --batch` output and returns the id of the
/// backup titled `title`.
#[must_use]
pub fn find_backup_id(stdout: &str, title: &str) -> Option<u64> {
    let clean = strip_ansi(stdout);
    let mut lines: Vec<&str> = clean.split('\n').collect();
    // trailing newline leaves an empty last element
    lines.pop();
    for line in lines {
        let fields: Vec<&str> = line.split(' ').collect();
        let today = fields.get(BACKUP_TITLE_FIELD_TODAY).copied();
        let older = fields.get(BACKUP_TITLE_FIELD_OLDER).copied();
        if today == Some(title) || older == Some(title) {
            let id = fields.get(BACKUP_ID_FIELD).copied().unwrap_or_default();
            return if is_numeric(id) { id.parse().ok() } else { None };
        }
    }
    None
}

/// Parses `job --list --batch` output and returns the most recent job.
#[must_use]
pub fn parse_last_job(stdout: &str) -> Option<JobInfo> {
    let clean = strip_ansi(stdout);
    let last_line = clean.lines().rev().find(|line| !line.trim().is_empty())?;
    let fields: Vec<&str> = last_line.split(' ').collect();
    let id = fields.get(JOB_ID_FIELD).copied().unwrap_or_default();
    if !is_numeric(id) {
        return None;
    }
    let status = fields.get(JOB_STATUS_FIELD).copied().unwrap_or_default();
    Some(JobInfo {
        id: id.parse().ok()?,
        status: status.trim().parse::<JobStatus>().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup_line(id: &str, created: &[&str], title: &str) -> String {
        // 16 positional fields precede the title when CREATED is a single token
        let mut fields = vec![id, "-", "1", "COMPLETED", "pipas", "10.0.3.12", "", "", ""];
        fields.extend_from_slice(created);
        fields.extend_from_slice(&["", "", "", "", "", "1.2MiB"]);
        fields.push(title);
        fields.join(" ")
    }

    #[test]
    fn test_strip_ansi_removes_color_codes() {
        assert_eq!(
            strip_ansi("\u{1b}[1;32m12\u{1b}[0m STARTED"),
            "12 STARTED"
        );
        assert_eq!(strip_ansi("plain text"), "plain text");
    }

    #[test]
    fn test_parse_cluster_listing() {
        let info = parse_cluster_listing("12 STARTED elastic pipas admins cluster-es\n").unwrap();
        assert_eq!(info.id, 12);
        assert_eq!(info.status, ClusterStatus::Started);
    }

    #[test]
    fn test_parse_cluster_listing_with_colors() {
        let info =
            parse_cluster_listing("\u{1b}[1m7\u{1b}[0m \u{1b}[33mDEGRADED\u{1b}[0m es\n").unwrap();
        assert_eq!(info.id, 7);
        assert_eq!(info.status, ClusterStatus::Degraded);
    }

    #[test]
    fn test_parse_cluster_listing_rejects_non_numeric_id() {
        assert!(parse_cluster_listing("Total: 0\n").is_none());
        assert!(parse_cluster_listing("").is_none());
    }

    #[test]
    fn test_parse_cluster_listing_keeps_unknown_status() {
        let info = parse_cluster_listing("3 INITIALIZING x").unwrap();
        assert_eq!(info.status, ClusterStatus::Other("INITIALIZING".to_string()));
    }

    #[test]
    fn test_find_backup_id_created_today() {
        let line = backup_line("41", &["10:38:25"], "elastic_single_backup");
        assert_eq!(line.split(' ').nth(16), Some("elastic_single_backup"));
        let stdout = format!("{line}\n");
        assert_eq!(find_backup_id(&stdout, "elastic_single_backup"), Some(41));
    }

    #[test]
    fn test_find_backup_id_created_other_day() {
        let other = backup_line("40", &["10:00:00"], "another_backup");
        let line = backup_line("42", &["2022-05-04", "10:38:25"], "mssql_single_backup");
        assert_eq!(line.split(' ').nth(17), Some("mssql_single_backup"));
        let stdout = format!("{other}\n{line}\n");
        assert_eq!(find_backup_id(&stdout, "mssql_single_backup"), Some(42));
    }

    #[test]
    fn test_find_backup_id_missing_title() {
        let line = backup_line("41", &["10:38:25"], "elastic_single_backup");
        assert_eq!(find_backup_id(&format!("{line}\n"), "other"), None);
        assert_eq!(find_backup_id("", "other"), None);
    }

    #[test]
    fn test_parse_last_job() {
        let stdout = "101 1 FINISHED pipas admins 10:00:01 100% Create cluster\n\
                      102 1 RUNNING pipas admins 10:05:01 20% Create backup\n";
        let job = parse_last_job(stdout).unwrap();
        assert_eq!(job.id, 102);
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn test_parse_last_job_without_trailing_newline() {
        let job = parse_last_job("55 3 FINISHED pipas").unwrap();
        assert_eq!(job.id, 55);
        assert_eq!(job.status, JobStatus::Finished);
    }

    #[test]
    fn test_parse_last_job_rejects_garbage() {
        assert!(parse_last_job("No jobs found.\n").is_none());
        assert!(parse_last_job("\n\n").is_none());
    }
}
