//! Check counters shared across consecutive runs.
//!
//! The store is a `KEY=VALUE` file a shell can `source`. Counters missing from
//! the file start from the same-named environment variable, or 0.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

pub const PERFORMED_CHECKS: &str = "NUMBER_OF_PERFORMED_CHECKS";
pub const SUCCESS_CHECKS: &str = "NUMBER_OF_SUCCESS_CHECKS";
pub const WARNING_CHECKS: &str = "NUMBER_OF_WARNING_CHECKS";
pub const FAILED_CHECKS: &str = "NUMBER_OF_FAILED_CHECKS";
pub const FAILED_FLAG: &str = "FAILED";

pub const COUNTER_KEYS: [&str; 4] = [
    PERFORMED_CHECKS,
    SUCCESS_CHECKS,
    WARNING_CHECKS,
    FAILED_CHECKS,
];

const FLAG_YES: &str = "yes";
const FLAG_NO: &str = "no";
const EXPORT_PREFIX: &str = "export ";

#[derive(Debug, Clone)]
pub struct CounterStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl CounterStore {
    /// Loads the store, seeding absent counters from the process environment.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Loads the store, seeding absent counters through `env`.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn load_with_env<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse(&contents)
        } else {
            BTreeMap::new()
        };
        for &key in COUNTER_KEYS.iter().chain(std::iter::once(&FAILED_FLAG)) {
            if values.contains_key(key) {
                continue;
            }
            if let Some(value) = env(key) {
                debug!("Seeding {key} from environment: {value}");
                values.insert(key.to_string(), value);
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Numeric value of a counter; missing or non-numeric values read as 0.
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        let Some(raw) = self.values.get(name) else {
            return 0;
        };
        raw.trim().parse().unwrap_or_else(|_| {
            warn!("Counter {name} has non-numeric value {raw:?}, using 0");
            0
        })
    }

    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Adds `by` to a counter and returns the new value.
    pub fn incr(&mut self, name: &str, by: u64) -> u64 {
        let value = self.get(name).saturating_add(by);
        self.set(name, value);
        value
    }

    pub fn set(&mut self, name: &str, value: impl ToString) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Zeroes every counter and clears the failure flag.
    pub fn reset(&mut self) {
        self.values.clear();
        for key in COUNTER_KEYS {
            self.set(key, 0);
        }
        self.set(FAILED_FLAG, FLAG_NO);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Writes the store next to its final path and renames it into place.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("Failed to format timestamp")?;
        let mut contents = format!("# s9s-ft counters, generated at {generated_at}\n");
        for (key, value) in &self.values {
            contents.push_str(&format!("{key}={value}\n"));
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))
    }
}

fn parse(contents: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix(EXPORT_PREFIX).unwrap_or(line);
        match line.split_once('=') {
            Some((key, value)) => {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => warn!("Ignoring malformed counter line: {line}"),
        }
    }
    values
}

/// Aggregate check results of one or more suites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckTotals {
    pub checks: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: u64,
    pub successful: bool,
}

impl CheckTotals {
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.checks
            .saturating_sub(self.skipped + self.failed + self.errors)
    }

    #[must_use]
    pub fn merge(self, other: CheckTotals) -> CheckTotals {
        CheckTotals {
            checks: self.checks + other.checks,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
            errors: self.errors + other.errors,
            successful: self.successful && other.successful,
        }
    }

    /// Adds these totals to the store's counters and sets the failure flag.
    pub fn publish(&self, store: &mut CounterStore) {
        store.incr(PERFORMED_CHECKS, self.checks);
        store.incr(SUCCESS_CHECKS, self.successes());
        store.incr(WARNING_CHECKS, self.skipped);
        store.incr(FAILED_CHECKS, self.failed + self.errors);
        store.set(
            FAILED_FLAG,
            if self.successful { FLAG_NO } else { FLAG_YES },
        );
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = CounterStore::load_with_env(&dir.path().join("c.env"), no_env).unwrap();
        assert_eq!(store.get(PERFORMED_CHECKS), 0);
        assert!(store.flag(FAILED_FLAG).is_none());
    }

    #[test]
    fn test_env_seeds_absent_counters_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.env");
        std::fs::write(&path, "NUMBER_OF_PERFORMED_CHECKS=7\n").unwrap();
        let store = CounterStore::load_with_env(&path, |name| match name {
            PERFORMED_CHECKS => Some("100".to_string()),
            SUCCESS_CHECKS => Some("4".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(store.get(PERFORMED_CHECKS), 7);
        assert_eq!(store.get(SUCCESS_CHECKS), 4);
    }

    #[test]
    fn test_non_numeric_reads_as_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.env");
        std::fs::write(&path, "NUMBER_OF_FAILED_CHECKS=abc\n").unwrap();
        let mut store = CounterStore::load_with_env(&path, no_env).unwrap();
        assert_eq!(store.get(FAILED_CHECKS), 0);
        assert_eq!(store.incr(FAILED_CHECKS, 2), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("c.env");
        let mut store = CounterStore::load_with_env(&path, no_env).unwrap();
        store.incr(PERFORMED_CHECKS, 3);
        store.set(FAILED_FLAG, "yes");
        store.save().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# s9s-ft counters, generated at "));
        assert!(contents.contains("NUMBER_OF_PERFORMED_CHECKS=3\n"));

        let reloaded = CounterStore::load_with_env(&path, no_env).unwrap();
        assert_eq!(reloaded.get(PERFORMED_CHECKS), 3);
        assert_eq!(reloaded.flag(FAILED_FLAG), Some("yes"));
    }

    #[test]
    fn test_parse_accepts_export_lines() {
        let values = parse("# header\nexport FAILED=no\n\nbogus\n");
        assert_eq!(values.get(FAILED_FLAG).map(String::as_str), Some("no"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_reset() {
        let dir = tempdir().unwrap();
        let mut store = CounterStore::load_with_env(&dir.path().join("c.env"), no_env).unwrap();
        store.incr(SUCCESS_CHECKS, 9);
        store.reset();
        assert_eq!(store.get(SUCCESS_CHECKS), 0);
        assert_eq!(store.flag(FAILED_FLAG), Some("no"));
        assert_eq!(store.entries().count(), 5);
    }

    #[test]
    fn test_publish_accumulates() {
        let dir = tempdir().unwrap();
        let mut store = CounterStore::load_with_env(&dir.path().join("c.env"), |name| {
            (name == PERFORMED_CHECKS).then(|| "10".to_string())
        })
        .unwrap();
        let totals = CheckTotals {
            checks: 7,
            skipped: 1,
            failed: 1,
            errors: 1,
            successful: false,
        };
        totals.publish(&mut store);
        assert_eq!(store.get(PERFORMED_CHECKS), 17);
        assert_eq!(store.get(SUCCESS_CHECKS), 4);
        assert_eq!(store.get(WARNING_CHECKS), 1);
        assert_eq!(store.get(FAILED_CHECKS), 2);
        assert_eq!(store.flag(FAILED_FLAG), Some("yes"));
    }

    #[test]
    fn test_merge_totals() {
        let ok = CheckTotals {
            checks: 2,
            successful: true,
            ..CheckTotals::default()
        };
        let bad = CheckTotals {
            checks: 3,
            failed: 1,
            successful: false,
            ..CheckTotals::default()
        };
        let merged = ok.merge(bad);
        assert_eq!(merged.checks, 5);
        assert_eq!(merged.successes(), 4);
        assert!(!merged.successful);
    }
}
