use std::fmt;

use tracing::info;

use super::{CheckError, CheckResult, Platform, SuiteKind};
use crate::counters::CheckTotals;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed { check: String, message: String },
    Error { message: String },
}

impl From<CheckResult> for TestOutcome {
    fn from(result: CheckResult) -> Self {
        match result {
            Ok(()) => TestOutcome::Passed,
            Err(CheckError::Assertion { check, message }) => TestOutcome::Failed { check, message },
            Err(CheckError::Harness(err)) => TestOutcome::Error {
                message: format!("{err:#}"),
            },
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => f.write_str("ok"),
            TestOutcome::Failed { check, message } => write!(f, "FAIL ({check}: {message})"),
            TestOutcome::Error { message } => write!(f, "ERROR ({message})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestRecord {
    pub name: String,
    pub platform: Option<Platform>,
    pub checks: u64,
    pub outcome: TestOutcome,
}

impl TestRecord {
    #[must_use]
    pub fn new(
        name: String,
        platform: Option<Platform>,
        checks: u64,
        outcome: impl Into<TestOutcome>,
    ) -> Self {
        Self {
            name,
            platform,
            checks,
            outcome: outcome.into(),
        }
    }
}

/// Counts checks as they start.
#[derive(Debug, Default)]
pub struct CheckCounter(u64);

impl CheckCounter {
    pub fn begin(&mut self, check: &str) {
        self.0 += 1;
        info!("Check {}: {check}", self.0);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite: SuiteKind,
    pub tests: Vec<TestRecord>,
}

impl SuiteReport {
    #[must_use]
    pub fn new(suite: SuiteKind) -> Self {
        Self {
            suite,
            tests: Vec::new(),
        }
    }

    pub fn record(&mut self, record: TestRecord) {
        self.tests.push(record);
    }

    #[must_use]
    pub fn checks(&self) -> u64 {
        self.tests.iter().map(|t| t.checks).sum()
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.count(|o| matches!(o, TestOutcome::Failed { .. }))
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.count(|o| matches!(o, TestOutcome::Error { .. }))
    }

    #[must_use]
    pub fn was_successful(&self) -> bool {
        self.failures() == 0 && self.errors() == 0
    }

    #[must_use]
    pub fn totals(&self) -> CheckTotals {
        CheckTotals {
            checks: self.checks(),
            skipped: 0,
            failed: self.failures(),
            errors: self.errors(),
            successful: self.was_successful(),
        }
    }

    fn count(&self, pred: impl Fn(&TestOutcome) -> bool) -> u64 {
        self.tests.iter().filter(|t| pred(&t.outcome)).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(checks: u64, result: CheckResult) -> TestRecord {
        TestRecord::new("t".to_string(), Some(Platform::Ubuntu), checks, result)
    }

    #[test]
    fn test_outcome_from_check_error() {
        let failed: TestOutcome = Err(CheckError::Assertion {
            check: "deployment".to_string(),
            message: "expected STARTED".to_string(),
        })
        .into();
        assert_eq!(failed.to_string(), "FAIL (deployment: expected STARTED)");

        let errored: TestOutcome =
            Err(CheckError::Harness(anyhow::anyhow!("spawn failed"))).into();
        assert_eq!(
            errored,
            TestOutcome::Error {
                message: "spawn failed".to_string()
            }
        );
    }

    #[test]
    fn test_report_totals() {
        let mut report = SuiteReport::new(SuiteKind::Elasticsearch);
        report.record(record(7, Ok(())));
        report.record(record(
            3,
            Err(CheckError::Assertion {
                check: "stop".to_string(),
                message: "x".to_string(),
            }),
        ));
        assert_eq!(report.checks(), 10);
        assert_eq!(report.failures(), 1);
        assert!(!report.was_successful());
        let totals = report.totals();
        assert_eq!(totals.successes(), 9);
        assert!(!totals.successful);
    }

    #[test]
    fn test_check_counter() {
        let mut counter = CheckCounter::default();
        counter.begin("a");
        counter.begin("b");
        assert_eq!(counter.count(), 2);
    }
}
