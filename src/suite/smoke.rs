use super::report::CheckCounter;
use super::{CheckResult, SuiteKind, SuiteReport, TestRecord, check_that};

const ADMIN_USER: &str = "admin";
const ADMIN_PASSWORD: &str = "myPassword";

/// Harness self-check: needs neither a controller nor LXD.
#[must_use]
pub fn run() -> SuiteReport {
    let mut counter = CheckCounter::default();
    let outcome = deployment_check(&mut counter);
    let mut report = SuiteReport::new(SuiteKind::Smoke);
    report.record(TestRecord::new(
        "deployment_check".to_string(),
        None,
        counter.count(),
        outcome,
    ));
    report
}

fn deployment_check(counter: &mut CheckCounter) -> CheckResult {
    counter.begin("deployment");
    check_that(
        "deployment",
        ADMIN_USER != ADMIN_PASSWORD,
        "admin user equals its password",
    )
}
