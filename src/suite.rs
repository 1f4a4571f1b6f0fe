//! Functional test suites and the plumbing that sequences them.

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;
use tracing::{error, info};

use crate::config::ImageSettings;

pub mod context;
pub mod elasticsearch;
pub mod elasticsearch_ha;
pub mod fixture;
pub mod mssql;
pub mod report;
pub mod smoke;

pub use context::{PollPlan, SuiteContext};
pub use fixture::ClusterFixture;
pub use report::{CheckCounter, SuiteReport, TestOutcome, TestRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Platform {
    Ubuntu,
    Centos,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Ubuntu, Platform::Centos];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ubuntu => "ubuntu",
            Platform::Centos => "centos",
        }
    }

    /// Base container copied for this platform.
    #[must_use]
    pub fn base_container(self, images: &ImageSettings) -> &str {
        match self {
            Platform::Ubuntu => &images.ubuntu,
            Platform::Centos => &images.centos,
        }
    }

    /// Test name following the `test<N>_<platform>_cluster_all` scheme.
    #[must_use]
    pub fn test_name(self) -> String {
        let index = match self {
            Platform::Ubuntu => 1,
            Platform::Centos => 2,
        };
        format!("test{index}_{}_cluster_all", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SuiteKind {
    Smoke,
    Elasticsearch,
    ElasticsearchHa,
    Mssql,
}

impl SuiteKind {
    pub const ALL: [SuiteKind; 4] = [
        SuiteKind::Smoke,
        SuiteKind::Elasticsearch,
        SuiteKind::ElasticsearchHa,
        SuiteKind::Mssql,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SuiteKind::Smoke => "smoke",
            SuiteKind::Elasticsearch => "elasticsearch",
            SuiteKind::ElasticsearchHa => "elasticsearch-ha",
            SuiteKind::Mssql => "mssql",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            SuiteKind::Smoke => "harness self-check, no infrastructure needed",
            SuiteKind::Elasticsearch => "single node Elasticsearch: deploy, backups, node failure",
            SuiteKind::ElasticsearchHa => "three node Elasticsearch: deploy, degrade, recover",
            SuiteKind::Mssql => "single node SQL Server: deploy, database, backup",
        }
    }

    /// Whether the suite talks to a controller and LXD.
    #[must_use]
    pub fn needs_infrastructure(self) -> bool {
        !matches!(self, SuiteKind::Smoke)
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed check. Assertions fail the test; harness errors mark it errored.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("{check}: {message}")]
    Assertion { check: String, message: String },
    #[error(transparent)]
    Harness(#[from] anyhow::Error),
}

pub type CheckResult = std::result::Result<(), CheckError>;

pub(crate) fn check_that(check: &str, condition: bool, message: impl Into<String>) -> CheckResult {
    if condition {
        Ok(())
    } else {
        Err(CheckError::Assertion {
            check: check.to_string(),
            message: message.into(),
        })
    }
}

pub(crate) fn check_eq<T>(check: &str, expected: &T, actual: &T) -> CheckResult
where
    T: PartialEq + fmt::Debug + ?Sized,
{
    check_that(
        check,
        expected == actual,
        format!("expected {expected:?}, got {actual:?}"),
    )
}

/// One test case run against a cluster fixture.
pub(crate) trait ClusterTest {
    fn fixture(&mut self) -> &mut ClusterFixture;

    fn checks(&self) -> u64;

    async fn run_checks(&mut self, ctx: &mut SuiteContext) -> CheckResult;
}

/// Sets up the fixture, runs the checks and always tears down.
pub(crate) async fn execute<T: ClusterTest>(
    name: String,
    platform: Platform,
    mut test: T,
    ctx: &mut SuiteContext,
) -> TestRecord {
    info!("Starting {name} on {platform}");
    let outcome = match test.fixture().setup(ctx).await {
        Ok(()) => test.run_checks(ctx).await,
        Err(err) => Err(CheckError::Harness(err)),
    };
    if let Err(err) = test.fixture().teardown(ctx).await {
        error!("Teardown of {name} failed: {err:#}");
    }
    let record = TestRecord::new(name, Some(platform), test.checks(), outcome);
    info!("{} ... {}", record.name, record.outcome);
    record
}

/// Runs one suite on the given platforms.
///
/// # Errors
/// Returns error when an infrastructure suite is requested without a context.
pub async fn run_suite(
    kind: SuiteKind,
    ctx: Option<&mut SuiteContext>,
    platforms: &[Platform],
) -> Result<SuiteReport> {
    if kind == SuiteKind::Smoke {
        return Ok(smoke::run());
    }
    let Some(ctx) = ctx else {
        anyhow::bail!("Suite {kind} needs a controller and LXD connection");
    };
    let report = match kind {
        SuiteKind::Elasticsearch => elasticsearch::run(ctx, platforms).await,
        SuiteKind::ElasticsearchHa => elasticsearch_ha::run(ctx, platforms).await,
        SuiteKind::Mssql => mssql::run(ctx, platforms).await,
        SuiteKind::Smoke => smoke::run(),
    };
    Ok(report)
}
