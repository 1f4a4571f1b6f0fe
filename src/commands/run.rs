use anyhow::{Context, Result};
use s9s_ft::config::Settings;
use s9s_ft::counters::{CheckTotals, CounterStore};
use s9s_ft::suite::{self, Platform, SuiteContext, SuiteKind, SuiteReport};
use s9s_ft::sys_comm;
use tracing::{error, info};

use crate::cli::output;

/// Runs the suites in order and publishes the counters. Returns whether
/// every test passed.
pub(crate) async fn run_suites(
    settings: &Settings,
    suites: &[SuiteKind],
    platforms: &[Platform],
) -> Result<bool> {
    let arch = sys_comm::local_arch().await;
    info!("Local architecture: {arch}");
    output::print_run_header(settings, &arch);

    let mut ctx = if suites.iter().any(|kind| kind.needs_infrastructure()) {
        settings.validate_infrastructure()?;
        Some(
            SuiteContext::connect(settings)
                .await
                .context("Failed to prepare suite context")?,
        )
    } else {
        None
    };
    if let Some(owner) = ctx.as_ref().and_then(|ctx| ctx.project_owner.as_deref()) {
        info!("Project owner: {owner}");
    }

    let mut reports = Vec::with_capacity(suites.len());
    for &kind in suites {
        info!("Running suite {kind}");
        let report = suite::run_suite(kind, ctx.as_mut(), platforms).await?;
        info!(
            "Suite {kind} finished: {} check(s), {} failure(s), {} error(s)",
            report.checks(),
            report.failures(),
            report.errors()
        );
        reports.push(report);
    }

    let totals = reports.iter().map(SuiteReport::totals).fold(
        CheckTotals {
            successful: true,
            ..CheckTotals::default()
        },
        CheckTotals::merge,
    );
    let mut store = CounterStore::load(&settings.counters.file)?;
    totals.publish(&mut store);
    store.save()?;
    info!("Counters written to {}", store.path().display());

    for failed in output::failed_tests(&reports) {
        error!("Test did not pass: {failed}");
    }
    output::print_run_summary(&reports, &totals);
    Ok(totals.successful)
}
