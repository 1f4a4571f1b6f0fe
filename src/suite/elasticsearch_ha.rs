//! Three node Elasticsearch: deployment, degradation and recovery.

use tracing::info;

use super::context::status_of;
use super::elasticsearch::{
    ADMIN_PASSWORD, ADMIN_USER, CLUSTER_TYPE, EXPECTED_PLUGIN, PLUGIN_BIN, PLUGIN_VERSION, VENDOR,
    node_url,
};
use super::report::CheckCounter;
use super::{
    CheckResult, ClusterFixture, ClusterTest, Platform, SuiteContext, SuiteKind, SuiteReport,
    check_eq, check_that, execute,
};
use crate::s9s::ClusterStatus;

const NODE_COUNT: usize = 3;

#[must_use]
pub fn version(platform: Platform) -> &'static str {
    match platform {
        Platform::Ubuntu => "8.3.1",
        Platform::Centos => "8.1.7",
    }
}

#[must_use]
pub fn container_names(platform: Platform) -> Vec<String> {
    (1..=NODE_COUNT)
        .map(|index| format!("ft-elasticsearch-ha-{platform}-{index}"))
        .collect()
}

#[must_use]
pub fn cluster_name(platform: Platform) -> String {
    format!("elasticsearch-ha-{platform}")
}

/// Runs the three node test on each platform.
pub async fn run(ctx: &mut SuiteContext, platforms: &[Platform]) -> SuiteReport {
    let mut report = SuiteReport::new(SuiteKind::ElasticsearchHa);
    for &platform in platforms {
        let test = HaTest::new(ctx, platform);
        report.record(execute(platform.test_name(), platform, test, ctx).await);
    }
    report
}

struct HaTest {
    fixture: ClusterFixture,
    version: &'static str,
    with_plugins: bool,
    counter: CheckCounter,
}

impl HaTest {
    fn new(ctx: &SuiteContext, platform: Platform) -> Self {
        Self {
            fixture: ClusterFixture::new(
                platform,
                platform.base_container(&ctx.images),
                container_names(platform),
                cluster_name(platform),
            ),
            version: version(platform),
            with_plugins: platform == Platform::Centos,
            counter: CheckCounter::default(),
        }
    }

    async fn wait_for(
        &mut self,
        ctx: &SuiteContext,
        check: &str,
        expected: ClusterStatus,
        attempts: u32,
    ) -> CheckResult {
        let info = ctx
            .wait_for_cluster_status(&self.fixture.cluster_name, &expected, attempts)
            .await?;
        if let Some(info) = &info {
            self.fixture.cluster_id = Some(info.id);
        }
        check_eq(check, &expected, &status_of(info.as_ref()))
    }

    async fn deployment_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "deployment";
        self.counter.begin(CHECK);
        check_that(
            CHECK,
            self.fixture.all_ips(),
            format!(
                "only {} of {NODE_COUNT} container IPs available",
                self.fixture.container_ips.len()
            ),
        )?;
        info!("Containers IP are: {:?}", self.fixture.container_ips);
        let nodes = self
            .fixture
            .container_ips
            .iter()
            .map(|ip| node_url(ip))
            .collect::<Vec<_>>()
            .join(";");
        let command = ctx
            .s9s
            .base_command(true, true)
            .arg("cluster")
            .arg("--create")
            .flag("cluster-name", &self.fixture.cluster_name)
            .flag("cluster-type", CLUSTER_TYPE)
            .flag("nodes", nodes)
            .flag("db-admin", ADMIN_USER)
            .flag("db-admin-passwd", ADMIN_PASSWORD)
            .flag("vendor", VENDOR)
            .flag("provider-version", self.version)
            .arg("--print-request")
            .arg("--log");
        info!("Executing: {command}");
        let result = ctx.s9s.exec_s9s_command(&command, true).await?;
        ctx.log_output(&result);
        let attempts = ctx.poll.attempts;
        self.wait_for(ctx, CHECK, ClusterStatus::Started, attempts)
            .await
    }

    async fn plugins_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "plugins";
        self.counter.begin(CHECK);
        if self.version != PLUGIN_VERSION {
            return Ok(());
        }
        let container = &self.fixture.containers[0];
        let result = ctx
            .lxd
            .execute_on_container(container, &[PLUGIN_BIN, "list"])
            .await?;
        check_that(CHECK, result.is_some(), "container is not tracked")?;
        let result = result.unwrap_or_default();
        check_eq(CHECK, &0, &result.exit_code)?;
        check_eq(CHECK, EXPECTED_PLUGIN, result.stdout.trim())
    }

    async fn stop_first_node_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "stop node 1";
        self.counter.begin(CHECK);
        let first = self.fixture.containers[0].clone();
        ctx.lxd.stop_container(&first).await?;
        let attempts = ctx.poll.attempts;
        self.wait_for(ctx, CHECK, ClusterStatus::Degraded, attempts)
            .await
    }

    async fn stop_remaining_nodes_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "stop nodes 2 and 3";
        self.counter.begin(CHECK);
        for container in self.fixture.containers.iter().skip(1) {
            ctx.lxd.stop_container(container).await?;
        }
        let attempts = ctx.poll.attempts;
        self.wait_for(ctx, CHECK, ClusterStatus::Failure, attempts)
            .await
    }

    async fn recover_nodes_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "recover nodes";
        self.counter.begin(CHECK);
        for container in &self.fixture.containers {
            ctx.lxd.start_container(container).await?;
        }
        let attempts = ctx.poll.recovery_attempts;
        self.wait_for(ctx, CHECK, ClusterStatus::Started, attempts)
            .await
    }
}

impl ClusterTest for HaTest {
    fn fixture(&mut self) -> &mut ClusterFixture {
        &mut self.fixture
    }

    fn checks(&self) -> u64 {
        self.counter.count()
    }

    async fn run_checks(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        self.deployment_check(ctx).await?;
        if self.with_plugins {
            self.plugins_check(ctx).await?;
        }
        self.stop_first_node_check(ctx).await?;
        self.stop_remaining_nodes_check(ctx).await?;
        self.recover_nodes_check(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names() {
        assert_eq!(
            container_names(Platform::Centos),
            [
                "ft-elasticsearch-ha-centos-1",
                "ft-elasticsearch-ha-centos-2",
                "ft-elasticsearch-ha-centos-3",
            ]
        );
        assert_eq!(cluster_name(Platform::Ubuntu), "elasticsearch-ha-ubuntu");
    }

    #[test]
    fn test_versions() {
        assert_eq!(version(Platform::Ubuntu), "8.3.1");
        assert_eq!(version(Platform::Centos), "8.1.7");
    }
}
