//! Single node Elasticsearch: deployment, snapshot backups and node failure.

use tracing::info;

use super::context::status_of;
use super::report::CheckCounter;
use super::{
    CheckResult, ClusterFixture, ClusterTest, Platform, SuiteContext, SuiteKind, SuiteReport,
    check_eq, check_that, execute,
};
use crate::s9s::{ClusterStatus, JobStatus};

pub(crate) const ADMIN_USER: &str = "admin";
pub(crate) const ADMIN_PASSWORD: &str = "myPassword";
pub(crate) const VENDOR: &str = "elasticsearch";
pub(crate) const CLUSTER_TYPE: &str = "elastic";
pub(crate) const PLUGIN_BIN: &str = "/usr/share/elasticsearch/bin/elasticsearch-plugin";
pub(crate) const EXPECTED_PLUGIN: &str = "repository-s3";
// 8.x packages ship the plugins preinstalled
pub(crate) const PLUGIN_VERSION: &str = "7.x";

const SNAPSHOT_REPOSITORY: &str = "cc_snapshots";
const SNAPSHOT_LOCATION: &str = "/mnt/data";
const BACKUP_TITLE: &str = "elastic_single_backup";

#[must_use]
pub fn version(platform: Platform) -> &'static str {
    match platform {
        Platform::Ubuntu => "7.x",
        Platform::Centos => "8.x",
    }
}

#[must_use]
pub fn container_name(platform: Platform) -> String {
    format!("ft-elasticsearch-{platform}")
}

#[must_use]
pub fn cluster_name(platform: Platform) -> String {
    format!("cluster-elasticsearch-{platform}")
}

/// `elastic://<ip>?roles=master-data`
#[must_use]
pub fn node_url(ip: &str) -> String {
    format!("elastic://{ip}?roles=master-data")
}

/// Runs the single node test on each platform; harness failures are
/// recorded in the report.
pub async fn run(ctx: &mut SuiteContext, platforms: &[Platform]) -> SuiteReport {
    let mut report = SuiteReport::new(SuiteKind::Elasticsearch);
    for &platform in platforms {
        let test = SingleNodeTest::new(ctx, platform);
        report.record(execute(platform.test_name(), platform, test, ctx).await);
    }
    report
}

struct SingleNodeTest {
    fixture: ClusterFixture,
    version: &'static str,
    backup_id: Option<u64>,
    counter: CheckCounter,
}

impl SingleNodeTest {
    fn new(ctx: &SuiteContext, platform: Platform) -> Self {
        Self {
            fixture: ClusterFixture::new(
                platform,
                platform.base_container(&ctx.images),
                vec![container_name(platform)],
                cluster_name(platform),
            ),
            version: version(platform),
            backup_id: None,
            counter: CheckCounter::default(),
        }
    }

    fn container(&self) -> &str {
        &self.fixture.containers[0]
    }

    async fn deployment_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "deployment";
        self.counter.begin(CHECK);
        let ip = self.fixture.ip(0).map(ToString::to_string);
        check_that(CHECK, ip.is_some(), "container IP is missing")?;
        let ip = ip.unwrap_or_default();
        info!("Container IP is: {ip}");
        let command = ctx
            .s9s
            .base_command(true, true)
            .arg("cluster")
            .arg("--create")
            .flag("cluster-name", &self.fixture.cluster_name)
            .flag("cluster-type", CLUSTER_TYPE)
            .flag("nodes", node_url(&ip))
            // needed for the default snapshot repository
            .flag("storage-host", &ip)
            .flag("db-admin", ADMIN_USER)
            .flag("db-admin-passwd", ADMIN_PASSWORD)
            .flag("vendor", VENDOR)
            .flag("provider-version", self.version)
            .flag("snapshot-repository", SNAPSHOT_REPOSITORY)
            .flag("snapshot-location", SNAPSHOT_LOCATION)
            .arg("--print-request")
            .arg("--log");
        info!("Executing: {command}");
        let result = ctx.s9s.exec_s9s_command(&command, true).await?;
        ctx.log_output(&result);
        let info = ctx
            .wait_for_cluster_status(
                &self.fixture.cluster_name,
                &ClusterStatus::Started,
                ctx.poll.attempts,
            )
            .await?;
        self.fixture.cluster_id = info.as_ref().map(|info| info.id);
        check_eq(CHECK, &ClusterStatus::Started, &status_of(info.as_ref()))
    }

    async fn plugins_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "plugins";
        self.counter.begin(CHECK);
        if self.version != PLUGIN_VERSION {
            return Ok(());
        }
        let result = ctx
            .lxd
            .execute_on_container(self.container(), &[PLUGIN_BIN, "list"])
            .await?;
        check_that(CHECK, result.is_some(), "container is not tracked")?;
        let result = result.unwrap_or_default();
        info!("Installed plugins: {}", result.stdout.trim());
        // the listing can come back empty on success
        check_eq(CHECK, &0, &result.exit_code)
    }

    async fn create_backup_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "create backup";
        // the default snapshot repository is created asynchronously
        ctx.pause().await;
        self.counter.begin(CHECK);
        let command = ctx
            .s9s
            .base_command(false, true)
            .arg("backup")
            .arg("--create")
            .flag_opt("cluster-id", self.fixture.cluster_id)
            .flag("snapshot-repository", SNAPSHOT_REPOSITORY)
            .flag("title", BACKUP_TITLE)
            .arg("--wait");
        info!("Executing: {command}");
        let result = ctx.s9s.exec_s9s_command(&command, true).await?;
        ctx.log_output(&result);
        ctx.pause().await;
        self.backup_id = ctx.s9s.get_backup_id(BACKUP_TITLE, None).await?;
        check_that(CHECK, self.backup_id.is_some(), "backup not found")
    }

    async fn restore_backup_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "restore backup";
        self.counter.begin(CHECK);
        let command = ctx
            .s9s
            .base_command(false, true)
            .arg("backup")
            .arg("--restore")
            .flag_opt("cluster-id", self.fixture.cluster_id)
            .flag_opt("backup-id", self.backup_id)
            .arg("--wait");
        info!("Executing: {command}");
        let result = ctx.s9s.exec_s9s_command(&command, true).await?;
        ctx.log_output(&result);
        ctx.pause().await;
        check_last_job_finished(CHECK, ctx).await
    }

    async fn delete_backup_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "delete backup";
        self.counter.begin(CHECK);
        let command = ctx
            .s9s
            .base_command(false, true)
            .arg("backup")
            .arg("--delete")
            .flag_opt("backup-id", self.backup_id)
            .arg("--wait");
        info!("Executing: {command}");
        let result = ctx.s9s.exec_s9s_command(&command, true).await?;
        ctx.log_output(&result);
        check_last_job_finished(CHECK, ctx).await?;
        ctx.pause().await;
        self.backup_id = ctx.s9s.get_backup_id(BACKUP_TITLE, None).await?;
        check_that(
            CHECK,
            self.backup_id.is_none(),
            format!("backup still listed with id {:?}", self.backup_id),
        )
    }

    async fn stop_node_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "stop node";
        self.counter.begin(CHECK);
        let container = self.container().to_string();
        ctx.lxd.stop_container(&container).await?;
        let info = ctx
            .wait_for_cluster_status(
                &self.fixture.cluster_name,
                &ClusterStatus::Failure,
                ctx.poll.attempts,
            )
            .await?;
        check_eq(CHECK, &ClusterStatus::Failure, &status_of(info.as_ref()))
    }

    async fn recover_node_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "recover node";
        self.counter.begin(CHECK);
        let container = self.container().to_string();
        ctx.lxd.start_container(&container).await?;
        let info = ctx
            .wait_for_cluster_status(
                &self.fixture.cluster_name,
                &ClusterStatus::Started,
                ctx.poll.recovery_attempts,
            )
            .await?;
        check_eq(CHECK, &ClusterStatus::Started, &status_of(info.as_ref()))
    }
}

impl ClusterTest for SingleNodeTest {
    fn fixture(&mut self) -> &mut ClusterFixture {
        &mut self.fixture
    }

    fn checks(&self) -> u64 {
        self.counter.count()
    }

    async fn run_checks(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        self.deployment_check(ctx).await?;
        self.plugins_check(ctx).await?;
        self.create_backup_check(ctx).await?;
        self.restore_backup_check(ctx).await?;
        self.delete_backup_check(ctx).await?;
        self.stop_node_check(ctx).await?;
        self.recover_node_check(ctx).await
    }
}

/// Asserts that the most recent job finished.
pub(crate) async fn check_last_job_finished(check: &str, ctx: &SuiteContext) -> CheckResult {
    let job = ctx.s9s.get_last_job_id().await?;
    check_that(check, job.is_some(), "no job found")?;
    let status = job.map_or(JobStatus::Failed, |job| job.status);
    check_eq(check, &JobStatus::Finished, &status)
}
