//! Single node SQL Server: deployment, database and backup creation.

use tracing::info;

use super::context::status_of;
use super::report::CheckCounter;
use super::{
    CheckResult, ClusterFixture, ClusterTest, Platform, SuiteContext, SuiteKind, SuiteReport,
    check_eq, check_that, execute,
};
use crate::s9s::ClusterStatus;

const ADMIN_USER: &str = "SQLServerAdmin";
const ADMIN_PASSWORD: &str = "myPassword";
const CLUSTER_TYPE: &str = "mssql_single";
const VENDOR: &str = "mssql";
const VERSION: &str = "2019";
const PORT: u16 = 1433;
const JOB_TAGS: &str = "createCluster";
const CLUSTER_TAGS: &str = "myMssqlCluster";
const DATABASE_NAME: &str = "testCreateDatabase";
const BACKUP_METHOD: &str = "mssqlfull";
const BACKUP_DIRECTORY: &str = "/tmp";
const BACKUP_TITLE: &str = "mssql_single_backup";

#[must_use]
pub fn container_name(platform: Platform) -> String {
    format!("ft-mssql-{platform}")
}

#[must_use]
pub fn cluster_name(platform: Platform) -> String {
    format!("cluster-mssql-{platform}")
}

/// `<ip>:1433;`
#[must_use]
pub fn node_spec(ip: &str) -> String {
    format!("{ip}:{PORT};")
}

/// Runs the SQL Server test on each platform.
pub async fn run(ctx: &mut SuiteContext, platforms: &[Platform]) -> SuiteReport {
    let mut report = SuiteReport::new(SuiteKind::Mssql);
    for &platform in platforms {
        let test = MssqlTest::new(ctx, platform);
        report.record(execute(platform.test_name(), platform, test, ctx).await);
    }
    report
}

struct MssqlTest {
    fixture: ClusterFixture,
    backup_id: Option<u64>,
    counter: CheckCounter,
}

impl MssqlTest {
    fn new(ctx: &SuiteContext, platform: Platform) -> Self {
        Self {
            fixture: ClusterFixture::new(
                platform,
                platform.base_container(&ctx.images),
                vec![container_name(platform)],
                cluster_name(platform),
            ),
            backup_id: None,
            counter: CheckCounter::default(),
        }
    }

    async fn deployment_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "deployment";
        self.counter.begin(CHECK);
        let ip = self.fixture.ip(0).map(ToString::to_string);
        check_that(CHECK, ip.is_some(), "container IP is missing")?;
        let ip = ip.unwrap_or_default();
        info!("Container IP is: {ip}; SQL Server {VERSION}");
        let command = ctx
            .s9s
            .base_command(true, true)
            .arg("cluster")
            .arg("--create")
            .flag("job-tags", JOB_TAGS)
            .flag("cluster-type", CLUSTER_TYPE)
            .flag("cluster-name", &self.fixture.cluster_name)
            .flag("nodes", node_spec(&ip))
            .flag("db-admin", ADMIN_USER)
            .flag("db-admin-passwd", ADMIN_PASSWORD)
            .flag("vendor", VENDOR)
            .flag("with-tags", CLUSTER_TAGS)
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

    async fn create_database_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "create database";
        ctx.pause().await;
        self.counter.begin(CHECK);
        let Some(cluster_id) = self.fixture.cluster_id else {
            return check_that(CHECK, false, "cluster id is unknown");
        };
        info!(
            "Creating database {DATABASE_NAME} owned by {}",
            ctx.database_owner()
        );
        let created = ctx.s9s.create_database(cluster_id, DATABASE_NAME).await?;
        check_that(CHECK, created, format!("could not create {DATABASE_NAME}"))
    }

    async fn create_backup_check(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        const CHECK: &str = "create backup";
        ctx.pause().await;
        self.counter.begin(CHECK);
        let command = ctx
            .s9s
            .base_command(false, true)
            .arg("backup")
            .arg("--create")
            .flag_opt("cluster-id", self.fixture.cluster_id)
            .flag_opt("nodes", self.fixture.ip(0))
            .flag("backup-directory", BACKUP_DIRECTORY)
            .flag("backup-method", BACKUP_METHOD)
            .flag("title", BACKUP_TITLE)
            .arg("--wait");
        info!("Executing: {command}");
        let result = ctx.s9s.exec_s9s_command(&command, true).await?;
        ctx.log_output(&result);
        ctx.pause().await;
        self.backup_id = ctx.s9s.get_backup_id(BACKUP_TITLE, None).await?;
        check_that(CHECK, self.backup_id.is_some(), "backup not found")
    }
}

impl ClusterTest for MssqlTest {
    fn fixture(&mut self) -> &mut ClusterFixture {
        &mut self.fixture
    }

    fn checks(&self) -> u64 {
        self.counter.count()
    }

    async fn run_checks(&mut self, ctx: &mut SuiteContext) -> CheckResult {
        self.deployment_check(ctx).await?;
        self.create_database_check(ctx).await?;
        self.create_backup_check(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_spec() {
        assert_eq!(node_spec("10.0.3.9"), "10.0.3.9:1433;");
    }

    #[test]
    fn test_names() {
        assert_eq!(container_name(Platform::Ubuntu), "ft-mssql-ubuntu");
        assert_eq!(cluster_name(Platform::Centos), "cluster-mssql-centos");
    }
}
