use anyhow::Result;
use tracing::{error, info, warn};

use super::{Platform, SuiteContext};

/// Containers and cluster owned by one test case.
#[derive(Debug, Clone)]
pub struct ClusterFixture {
    pub platform: Platform,
    pub base_container: String,
    pub containers: Vec<String>,
    pub cluster_name: String,
    pub container_ips: Vec<String>,
    pub cluster_id: Option<u64>,
}

impl ClusterFixture {
    #[must_use]
    pub fn new(
        platform: Platform,
        base_container: impl Into<String>,
        containers: Vec<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            base_container: base_container.into(),
            containers,
            cluster_name: cluster_name.into(),
            container_ips: Vec::new(),
            cluster_id: None,
        }
    }

    /// Address of the `index`-th container, when setup obtained one.
    #[must_use]
    pub fn ip(&self, index: usize) -> Option<&str> {
        self.container_ips.get(index).map(String::as_str)
    }

    /// Whether every container got an address.
    #[must_use]
    pub fn all_ips(&self) -> bool {
        self.container_ips.len() == self.containers.len()
    }

    /// Recreates the containers from the base container and drops any
    /// leftover cluster with the same name. Provisioning failures are logged
    /// and leave addresses missing, which the first check then reports.
    ///
    /// # Errors
    /// Returns error on transport failures talking to LXD or the CLI.
    pub async fn setup(&mut self, ctx: &mut SuiteContext) -> Result<()> {
        self.container_ips.clear();
        self.cluster_id = None;
        if !ctx.lxd.container_exists(&self.base_container).await? {
            error!("Base container {} does not exist", self.base_container);
        }
        for container in &self.containers {
            if ctx.lxd.container_exists(container).await? {
                ctx.lxd.delete_container(container).await?;
            }
            info!("Creating container: {container}");
            if !ctx.lxd.copy_container(&self.base_container, container).await? {
                error!("Could not create node {container}");
                return Ok(());
            }
            if !ctx.lxd.start_container(container).await? {
                error!("Could not start node {container}");
                return Ok(());
            }
            match ctx.lxd.get_container_ip(container).await? {
                Some(ip) => self.container_ips.push(ip),
                None => {
                    error!("Could not obtain address of {container}");
                    return Ok(());
                }
            }
        }
        if let Some(leftover) = ctx.s9s.get_cluster_id(&self.cluster_name).await? {
            info!(
                "Dropping leftover cluster {} ({})",
                self.cluster_name, leftover.id
            );
            ctx.s9s.drop_cluster(leftover.id).await?;
        }
        Ok(())
    }

    /// Stops and deletes the containers and drops the cluster.
    ///
    /// # Errors
    /// Returns error on transport failures talking to LXD or the CLI.
    pub async fn teardown(&mut self, ctx: &mut SuiteContext) -> Result<()> {
        if self.cluster_id.is_none() {
            self.cluster_id = ctx
                .s9s
                .get_cluster_id(&self.cluster_name)
                .await?
                .map(|info| info.id);
        }
        for container in &self.containers {
            ctx.lxd.stop_container(container).await?;
            if !ctx.lxd.delete_container(container).await? {
                error!("Could not delete node {container}");
            }
        }
        match self.cluster_id {
            Some(id) => {
                if !ctx.s9s.drop_cluster(id).await? {
                    error!("Could not delete cluster: {id}");
                }
            }
            None => warn!("No cluster named {} to drop", self.cluster_name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_lookup() {
        let mut fixture = ClusterFixture::new(
            Platform::Ubuntu,
            "ubuntu-focal-cloud",
            vec!["ft-a".to_string(), "ft-b".to_string()],
            "cluster-a",
        );
        fixture.container_ips.push("10.0.3.2".to_string());
        assert_eq!(fixture.ip(0), Some("10.0.3.2"));
        assert!(fixture.ip(1).is_none());
        assert!(!fixture.all_ips());
    }
}
