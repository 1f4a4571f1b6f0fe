use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};

use super::LxdError;
use super::client::LxdClient;
use super::types::{ExecResult, Instance, InstanceStatus, StateAction};
use crate::sys_comm;

const LXC_LIST_IP_COLUMN: usize = 3;
const IP_INTERFACE: &str = "eth0";

/// Container lifecycle on top of [`LxdClient`], tracking the instances this
/// run created so later calls can be refused for unknown names.
#[derive(Debug)]
pub struct LxdManager {
    client: LxdClient,
    instances: HashMap<String, Instance>,
    lxc_bin: PathBuf,
    step: Duration,
    stderr_threshold: usize,
}

impl LxdManager {
    #[must_use]
    pub fn new(
        client: LxdClient,
        lxc_bin: PathBuf,
        step: Duration,
        stderr_threshold: usize,
    ) -> Self {
        Self {
            client,
            instances: HashMap::new(),
            lxc_bin,
            step,
            stderr_threshold,
        }
    }

    #[must_use]
    pub fn client(&self) -> &LxdClient {
        &self.client
    }

    #[must_use]
    pub fn is_tracked(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// # Errors
    /// Returns error if the listing request fails.
    pub async fn get_containers(&self) -> Result<Vec<Instance>> {
        Ok(self.client.list_instances().await?)
    }

    /// # Errors
    /// Returns error if the lookup fails for a reason other than "not found".
    pub async fn container_exists(&self, name: &str) -> Result<bool> {
        match self.client.get_instance(name).await? {
            Some(_) => Ok(true),
            None => {
                debug!("Container not found: {name}");
                Ok(false)
            }
        }
    }

    /// Stops (when needed) and deletes a container, then forgets it.
    ///
    /// # Errors
    /// Returns error on transport failures; API failures yield `false`.
    pub async fn delete_container(&mut self, name: &str) -> Result<bool> {
        let Some(instance) = self.client.get_instance(name).await? else {
            return Ok(false);
        };
        if instance.status() != InstanceStatus::Stopped {
            if let Err(err) = self.client.change_state(name, StateAction::Stop, true).await {
                return api_failure("stop", name, err);
            }
            tokio::time::sleep(self.step).await;
        }
        if let Err(err) = self.client.delete_instance(name).await {
            return api_failure("delete", name, err);
        }
        self.instances.remove(name);
        info!("Container {name} deleted");
        Ok(true)
    }

    /// Creates `new_container` as a copy of `base_container` and tracks it.
    ///
    /// # Errors
    /// Returns error on transport failures; API failures yield `false`.
    pub async fn copy_container(
        &mut self,
        base_container: &str,
        new_container: &str,
    ) -> Result<bool> {
        if let Err(err) = self
            .client
            .copy_instance(base_container, new_container)
            .await
        {
            return api_failure("copy", new_container, err);
        }
        match self.client.get_instance(new_container).await? {
            Some(instance) => {
                self.instances.insert(new_container.to_string(), instance);
                Ok(true)
            }
            None => {
                error!("Container {new_container} missing after copy");
                Ok(false)
            }
        }
    }

    /// Reads the IPv4 address from the `lxc list` table.
    ///
    /// # Errors
    /// Returns error if `lxc` cannot be spawned.
    pub async fn get_container_ip_cmd(&self, name: &str) -> Result<Option<String>> {
        let result = sys_comm::exec_command(&self.lxc_bin, ["list", name]).await?;
        if result.has_error(self.stderr_threshold) {
            error!("Getting container ip: {}", result.stderr.trim_end());
            return Ok(None);
        }
        Ok(parse_lxc_list_ip(&result.stdout, name))
    }

    /// Starts a tracked container and waits one step for an address lease.
    ///
    /// # Errors
    /// Returns error on transport failures; API failures yield `false`.
    pub async fn start_container(&mut self, name: &str) -> Result<bool> {
        if self.refresh(name).await?.is_none() {
            return Ok(false);
        }
        if let Err(err) = self.client.change_state(name, StateAction::Start, false).await {
            return api_failure("start", name, err);
        }
        tokio::time::sleep(self.step).await;
        self.refresh(name).await?;
        Ok(true)
    }

    /// Stops a tracked container unless it is already stopped.
    ///
    /// # Errors
    /// Returns error on transport failures; API failures yield `false`.
    pub async fn stop_container(&mut self, name: &str) -> Result<bool> {
        let Some(status) = self.refresh(name).await? else {
            return Ok(false);
        };
        if status != InstanceStatus::Stopped {
            if let Err(err) = self.client.change_state(name, StateAction::Stop, true).await {
                return api_failure("stop", name, err);
            }
            tokio::time::sleep(self.step).await;
            self.refresh(name).await?;
        }
        Ok(true)
    }

    /// Freezes a tracked container; only a running container can be frozen.
    ///
    /// # Errors
    /// Returns error on transport failures; API failures yield `false`.
    pub async fn freeze_container(&mut self, name: &str) -> Result<bool> {
        self.transition(name, InstanceStatus::Running, StateAction::Freeze)
            .await
    }

    /// Unfreezes a tracked container; only a frozen container can be resumed.
    ///
    /// # Errors
    /// Returns error on transport failures; API failures yield `false`.
    pub async fn unfreeze_container(&mut self, name: &str) -> Result<bool> {
        self.transition(name, InstanceStatus::Frozen, StateAction::Unfreeze)
            .await
    }

    /// First IPv4 address of `eth0` of a tracked, running container.
    ///
    /// # Errors
    /// Returns error if the state request fails.
    pub async fn get_container_ip(&mut self, name: &str) -> Result<Option<String>> {
        let Some(status) = self.refresh(name).await? else {
            return Ok(None);
        };
        if status != InstanceStatus::Running {
            error!("Container {name} is not Running. State: {status}");
            return Ok(None);
        }
        let state = self.client.instance_state(name).await?;
        let ip = state.address(IP_INTERFACE);
        if ip.is_none() {
            error!("Container {name} has no address on {IP_INTERFACE}");
        }
        Ok(ip)
    }

    /// Runs `command` inside a tracked container.
    ///
    /// # Errors
    /// Returns error if the exec operation fails.
    pub async fn execute_on_container(
        &self,
        name: &str,
        command: &[&str],
    ) -> Result<Option<ExecResult>> {
        if !self.is_tracked(name) {
            error!("Container {name} has not an instance");
            return Ok(None);
        }
        let argv: Vec<String> = command.iter().map(ToString::to_string).collect();
        debug!("Executing on {name}: {}", argv.join(" "));
        let result = self.client.exec(name, &argv).await?;
        debug!(
            "exit code {} stdout: {} stderr: {}",
            result.exit_code,
            result.stdout.trim_end(),
            result.stderr.trim_end()
        );
        Ok(Some(result))
    }

    async fn transition(
        &mut self,
        name: &str,
        required: InstanceStatus,
        action: StateAction,
    ) -> Result<bool> {
        let Some(status) = self.refresh(name).await? else {
            return Ok(false);
        };
        if status != required {
            info!("Can not {action:?} container {name} as its status is {status}");
            return Ok(false);
        }
        if let Err(err) = self.client.change_state(name, action, false).await {
            return api_failure(&format!("{action:?}"), name, err);
        }
        tokio::time::sleep(self.step).await;
        self.refresh(name).await?;
        Ok(true)
    }

    /// Re-reads a tracked container; `None` when it is untracked or gone.
    async fn refresh(&mut self, name: &str) -> Result<Option<InstanceStatus>> {
        if !self.is_tracked(name) {
            error!("Container {name} has not an instance");
            return Ok(None);
        }
        match self.client.get_instance(name).await? {
            Some(instance) => {
                let status = instance.status();
                self.instances.insert(name.to_string(), instance);
                Ok(Some(status))
            }
            None => {
                error!("Container {name} no longer exists");
                self.instances.remove(name);
                Ok(None)
            }
        }
    }
}

fn api_failure(action: &str, name: &str, err: LxdError) -> Result<bool> {
    if err.is_api_failure() {
        error!("Could not {action} container {name}. Error: {err}");
        return Ok(false);
    }
    Err(err.into())
}

/// Extracts the address from the `lxc list` row of `name`: fourth
/// `|`-separated column, first space-separated token.
#[must_use]
pub fn parse_lxc_list_ip(stdout: &str, name: &str) -> Option<String> {
    let row = stdout.lines().find(|line| line.contains(name))?;
    let column = row.split('|').nth(LXC_LIST_IP_COLUMN)?;
    let ip = column.split(' ').nth(1)?.trim();
    if ip.is_empty() {
        None
    } else {
        Some(ip.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
+-----------------+---------+----------------------+------+-----------+-----------+
|      NAME       |  STATE  |         IPV4         | IPV6 |   TYPE    | SNAPSHOTS |
+-----------------+---------+----------------------+------+-----------+-----------+
| ft-mssql-ubuntu | RUNNING | 10.216.8.41 (eth0)   |      | CONTAINER | 0         |
+-----------------+---------+----------------------+------+-----------+-----------+
| ft-es-centos    | STOPPED |                      |      | CONTAINER | 0         |
+-----------------+---------+----------------------+------+-----------+-----------+
";

    #[test]
    fn test_parse_lxc_list_ip() {
        assert_eq!(
            parse_lxc_list_ip(LISTING, "ft-mssql-ubuntu").as_deref(),
            Some("10.216.8.41")
        );
    }

    #[test]
    fn test_parse_lxc_list_ip_without_address() {
        assert!(parse_lxc_list_ip(LISTING, "ft-es-centos").is_none());
        assert!(parse_lxc_list_ip(LISTING, "missing").is_none());
    }
}
