use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::{ImageSettings, PollSettings, Settings};
use crate::lxd::{self, LxdManager};
use crate::s9s::{ClusterInfo, ClusterStatus, S9sCli};
use crate::sys_comm::{self, CommandOutput};
use crate::utils::poll_until;

const PROJECT_OWNER_ENV: &str = "PROJECT_OWNER";

/// How long to wait between polls and how many polls to make.
#[derive(Debug, Clone, Copy)]
pub struct PollPlan {
    pub step: Duration,
    pub attempts: u32,
    pub recovery_attempts: u32,
}

impl PollPlan {
    /// # Errors
    /// Returns error if the step interval is invalid.
    pub fn from_settings(settings: &PollSettings) -> Result<Self> {
        Ok(Self {
            step: settings.step()?,
            attempts: settings.attempts,
            recovery_attempts: settings.recovery_attempts,
        })
    }
}

/// Handles shared by every suite of a run.
#[derive(Debug)]
pub struct SuiteContext {
    pub s9s: S9sCli,
    pub lxd: LxdManager,
    pub poll: PollPlan,
    pub images: ImageSettings,
    pub project_owner: Option<String>,
}

impl SuiteContext {
    #[must_use]
    pub fn new(s9s: S9sCli, lxd: LxdManager, poll: PollPlan, images: ImageSettings) -> Self {
        Self {
            s9s,
            lxd,
            poll,
            images,
            project_owner: None,
        }
    }

    /// Connects to LXD and prepares the `s9s` wrapper from settings.
    ///
    /// # Errors
    /// Returns error if the LXD connection cannot be established.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let poll = PollPlan::from_settings(&settings.poll)?;
        let client = lxd::connect(&settings.lxd).await?;
        let server = client.server_info().await?;
        info!(
            "Connected to LXD {} (api {}, auth {})",
            settings.lxd.endpoint, server.api_version, server.auth
        );
        let manager = LxdManager::new(
            client,
            settings.lxd.lxc_bin.clone(),
            poll.step,
            settings.poll.stderr_threshold,
        );
        let mut ctx = Self::new(
            S9sCli::from_settings(settings),
            manager,
            poll,
            settings.images.clone(),
        );
        let owner = sys_comm::env_var(PROJECT_OWNER_ENV, "");
        ctx.project_owner = (!owner.is_empty()).then_some(owner);
        Ok(ctx)
    }

    /// Owner used for databases created by the suites.
    #[must_use]
    pub fn database_owner(&self) -> &str {
        self.project_owner
            .as_deref()
            .unwrap_or_else(|| self.s9s.cmon_user())
    }

    pub async fn pause(&self) {
        tokio::time::sleep(self.poll.step).await;
    }

    /// Logs a command result: stderr as an error when it looks like a
    /// failure, stdout at debug otherwise.
    pub fn log_output(&self, output: &CommandOutput) {
        if output.has_error(self.s9s.stderr_threshold()) {
            error!("{}", output.stderr.trim_end());
        } else {
            debug!("Output: {}", output.stdout.trim_end());
        }
    }

    /// Polls the cluster listing until `expected` is seen or `attempts`
    /// polls are spent. Returns the last listing seen.
    ///
    /// # Errors
    /// Returns error if the CLI cannot be spawned.
    pub async fn wait_for_cluster_status(
        &self,
        cluster_name: &str,
        expected: &ClusterStatus,
        attempts: u32,
    ) -> Result<Option<ClusterInfo>> {
        let s9s = &self.s9s;
        let last = poll_until(
            self.poll.step,
            attempts,
            |attempt| async move {
                debug!("Waiting for {cluster_name} to be {expected} (attempt {attempt})");
                s9s.get_cluster_id(cluster_name).await
            },
            |info| info.as_ref().is_some_and(|info| info.status == *expected),
        )
        .await?;
        Ok(last.flatten())
    }
}

/// Status string used in assertions; a missing cluster reads as `FAILED`.
#[must_use]
pub fn status_of(info: Option<&ClusterInfo>) -> ClusterStatus {
    info.map_or(ClusterStatus::Failed, |info| info.status.clone())
}
