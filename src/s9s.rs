use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::{ControllerSettings, Settings, SshSettings};
use crate::sys_comm::{self, CommandOutput};

pub mod command;
pub mod parse;
pub mod types;

pub use command::S9sCommand;
pub use types::{ClusterInfo, ClusterStatus, JobInfo, JobStatus};

/// Builds and runs `s9s` commands against one controller.
#[derive(Debug, Clone)]
pub struct S9sCli {
    controller: ControllerSettings,
    ssh: SshSettings,
    stderr_threshold: usize,
}

impl S9sCli {
    #[must_use]
    pub fn new(controller: ControllerSettings, ssh: SshSettings, stderr_threshold: usize) -> Self {
        Self {
            controller,
            ssh,
            stderr_threshold,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.controller.clone(),
            settings.ssh.clone(),
            settings.poll.stderr_threshold,
        )
    }

    #[must_use]
    pub fn cmon_user(&self) -> &str {
        &self.controller.user
    }

    #[must_use]
    pub fn stderr_threshold(&self) -> usize {
        self.stderr_threshold
    }

    /// The command prefix shared by every call: binary, controller and
    /// credentials, plus SSH credentials when the controller must reach nodes.
    #[must_use]
    pub fn base_command(&self, os_creds: bool, color: bool) -> S9sCommand {
        let mut command = S9sCommand::new(&self.controller.s9s_bin);
        if color && self.controller.color {
            command = command.flag("color", "always");
        }
        command = command
            .flag("controller", self.controller.url())
            .flag("cmon-user", &self.controller.user)
            .flag("password", &self.controller.password);
        if os_creds {
            command = command
                .flag("os-user", &self.ssh.user)
                .flag("os-key-file", self.ssh.key_file.display());
        }
        command
    }

    /// Runs a command and returns its captured output.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn run(&self, command: &S9sCommand) -> Result<CommandOutput> {
        sys_comm::exec_command(command.program(), command.args()).await
    }

    /// Looks up a cluster by name.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn get_cluster_id(&self, cluster_name: &str) -> Result<Option<ClusterInfo>> {
        let command = self
            .base_command(false, true)
            .arg("cluster")
            .arg("--list")
            .arg("--long")
            .arg("--batch")
            .flag("cluster-name", cluster_name);
        info!("Executing: {command}");
        let result = self.run(&command).await?;
        if result.has_error(self.stderr_threshold) {
            error!("{}", result.stderr.trim_end());
            return Ok(None);
        }
        info!("Output: {}", result.stdout.trim_end());
        let cluster = parse::parse_cluster_listing(&result.stdout);
        match &cluster {
            Some(info) => debug!("cluster id found: {} ({})", info.id, info.status),
            None => debug!("cluster {cluster_name} not found"),
        }
        Ok(cluster)
    }

    /// Finds the id of the backup titled `backup_title`.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn get_backup_id(
        &self,
        backup_title: &str,
        cluster_id: Option<u64>,
    ) -> Result<Option<u64>> {
        let command = self
            .base_command(false, true)
            .arg("backup")
            .arg("--list")
            .arg("--long")
            .flag_opt("cluster-id", cluster_id)
            .arg("--batch");
        info!("Executing: {command}");
        let result = self.run(&command).await?;
        if result.has_error(self.stderr_threshold) {
            error!("{}", result.stderr.trim_end());
            return Ok(None);
        }
        debug!("Output: {}", result.stdout.trim_end());
        let backup_id = parse::find_backup_id(&result.stdout, backup_title);
        info!("Backup id found: {backup_id:?}");
        Ok(backup_id)
    }

    /// Drops a cluster and waits for the job to finish.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn drop_cluster(&self, cluster_id: u64) -> Result<bool> {
        let command = self
            .base_command(false, false)
            .arg("cluster")
            .arg("--drop")
            .flag("cluster-id", cluster_id)
            .arg("--wait")
            .arg("--print-request")
            .arg("--print-json")
            .arg("--log");
        debug!("Executing: {command}");
        let result = self.run(&command).await?;
        if result.has_error(self.stderr_threshold) {
            error!("{}", result.stderr.trim_end());
            return Ok(false);
        }
        debug!("Output: {}", result.stdout.trim_end());
        Ok(true)
    }

    /// Runs a job-producing command and, when `log_job` is set, logs the log
    /// of the last job the controller recorded.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn exec_s9s_command(
        &self,
        command: &S9sCommand,
        log_job: bool,
    ) -> Result<CommandOutput> {
        let result = self.run(command).await?;
        if log_job {
            let Some(job) = self.get_last_job_id().await? else {
                error!("Could not obtain last job ID");
                return Ok(result);
            };
            let log = self.job_log(job.id).await?;
            info!("job {} output:\n{log}", job.id);
        }
        Ok(result)
    }

    /// Returns the id and status of the most recent job.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn get_last_job_id(&self) -> Result<Option<JobInfo>> {
        let command = self
            .base_command(false, true)
            .arg("job")
            .arg("--list")
            .arg("--batch");
        let result = self.run(&command).await?;
        if result.has_error(self.stderr_threshold) {
            error!("{}", result.stderr.trim_end());
            return Ok(None);
        }
        let job = parse::parse_last_job(&result.stdout);
        match &job {
            Some(job) => debug!("job id found: {}, job status: {}", job.id, job.status),
            None => debug!("no job found in output: {}", result.stdout.trim_end()),
        }
        Ok(job)
    }

    /// Fetches the log of a job.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn job_log(&self, job_id: u64) -> Result<String> {
        let command = self
            .base_command(false, true)
            .arg("job")
            .flag("job-id", job_id)
            .arg("--log");
        let result = self.run(&command).await?;
        Ok(result.stdout)
    }

    /// Creates a database on a cluster and waits for the job.
    ///
    /// # Errors
    /// Returns error when the binary cannot be spawned.
    pub async fn create_database(&self, cluster_id: u64, db_name: &str) -> Result<bool> {
        let command = self
            .base_command(false, true)
            .arg("cluster")
            .arg("--create-database")
            .flag("cluster-id", cluster_id)
            .flag("db-name", db_name)
            .arg("--wait");
        info!("Executing: {command}");
        let result = self.exec_s9s_command(&command, true).await?;
        if result.has_error(self.stderr_threshold) {
            error!("{}", result.stderr.trim_end());
            return Ok(false);
        }
        debug!("Output: {}", result.stdout.trim_end());
        Ok(true)
    }
}
