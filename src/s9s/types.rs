use std::fmt;
use std::str::FromStr;

/// Cluster state as printed by `s9s cluster --list --long`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    Started,
    Degraded,
    Failure,
    Failed,
    Other(String),
}

impl ClusterStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ClusterStatus::Started => "STARTED",
            ClusterStatus::Degraded => "DEGRADED",
            ClusterStatus::Failure => "FAILURE",
            ClusterStatus::Failed => "FAILED",
            ClusterStatus::Other(value) => value,
        }
    }
}

impl FromStr for ClusterStatus {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "STARTED" => ClusterStatus::Started,
            "DEGRADED" => ClusterStatus::Degraded,
            "FAILURE" => ClusterStatus::Failure,
            "FAILED" => ClusterStatus::Failed,
            other => ClusterStatus::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job state as printed by `s9s job --list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Finished,
    Failed,
    Running,
    Defined,
    Scheduled,
    Aborted,
    Other(String),
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Running => "RUNNING",
            JobStatus::Defined => "DEFINED",
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::Aborted => "ABORTED",
            JobStatus::Other(value) => value,
        }
    }
}

impl FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "FINISHED" => JobStatus::Finished,
            "FAILED" => JobStatus::Failed,
            "RUNNING" => JobStatus::Running,
            "DEFINED" => JobStatus::Defined,
            "SCHEDULED" => JobStatus::Scheduled,
            "ABORTED" => JobStatus::Aborted,
            other => JobStatus::Other(other.to_string()),
        })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub id: u64,
    pub status: ClusterStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: u64,
    pub status: JobStatus,
}
