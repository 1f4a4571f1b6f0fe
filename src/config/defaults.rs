use std::path::{Path, PathBuf};

use config::{ConfigBuilder, ConfigError, builder::DefaultState};

/// Port of a real cmon controller.
pub const CMON_PORT: u16 = 9501;
/// Port of the ft_full controller used by the functional-test farm.
pub const FT_FULL_PORT: u16 = 9556;

const DEFAULT_CONTROLLER_HOST: &str = "localhost";
const DEFAULT_CMON_USER: &str = "";
const DEFAULT_CMON_PASSWORD: &str = "";
const DEFAULT_COLOR: bool = true;
const DEFAULT_S9S_BIN: &str = "s9s";
const S9S_TOOLS_DIR: &str = "s9s-tools";
const DEFAULT_SSH_USER: &str = "root";
const DEFAULT_SSH_KEY: &str = ".ssh/id_rsa";
const DEFAULT_LXD_ENDPOINT: &str = "https://127.0.0.1:8443";
const DEFAULT_LXD_VERIFY_TLS: bool = false;
const DEFAULT_LXD_CERT_DIR: &str = ".config/s9s-ft";
const DEFAULT_LXC_BIN: &str = "/usr/bin/lxc";
const DEFAULT_LXD_OPERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_UBUNTU_IMAGE: &str = "ubuntu-focal-cloud";
const DEFAULT_CENTOS_IMAGE: &str = "centos-9-cloud";
const ENV_LOG_FILE: &str = "LOGFILE";
const DEFAULT_LOG_FILE: &str = "/tmp/s9s-ft.log";
const DEFAULT_LOG_LEVEL: &str = "debug";
const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;
const DEFAULT_LOG_BACKUPS: u32 = 2;
const DEFAULT_STEP_INTERVAL: &str = "5s";
const DEFAULT_POLL_ATTEMPTS: u32 = 4;
const DEFAULT_RECOVERY_ATTEMPTS: u32 = 24;
const DEFAULT_STDERR_THRESHOLD: u64 = 3;
const DEFAULT_COUNTERS_FILE: &str = "s9s-ft-counters.env";

pub(crate) fn apply_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_default();
    builder
        .set_default("controller.host", DEFAULT_CONTROLLER_HOST)?
        .set_default("controller.ft_full", false)?
        .set_default("controller.user", DEFAULT_CMON_USER)?
        .set_default("controller.password", DEFAULT_CMON_PASSWORD)?
        .set_default("controller.s9s_bin", path_value(&default_s9s_bin(&cwd)))?
        .set_default("controller.color", DEFAULT_COLOR)?
        .set_default("ssh.user", DEFAULT_SSH_USER)?
        .set_default("ssh.key_file", path_value(&home_path(DEFAULT_SSH_KEY)))?
        .set_default("lxd.endpoint", DEFAULT_LXD_ENDPOINT)?
        .set_default("lxd.verify_tls", DEFAULT_LXD_VERIFY_TLS)?
        .set_default("lxd.cert_dir", path_value(&home_path(DEFAULT_LXD_CERT_DIR)))?
        .set_default("lxd.lxc_bin", DEFAULT_LXC_BIN)?
        .set_default(
            "lxd.operation_timeout_secs",
            DEFAULT_LXD_OPERATION_TIMEOUT_SECS,
        )?
        .set_default("images.ubuntu", DEFAULT_UBUNTU_IMAGE)?
        .set_default("images.centos", DEFAULT_CENTOS_IMAGE)?
        .set_default("log.file", default_log_file())?
        .set_default("log.level", DEFAULT_LOG_LEVEL)?
        .set_default("log.max_bytes", DEFAULT_LOG_MAX_BYTES)?
        .set_default("log.backups", DEFAULT_LOG_BACKUPS)?
        .set_default("poll.step_interval", DEFAULT_STEP_INTERVAL)?
        .set_default("poll.attempts", DEFAULT_POLL_ATTEMPTS)?
        .set_default("poll.recovery_attempts", DEFAULT_RECOVERY_ATTEMPTS)?
        .set_default("poll.stderr_threshold", DEFAULT_STDERR_THRESHOLD)?
        .set_default(
            "counters.file",
            path_value(&std::env::temp_dir().join(DEFAULT_COUNTERS_FILE)),
        )
}

/// Uses the binary of an enclosing `s9s-tools` checkout when there is one.
pub(crate) fn default_s9s_bin(cwd: &Path) -> PathBuf {
    let cwd = cwd.to_string_lossy();
    match cwd.find(S9S_TOOLS_DIR) {
        Some(idx) => PathBuf::from(format!(
            "{}{S9S_TOOLS_DIR}/s9s/s9s",
            &cwd[..idx]
        )),
        None => PathBuf::from(DEFAULT_S9S_BIN),
    }
}

fn default_log_file() -> String {
    std::env::var(ENV_LOG_FILE).unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string())
}

fn home_path(relative: &str) -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/root"), PathBuf::from)
        .join(relative)
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_s9s_bin_inside_checkout() {
        let bin = default_s9s_bin(Path::new("/home/pipas/s9s-tools/tests/pys9s"));
        assert_eq!(bin, PathBuf::from("/home/pipas/s9s-tools/s9s/s9s"));
    }

    #[test]
    fn test_default_s9s_bin_outside_checkout() {
        assert_eq!(default_s9s_bin(Path::new("/srv/ci")), PathBuf::from("s9s"));
    }
}
