use std::ffi::OsStr;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Architecture assumed when `dpkg` is unavailable.
pub const DEFAULT_ARCH: &str = "amd64";

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// External tools report failures on stderr rather than through exit codes,
    /// so anything longer than `threshold` characters counts as an error.
    #[must_use]
    pub fn has_error(&self, threshold: usize) -> bool {
        self.stderr.chars().count() > threshold
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs `program` with `args` (no shell involved) and captures both streams.
///
/// # Errors
/// Returns error only when the process cannot be spawned or awaited.
pub async fn exec_command<P, I, S>(program: P, args: I) -> Result<CommandOutput>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("Failed to run {}", program.to_string_lossy()))?;
    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
    };
    debug!(
        "{} exited with {:?} (stdout={} bytes, stderr={} bytes)",
        program.to_string_lossy(),
        result.exit_code,
        result.stdout.len(),
        result.stderr.len()
    );
    Ok(result)
}

/// Sources `bash_file` and calls `function_name` with `args`.
///
/// # Errors
/// Returns error when `bash` cannot be spawned.
pub async fn exec_bash_function(
    function_name: &str,
    args: &str,
    bash_file: &str,
) -> Result<CommandOutput> {
    let script = bash_function_script(function_name, args, bash_file);
    exec_command("bash", ["-c", script.as_str()]).await
}

fn bash_function_script(function_name: &str, args: &str, bash_file: &str) -> String {
    if args.is_empty() {
        format!(". {bash_file}; {function_name}")
    } else {
        format!(". {bash_file}; {function_name} {args}")
    }
}

#[must_use]
pub fn env_var(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Detects the local architecture via `dpkg --print-architecture`.
pub async fn local_arch() -> String {
    match exec_command("dpkg", ["--print-architecture"]).await {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            output.stdout.trim().to_string()
        }
        _ => DEFAULT_ARCH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_error_respects_threshold() {
        let mut output = CommandOutput::default();
        assert!(!output.has_error(3));
        output.stderr = "\n\n\n".to_string();
        assert!(!output.has_error(3));
        output.stderr = "fail".to_string();
        assert!(output.has_error(3));
    }

    #[test]
    fn test_has_error_counts_characters() {
        let mut output = CommandOutput {
            stderr: "éé".to_string(),
            ..CommandOutput::default()
        };
        assert!(!output.has_error(3));
        output.stderr = "éééé".to_string();
        assert!(output.has_error(3));
    }

    #[test]
    fn test_bash_function_script() {
        assert_eq!(
            bash_function_script("check_cluster", "--id 3", "include.sh"),
            ". include.sh; check_cluster --id 3"
        );
        assert_eq!(
            bash_function_script("cleanup", "", "include.sh"),
            ". include.sh; cleanup"
        );
    }

    #[test]
    fn test_env_var_default() {
        assert_eq!(env_var("S9S_FT_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_exec_command_captures_streams() {
        let output = exec_command("sh", ["-c", "printf out; printf error >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "error");
        assert_eq!(output.exit_code, Some(3));
        assert!(output.has_error(3));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_exec_command_missing_binary_is_error() {
        let err = exec_command("/nonexistent/s9s-ft-binary", Vec::<String>::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }

    #[tokio::test]
    async fn test_local_arch_never_empty() {
        assert!(!local_arch().await.is_empty());
    }
}
