use std::fmt;
use std::path::{Path, PathBuf};

const PASSWORD_FLAG: &str = "--password";
const MASK: &str = "****";

/// An `s9s` invocation: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S9sCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl S9sCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a bare argument (`cluster`, `--list`, ...).
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends `--name=value`.
    #[must_use]
    pub fn flag(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.args.push(format!("--{name}={value}"));
        self
    }

    /// Appends `--name=value` when a value is present.
    #[must_use]
    pub fn flag_opt<T: fmt::Display>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.flag(name, value),
            None => self,
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for S9sCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            match arg.split_once('=') {
                Some((PASSWORD_FLAG, _)) => write!(f, " {PASSWORD_FLAG}={MASK}")?,
                _ => write!(f, " {arg}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_appends_in_order() {
        let command = S9sCommand::new("/usr/bin/s9s")
            .arg("cluster")
            .arg("--list")
            .flag("cluster-id", 5)
            .flag_opt("cluster-name", None::<&str>)
            .flag_opt("title", Some("nightly"));
        assert_eq!(
            command.args(),
            ["cluster", "--list", "--cluster-id=5", "--title=nightly"]
        );
        assert_eq!(command.program(), Path::new("/usr/bin/s9s"));
    }

    #[test]
    fn test_display_masks_password() {
        let command = S9sCommand::new("s9s")
            .flag("cmon-user", "pipas")
            .flag("password", "secret")
            .arg("job");
        assert_eq!(
            command.to_string(),
            "s9s --cmon-user=pipas --password=**** job"
        );
    }

    #[test]
    fn test_display_only_masks_cmon_password() {
        let command = S9sCommand::new("s9s").flag("db-admin-passwd", "myPassword");
        assert_eq!(command.to_string(), "s9s --db-admin-passwd=myPassword");
    }
}
