use anyhow::Result;

use super::{LxdSettings, PollSettings, Settings};

pub(crate) fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.log.file.as_os_str().is_empty() {
        anyhow::bail!("log.file must not be empty");
    }
    if settings.log.max_bytes == 0 {
        anyhow::bail!("log.max_bytes must be greater than 0");
    }
    if settings.counters.file.as_os_str().is_empty() {
        anyhow::bail!("counters.file must not be empty");
    }
    validate_poll_settings(&settings.poll)?;
    Ok(())
}

pub(crate) fn validate_infrastructure(settings: &Settings) -> Result<()> {
    validate_settings(settings)?;
    let controller = &settings.controller;
    if controller.host.trim().is_empty() {
        anyhow::bail!("controller.host must not be empty");
    }
    if controller.port() == 0 {
        anyhow::bail!("controller.port must be greater than 0");
    }
    if controller.user.trim().is_empty() {
        anyhow::bail!("controller.user must not be empty");
    }
    if controller.password.is_empty() {
        anyhow::bail!("controller.password must not be empty");
    }
    if controller.s9s_bin.as_os_str().is_empty() {
        anyhow::bail!("controller.s9s_bin must not be empty");
    }
    if settings.ssh.user.trim().is_empty() {
        anyhow::bail!("ssh.user must not be empty");
    }
    if settings.images.ubuntu.trim().is_empty() || settings.images.centos.trim().is_empty() {
        anyhow::bail!("images.ubuntu and images.centos must not be empty");
    }
    validate_lxd_settings(&settings.lxd)?;
    Ok(())
}

fn validate_poll_settings(poll: &PollSettings) -> Result<()> {
    poll.step()?;
    if poll.attempts == 0 {
        anyhow::bail!("poll.attempts must be greater than 0");
    }
    if poll.recovery_attempts == 0 {
        anyhow::bail!("poll.recovery_attempts must be greater than 0");
    }
    Ok(())
}

fn validate_lxd_settings(lxd: &LxdSettings) -> Result<()> {
    if !(lxd.endpoint.starts_with("https://") || lxd.endpoint.starts_with("http://")) {
        anyhow::bail!("lxd.endpoint must be an http(s) URL");
    }
    if lxd.client_cert.is_some() != lxd.client_key.is_some() {
        anyhow::bail!("lxd.client_cert and lxd.client_key must be set together");
    }
    if let Some(password) = &lxd.password
        && password.is_empty()
    {
        anyhow::bail!("lxd.password must not be empty when set");
    }
    if lxd.operation_timeout_secs == 0 {
        anyhow::bail!("lxd.operation_timeout_secs must be greater than 0");
    }
    if lxd.lxc_bin.as_os_str().is_empty() {
        anyhow::bail!("lxd.lxc_bin must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn settings() -> Settings {
        let mut settings = Settings::new(Some(PathBuf::from("does-not-exist.toml"))).unwrap();
        settings.controller.user = "pipas".to_string();
        settings.controller.password = "secret".to_string();
        settings
    }

    #[test]
    fn test_defaults_with_credentials_are_valid() {
        validate_infrastructure(&settings()).unwrap();
    }

    #[test]
    fn test_missing_credentials_rejected_for_infrastructure_only() {
        let mut settings = settings();
        settings.controller.user = String::new();
        validate_settings(&settings).unwrap();
        let err = validate_infrastructure(&settings).unwrap_err();
        assert!(err.to_string().contains("controller.user"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut settings = settings();
        settings.poll.attempts = 0;
        let err = validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("poll.attempts"));
    }

    #[test]
    fn test_client_cert_requires_key() {
        let mut settings = settings();
        settings.lxd.client_cert = Some(PathBuf::from("client.crt"));
        let err = validate_infrastructure(&settings).unwrap_err();
        assert!(err.to_string().contains("lxd.client_key"));
    }

    #[test]
    fn test_endpoint_must_be_url() {
        let mut settings = settings();
        settings.lxd.endpoint = "127.0.0.1:8443".to_string();
        let err = validate_infrastructure(&settings).unwrap_err();
        assert!(err.to_string().contains("lxd.endpoint"));
    }
}
