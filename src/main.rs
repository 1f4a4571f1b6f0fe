use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use s9s_ft::config::{Overrides, Settings};
use s9s_ft::logging;
use s9s_ft::suite::{Platform, SuiteKind};

mod cli;
mod commands;

use crate::cli::output;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log file, overrides `log.file` and `LOGFILE`
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Counters file, overrides `counters.file`
    #[arg(long, global = true)]
    counters_file: Option<PathBuf>,

    /// Controller host
    #[arg(long, global = true)]
    controller: Option<String>,

    /// Path to the s9s binary
    #[arg(long, global = true)]
    s9s_bin: Option<PathBuf>,

    /// LXD REST endpoint (e.g. <https://127.0.0.1:8443>)
    #[arg(long, global = true)]
    lxd_endpoint: Option<String>,

    /// Talk to the `ft_full` controller port instead of cmon's
    #[arg(
        long,
        env = "USE_FT_FULL",
        global = true,
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    ft_full: bool,

    #[command(subcommand)]
    command: CliCommand,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            log_file: self.log_file.clone(),
            counters_file: self.counters_file.clone(),
            controller: self.controller.clone(),
            s9s_bin: self.s9s_bin.clone(),
            lxd_endpoint: self.lxd_endpoint.clone(),
            ft_full: self.ft_full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Run one or more suites
    Run(RunArgs),
    /// List the available suites
    List,
    #[command(subcommand)]
    Counters(CountersCommand),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Suites to run, in order
    #[arg(value_enum, required = true)]
    suites: Vec<SuiteKind>,

    /// Platforms to test on (defaults to all)
    #[arg(long, value_enum, value_delimiter = ',')]
    platform: Vec<Platform>,
}

/// Inspect or reset the shared check counters
#[derive(Subcommand, Debug)]
enum CountersCommand {
    Show,
    Reset,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("s9s-ft error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    let mut settings = Settings::new(cli.config.clone()).context("Failed to load settings")?;
    settings.merge_with_args(&cli.overrides());
    settings.validate()?;

    match cli.command {
        CliCommand::List => output::print_suite_list(),
        CliCommand::Counters(CountersCommand::Show) => {
            commands::counters::run_counters_show(&settings)?;
        }
        CliCommand::Counters(CountersCommand::Reset) => {
            commands::counters::run_counters_reset(&settings)?;
        }
        CliCommand::Run(args) => {
            logging::init(&settings.log)?;
            let platforms = if args.platform.is_empty() {
                Platform::ALL.to_vec()
            } else {
                args.platform
            };
            let runtime = tokio::runtime::Runtime::new()
                .context("Failed to initialize async runtime for run")?;
            return runtime.block_on(commands::run::run_suites(
                &settings,
                &args.suites,
                &platforms,
            ));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_with_platforms() {
        let cli = Cli::parse_from([
            "s9s-ft",
            "run",
            "elasticsearch-ha",
            "mssql",
            "--platform",
            "centos",
        ]);
        match cli.command {
            CliCommand::Run(args) => {
                assert_eq!(args.suites, [SuiteKind::ElasticsearchHa, SuiteKind::Mssql]);
                assert_eq!(args.platform, [Platform::Centos]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_global_overrides() {
        let cli = Cli::parse_from([
            "s9s-ft",
            "counters",
            "show",
            "--counters-file",
            "/tmp/c.env",
            "--ft-full",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.counters_file, Some(PathBuf::from("/tmp/c.env")));
        assert!(overrides.ft_full);
    }

    #[test]
    fn test_cli_rejects_unknown_suite() {
        assert!(Cli::try_parse_from(["s9s-ft", "run", "galera"]).is_err());
    }
}
