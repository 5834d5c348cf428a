use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::{self, Write};

use logshard::cli::Cli;
use logshard::config::AppConfig;
use logshard::config_file::ConfigFile;
use logshard::logging;
use logshard::platform::{CancelToken, ExitCode, SafeStdout, SignalHandler};
use logshard::runner::run_task;

fn main() {
    let cli = Cli::parse();

    if cli.show_config {
        let mut stdout = SafeStdout::new();
        if let Err(e) = ConfigFile::show_config(&mut stdout) {
            eprintln!("logshard: {}", e);
            ExitCode::GeneralError.exit();
        }
        ExitCode::Success.exit();
    }

    if cli.command.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingSubcommand,
                "task argument required: filter|stats|top",
            )
            .exit();
    }

    if let Err(e) = run(&cli) {
        eprintln!("logshard: {:#}", e);
        ExitCode::GeneralError.exit();
    }
    ExitCode::Success.exit();
}

fn run(cli: &Cli) -> Result<()> {
    let (config_file, config_path) = if cli.ignore_config {
        (ConfigFile::default(), None)
    } else {
        ConfigFile::load_with_custom_path(cli.config_file.as_deref())?
    };

    let config = AppConfig::resolve(cli, &config_file)?;
    logging::init(&config.logging)?;
    match config_path {
        Some(path) => log::debug!("Loaded configuration from {}", path.display()),
        None => log::debug!("No configuration file in use"),
    }

    let Some(command) = cli.command.as_ref() else {
        return Ok(());
    };
    let task = command.task();
    task.validate()?;

    let cancel = CancelToken::new();
    let _signal_handler = SignalHandler::new(cancel.clone())?;

    log::debug!(
        "Running {} on {} with {} workers",
        task.kind,
        config.run.file_path.display(),
        config.run.worker_count
    );
    let outcome = run_task(&task, &config.run, &cancel, SafeStdout::new())?;

    let mut stdout = SafeStdout::new();
    outcome.write_report(&task, config.run.top_n, &mut stdout)?;
    io::stdout().flush()?;
    Ok(())
}
