use std::process::ExitCode;

use anyhow::{Context, Error};
use clap::Parser;
use log::{error, info};
use serde::Serialize;

use fileshare::{
    cli::{Cli, Commands},
    BackgroundLog, Driver, MultiLogger, FILESHARE_VERSION,
};
use fileshare_api::error::{FileShareError, FileShareResultExt, InternalError, ReportError};

fn print_yaml(value: &impl Serialize) -> Result<(), FileShareError> {
    let output = serde_yaml::to_string(value).structured(InternalError::SerializeOutput)?;
    print!("{output}");
    Ok(())
}

fn run_command(driver: &Driver, command: &Commands) -> Result<(), FileShareError> {
    match command {
        Commands::ListPools => print_yaml(&driver.list_pools()?),
        Commands::Create { .. } => {
            let request = command
                .create_request()
                .structured(InternalError::Internal("Missing creation request"))?;
            print_yaml(&driver.create_file_share(&request)?)
        }
        Commands::Delete { .. } => {
            let request = command
                .delete_request()
                .structured(InternalError::Internal("Missing deletion request"))??;
            driver.delete_file_share(&request)
        }
    }
}

fn run(args: &Cli) -> Result<(), FileShareError> {
    info!("File share driver version: {FILESHARE_VERSION}");

    let res = Driver::setup(args.config.as_deref())
        .and_then(|driver| run_command(&driver, &args.command));

    // return error if requested
    if let Some(error_path) = args.error.as_ref() {
        if let Err(e) = &res {
            if let Err(e2) =
                std::fs::write(error_path, serde_yaml::to_string(&e).unwrap_or_default())
            {
                error!("Failed to write error to file: {e2}");
            }
        }
    }

    res.message(format!("Failed to execute '{}' command", args.command))
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    let mut multilogger = MultiLogger::new()
        // Add regular env_logger to output to stderr
        .with_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(args.verbosity)
                .build(),
        ));

    if let Some(path) = &args.log_file {
        let log = BackgroundLog::open(path)
            .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
        multilogger.add_logger(log.into_logger());
    }

    multilogger.init().context("Logger already registered")?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = run(&args) {
        error!("{e:?}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
