// ABOUTME: Entry point for the skipper CLI application.
// ABOUTME: Parses arguments, sets up logging, dispatches commands, and maps exit codes.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ReleaseOpts};
use skipper::config;
use skipper::deploy::DeployErrorKind;
use skipper::error::{Error, Result};
use skipper::output::{Output, OutputMode};
use skipper::release::{BatchFailureKind, BatchRequest, ReleaseRequest};
use skipper::tag::TagError;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let code = match run(cli, mode).await {
        Ok(code) => code,
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, mode: OutputMode) -> Result<i32> {
    let output = Output::new(mode);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            let dir = match config_path.and_then(|p| p.parent()) {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => env::current_dir()?,
            };
            config::init_config(&dir, force)?;
            output.success(&format!(
                "Created {}",
                dir.join(config::CONFIG_FILENAME).display()
            ));
            Ok(0)
        }
        Commands::Release {
            service,
            version,
            opts,
        } => {
            let config = commands::load_config(config_path)?;
            let item = ReleaseRequest::parse(&format!("{service}:{version}"))?;
            commands::release(config, batch_request(vec![item], &opts), output).await
        }
        Commands::ReleaseBatch { items, opts } => {
            let config = commands::load_config(config_path)?;
            let items = items
                .iter()
                .map(|item| ReleaseRequest::parse(item))
                .collect::<Result<Vec<_>>>()?;
            commands::release(config, batch_request(items, &opts), output).await
        }
        Commands::Status { batch } => {
            let config = commands::load_config(config_path)?;
            commands::status(config, batch, output)
        }
        Commands::Rollback { revision, force } => {
            let config = commands::load_config(config_path)?;
            commands::rollback(config, &revision, force, output).await
        }
        Commands::History => {
            let config = commands::load_config(config_path)?;
            commands::history(config, output)
        }
        Commands::Suggest { service } => {
            let config = commands::load_config(config_path)?;
            commands::suggest(config, &service, output).await
        }
    }
}

fn batch_request(items: Vec<ReleaseRequest>, opts: &ReleaseOpts) -> BatchRequest {
    let mut request = BatchRequest::new(items);
    request.auto_bump = opts.auto_bump;
    request.verify_timeout = opts.timeout.map(Into::into);
    request.force_lock = opts.force;
    request
}

/// Exit code for errors raised outside a batch run.
fn exit_code(error: &Error) -> i32 {
    match error {
        Error::Tag(TagError::Conflict(_)) => BatchFailureKind::TagConflict.exit_code(),
        Error::Verify(_) => BatchFailureKind::ArtifactTimeout.exit_code(),
        Error::Deploy(e) if e.kind() == DeployErrorKind::LockHeld => {
            BatchFailureKind::LockHeld.exit_code()
        }
        _ => 1,
    }
}
