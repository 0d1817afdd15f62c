//! # tether
//!
//! Chat console binary: loads settings, starts the self-healing client, and
//! wires stdin/stdout to its queues.

#![deny(unsafe_code)]

mod cli;
mod console;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tether_client::{ClientError, ShutdownCoordinator, TetherClient};
use tokio::io::BufReader;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::cli::{Cli, SHUTDOWN_TIMEOUT, client_config};

/// What ended the session.
enum Exit {
    Supervisor(Result<Result<(), ClientError>, JoinError>),
    InputClosed(std::io::Result<u64>),
    OutputFailed(std::io::Error),
    Interrupted,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("tether: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A pending stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tether: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = cli.resolve_settings()?;
    tether_core::logging::init_subscriber(settings.logging.level.as_filter_str(), settings.logging.format);

    let user = settings.client.user_name.clone();
    info!(url = %settings.client.url, %user, "starting tether console");

    let coordinator = ShutdownCoordinator::new();
    let client = TetherClient::new(settings.client.url.clone(), client_config(&settings.client))
        .with_shutdown_token(coordinator.token());
    let outbound = client.outbound().clone();
    let inbound = client.inbound().clone();
    let connectivity = client.connectivity();

    let mut supervisor = client.spawn();
    let input = console::input_loop(BufReader::new(tokio::io::stdin()), &user, &outbound, tokio::io::stdout());
    let output = console::output_loop(inbound, connectivity, tokio::io::stdout());
    tokio::pin!(input, output);

    let exit = tokio::select! {
        joined = &mut supervisor => Exit::Supervisor(joined),
        result = &mut input => Exit::InputClosed(result),
        Err(err) = &mut output => Exit::OutputFailed(err),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            Exit::Interrupted
        }
    };

    let code = match exit {
        Exit::Supervisor(Ok(Ok(()))) => ExitCode::SUCCESS,
        Exit::Supervisor(Ok(Err(err))) => {
            error!(error = %err, "client stopped");
            eprintln!("tether: {err}");
            return Ok(ExitCode::FAILURE);
        }
        Exit::Supervisor(Err(err)) => {
            error!(error = %err, "client task failed");
            return Ok(ExitCode::FAILURE);
        }
        Exit::InputClosed(Ok(sent)) => {
            info!(sent, "input closed, shutting down");
            if !console::drain(&outbound, SHUTDOWN_TIMEOUT).await {
                info!(
                    pending = outbound.len(),
                    in_flight = outbound.in_flight(),
                    "outbound queue not drained"
                );
            }
            ExitCode::SUCCESS
        }
        Exit::InputClosed(Err(err)) => {
            error!(error = %err, "failed to read input");
            ExitCode::FAILURE
        }
        Exit::OutputFailed(err) => {
            error!(error = %err, "failed to write output");
            ExitCode::FAILURE
        }
        Exit::Interrupted => {
            info!("interrupted, shutting down");
            ExitCode::SUCCESS
        }
    };

    if !coordinator.graceful_shutdown(vec![supervisor], Some(SHUTDOWN_TIMEOUT)).await {
        return Ok(ExitCode::FAILURE);
    }
    Ok(code)
}
