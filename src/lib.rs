// src/lib.rs

pub mod actions;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod protocol;
pub mod types;
pub mod watch;

use anyhow::Context;
use tracing::{debug, info};

use crate::actions::archive::ArchiveFormat;
use crate::actions::deploy::DeploySettings;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, resolve_config};
use crate::engine::{Supervisor, SupervisorSettings};
use crate::errors::Result;
use crate::protocol::{EventWriter, Outcome, Request, hello_event, read_request};
use crate::types::Action;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution
/// - the optional `hello` handshake
/// - reading the single JSON request from STDIN
/// - dispatch to the supervisor or a collaborator action
///
/// Errors returned here happen before any terminal event was written; once a
/// request is dispatched its outcome is reported in-band and this returns
/// `Ok(())`.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(args.config.as_deref())?;
    let writer = EventWriter::stdout(cfg.stream.action_tag.clone());

    if cfg.protocol.handshake && !args.no_hello {
        writer.emit(&hello_event(writer.action()));
    }

    let request = tokio::task::spawn_blocking(|| read_request(std::io::stdin()))
        .await
        .context("reading request from stdin")??;

    let outcome = dispatch(&cfg, &request, &writer).await?;
    debug!(ok = outcome.ok, exit_code = ?outcome.exit_code, "request finished");
    Ok(())
}

/// Route one parsed request to its handler and return the reported outcome.
pub async fn dispatch(cfg: &ConfigFile, request: &Request, writer: &EventWriter) -> Result<Outcome> {
    let action = request.action()?;
    info!(?action, "dispatching request");

    let outcome = match action {
        Action::RunStream => {
            let supervisor = Supervisor::new(SupervisorSettings::from(cfg), writer.clone());
            supervisor.run(&request.execution()).await
        }
        Action::ZipDir => actions::archive::run(request, ArchiveFormat::Zip, writer).await,
        Action::TarDir => {
            let format = if request.targz.unwrap_or(false) {
                ArchiveFormat::TarGz
            } else {
                ArchiveFormat::Tar
            };
            actions::archive::run(request, format, writer).await
        }
        Action::ChecksumFile => actions::checksum::run(request, writer).await,
        Action::NetlifyDeployDir => {
            let settings = DeploySettings::from(cfg);
            actions::deploy::run(request, &settings, cfg.deploy.token_from_env(), writer).await
        }
    };

    Ok(outcome)
}
