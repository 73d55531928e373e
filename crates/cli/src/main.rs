mod document;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tether_api::{ReqwestTransport, RestClient};
use tether_engine::{Diagnostics, Engine, EngineError, PartialState, PrivateStore};
use tether_types::{OperationState, ProviderConfig, ResourceState};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::document::{Document, Output, Saved};

/// Drive declaratively configured HTTP resources.
///
/// Every command reads a configuration document (`--config`) and prints JSON
/// to stdout; logs go to stderr. State is never written to disk: save the
/// printed output and pass it back with `--state`.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the document's resource and print its state
    Create {
        #[arg(long)]
        config: PathBuf,
    },
    /// Refresh a saved resource state
    Read {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: PathBuf,
    },
    /// Bring a saved resource to the document's configuration
    Update {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: PathBuf,
    },
    /// Delete a saved resource
    Delete {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: PathBuf,
    },
    /// Import a resource from an identity printed by `list`
    Import {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        id: String,
    },
    /// Run the document's operation
    Operation {
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the document's action
    Action {
        #[arg(long)]
        config: PathBuf,
    },
    /// List the document's collection into importable identities
    List {
        #[arg(long)]
        config: PathBuf,
    },
    /// Open the document's lease, keep it renewed, then close it
    Open {
        #[arg(long)]
        config: PathBuf,
        /// Seconds to hold the lease open; Ctrl-C closes it early
        #[arg(long, default_value_t = 0)]
        hold_secs: u64,
    },
}

impl Command {
    fn config(&self) -> &PathBuf {
        match self {
            Self::Create { config }
            | Self::Read { config, .. }
            | Self::Update { config, .. }
            | Self::Delete { config, .. }
            | Self::Import { config, .. }
            | Self::Operation { config }
            | Self::Action { config }
            | Self::List { config }
            | Self::Open { config, .. } => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let Args { command } = Args::parse();
    let document = Document::load(command.config())?;
    let engine = build_engine(&document.provider)?;
    let cancel = cancel_on_interrupt();

    match command {
        Command::Create { .. } => {
            let mut private = PrivateStore::new();
            let mut diagnostics = Diagnostics::new();
            let created = engine
                .create_resource(&cancel, document.resource()?, &mut private, &mut diagnostics)
                .await;
            finish(created, private, diagnostics)
        }
        Command::Read { state, .. } => {
            let saved = Saved::<ResourceState>::load(&state)?;
            let read = engine.read_resource(&cancel, &saved.state, &saved.private, false).await?;
            if read.is_none() {
                info!(id = %saved.state.id, "resource is gone; drop it from state");
            }
            emit(&Output {
                state: read,
                private: saved.private,
                diagnostics: Diagnostics::new(),
            })
        }
        Command::Update { state, .. } => {
            let Saved { state: prior, mut private } = Saved::<ResourceState>::load(&state)?;
            let updated = engine
                .update_resource(&cancel, &prior, document.resource()?, &mut private)
                .await;
            finish(updated, private, Diagnostics::new())
        }
        Command::Delete { state, .. } => {
            let Saved { state, mut private } = Saved::<ResourceState>::load(&state)?;
            engine.delete_resource(&cancel, &state, &mut private).await?;
            info!(id = %state.id, "deleted");
            Ok(())
        }
        Command::Import { id, .. } => {
            let private = PrivateStore::new();
            let imported = engine.import_resource(&cancel, &id, &private).await?;
            emit(&Output {
                state: imported,
                private,
                diagnostics: Diagnostics::new(),
            })
        }
        Command::Operation { .. } => {
            let mut private = PrivateStore::new();
            let created = engine
                .create_operation(&cancel, document.operation()?, &mut private)
                .await;
            finish(created, private, Diagnostics::new())
        }
        Command::Action { .. } => emit(&engine.run_action(&cancel, document.action()?).await?),
        Command::List { .. } => emit(&engine.list_resources(&cancel, document.list()?).await?),
        Command::Open { hold_secs, .. } => hold_lease(&engine, &document, &cancel, hold_secs).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_engine(provider: &ProviderConfig) -> Result<Engine> {
    let transport = ReqwestTransport::new(provider).context("failed to build HTTP transport")?;
    Ok(Engine::new(RestClient::from_provider(Arc::new(transport), provider)))
}

fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the resulting state. A partially applied mutation still prints the
/// state to keep before the error is returned.
fn finish<T: Serialize>(result: Result<T, EngineError>, private: PrivateStore, diagnostics: Diagnostics) -> Result<()> {
    let error = match result {
        Ok(state) => {
            return emit(&Output {
                state,
                private,
                diagnostics,
            });
        }
        Err(error) => error,
    };
    match error.partial_state() {
        Some(PartialState::Resource(state)) => emit(&Output::<&ResourceState> {
            state,
            private,
            diagnostics,
        })?,
        Some(PartialState::Operation(state)) => emit(&Output::<&OperationState> {
            state,
            private,
            diagnostics,
        })?,
        None => {}
    }
    Err(error.into())
}

async fn hold_lease(engine: &Engine, document: &Document, cancel: &CancellationToken, hold_secs: u64) -> Result<()> {
    let mut private = PrivateStore::new();
    let opened = engine.open_ephemeral(cancel, document.ephemeral()?, &mut private).await?;
    emit(&opened)?;

    let deadline = Utc::now() + chrono::Duration::seconds(i64::try_from(hold_secs)?);
    let mut renew_at = opened.renew_at;
    loop {
        let wake = renew_at.map_or(deadline, |at| at.min(deadline));
        let wait = (wake - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        if wake >= deadline {
            break;
        }
        match engine.renew_ephemeral(cancel, &private).await {
            Ok(next) => renew_at = next,
            Err(err) => {
                error!(error = %err, "lease renewal failed; closing");
                break;
            }
        }
    }

    let mut diagnostics = Diagnostics::new();
    engine
        .close_ephemeral(&CancellationToken::new(), &mut private, &mut diagnostics)
        .await?;
    if diagnostics.has_errors() {
        anyhow::bail!("lease was not closed cleanly");
    }
    Ok(())
}
