use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use custody_contract::{names, Invocation, RecordContract, Response};
use custody_server::{CustodyServer, ServerConfig};
use custody_store::{LogStateStore, SyncMode};

use crate::cli::*;

const DEFAULT_STATE_PATH: &str = ".custody/ledger.log";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        format,
        state,
        config,
        ..
    } = cli;
    let mut config = load_config(config.as_deref())?;
    let state = resolve_state_path(state, &config);

    match command {
        Command::Invoke(args) => {
            let list = std::iter::once(args.function).chain(args.args);
            cmd_handle(&state, &config, format, Invocation::from_arg_list(list))
        }
        Command::Query(args) => cmd_invoke(&state, &config, format, Invocation::new(names::QUERY_RECORD, [args.key])),
        Command::QueryAll => cmd_invoke(&state, &config, format, Invocation::new(names::QUERY_ALL_RECORDS, Vec::<String>::new())),
        Command::Record(args) => {
            let fields = [args.key, args.owner, args.details, args.timestamp, args.custodian];
            cmd_invoke(&state, &config, format, Invocation::new(names::RECORD_ENTRY, fields))
        }
        Command::Transfer(args) => {
            cmd_invoke(&state, &config, format, Invocation::new(names::CHANGE_CUSTODIAN, [args.key, args.custodian]))
        }
        Command::Seed => cmd_invoke(&state, &config, format, Invocation::new(names::INIT_LEDGER, Vec::<String>::new())),
        Command::Compact => cmd_compact(&state, &config),
        Command::Serve(args) => {
            if let Some(bind) = args.bind {
                config.bind_addr = bind
                    .parse()
                    .with_context(|| format!("invalid bind address {bind:?}"))?;
            }
            config.state_path = Some(state);
            cmd_serve(config)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => Ok(ServerConfig::load(path)?),
        None => Ok(ServerConfig::default()),
    }
}

/// `--state` wins over the config file, which wins over the default location.
fn resolve_state_path(flag: Option<PathBuf>, config: &ServerConfig) -> PathBuf {
    flag.or_else(|| config.state_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH))
}

fn sync_mode(config: &ServerConfig) -> SyncMode {
    if config.sync_every_write {
        SyncMode::EveryWrite
    } else {
        SyncMode::OsDefault
    }
}

fn open_ledger(state: &Path, config: &ServerConfig) -> anyhow::Result<Arc<LogStateStore>> {
    let store = LogStateStore::open(state, sync_mode(config))
        .with_context(|| format!("failed to open ledger {}", state.display()))?;
    let recovery = store.recovery();
    if recovery.truncated_tail {
        eprintln!(
            "{} ledger log ended early; recovered {} entries",
            "warning:".yellow().bold(),
            recovery.applied
        );
    }
    if let Some(aside) = &recovery.preserved {
        eprintln!(
            "{} unreadable log saved to {}",
            "warning:".yellow().bold(),
            aside.display().to_string().bold()
        );
    }
    Ok(Arc::new(store))
}

fn open_contract(state: &Path, config: &ServerConfig) -> anyhow::Result<RecordContract> {
    let store = open_ledger(state, config)?;
    Ok(RecordContract::with_config(store, config.contract.clone())?)
}

/// Run one invocation against the ledger at `state` and return its payload.
fn execute(state: &Path, config: &ServerConfig, invocation: &Invocation) -> anyhow::Result<Vec<u8>> {
    open_contract(state, config)?
        .invoke(invocation)
        .with_context(|| format!("{} failed", invocation.function))
}

/// Run one invocation and fold the outcome into a status/message/payload response.
fn respond(state: &Path, config: &ServerConfig, invocation: &Invocation) -> anyhow::Result<Response> {
    Ok(open_contract(state, config)?.handle(invocation))
}

fn cmd_invoke(
    state: &Path,
    config: &ServerConfig,
    format: OutputFormat,
    invocation: Invocation,
) -> anyhow::Result<()> {
    let payload = execute(state, config, &invocation)?;
    print_payload(&invocation, &payload, format);
    Ok(())
}

fn cmd_handle(
    state: &Path,
    config: &ServerConfig,
    format: OutputFormat,
    invocation: Invocation,
) -> anyhow::Result<()> {
    let response = respond(state, config, &invocation)?;
    if !response.is_ok() {
        anyhow::bail!(
            "{} failed with status {}: {}",
            invocation.function,
            response.status,
            response.message
        );
    }
    print_payload(&invocation, &response.payload, format);
    Ok(())
}

fn print_payload(invocation: &Invocation, payload: &[u8], format: OutputFormat) {
    if payload.is_empty() {
        println!("{} {}", "✓".green().bold(), invocation.function.bold());
    } else {
        println!("{}", render_payload(payload, format));
    }
}

fn render_payload(payload: &[u8], format: OutputFormat) -> String {
    let text = String::from_utf8_lossy(payload);
    match format {
        OutputFormat::Text => text.into_owned(),
        OutputFormat::Json => serde_json::from_slice::<serde_json::Value>(payload)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| text.into_owned()),
    }
}

fn cmd_compact(state: &Path, config: &ServerConfig) -> anyhow::Result<()> {
    let store = open_ledger(state, config)?;
    let kept = store.compact().context("compaction failed")?;
    println!(
        "{} Compacted {}: {} live entries",
        "✓".green().bold(),
        state.display().to_string().bold(),
        kept
    );
    Ok(())
}

fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    let bind = config.bind_addr;
    let server = CustodyServer::new(config)?;
    println!("Custody server on {}", bind.to_string().bold());
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}
