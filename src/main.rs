#![forbid(unsafe_code)]

//! `agent-stream`: command-line client for a remote agent session.
//!
//! Streams a message and prints normalized events as JSON lines, answers
//! HITL pauses from stdin, keeps a persistent push listener open, or prints
//! the replayed turn history.

use std::path::PathBuf;
use std::pin::pin;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agent_stream::cli::{parse_decision, LogFormat};
use agent_stream::models::hitl::{HitlAction, HitlPayload, HitlRequest};
use agent_stream::models::session::Session;
use agent_stream::stream::events::DomainEvent;
use agent_stream::transport::socket::WebSocketConnector;
use agent_stream::{AgentClient, AppError, ClientConfig, Result, StreamOutcome};

#[derive(Debug, Parser)]
#[command(name = "agent-stream", about = "Remote agent streaming client", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one message and stream the agent's response.
    Send {
        /// Session identifier.
        #[arg(long)]
        session: String,
        /// Message text.
        message: String,
        /// Approve every HITL request without prompting.
        #[arg(long)]
        auto_approve: bool,
    },
    /// Keep a push connection open and print events as they arrive.
    Listen {
        /// Session identifier.
        #[arg(long)]
        session: String,
    },
    /// Print the session's stored turns.
    History {
        /// Session identifier.
        #[arg(long)]
        session: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = ClientConfig::load_from_path(&args.config)?;
    config.load_credentials();
    info!(base_url = %config.base_url, "configuration loaded");

    match args.command {
        Command::Send {
            session,
            message,
            auto_approve,
        } => send(config, session, message, auto_approve).await,
        Command::Listen { session } => listen(config, session).await,
        Command::History { session } => history(config, session).await,
    }
}

async fn send(
    config: ClientConfig,
    session_id: String,
    message: String,
    auto_approve: bool,
) -> Result<()> {
    let (client, mut events) = AgentClient::over_http(config, Session::new(session_id, ""))?;
    let handle = client.send_message(message).await?;
    let mut outcome = pin!(handle.wait());
    let mut shutdown = pin!(shutdown_signal());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let outcome = loop {
        tokio::select! {
            outcome = &mut outcome => break outcome,
            Some(event) = events.recv() => {
                print_event(&event)?;
                if let DomainEvent::HitlRequested { request } = &event {
                    decide(&client, request, auto_approve, &mut stdin).await?;
                }
            }
            () = &mut shutdown => {
                info!("shutdown signal received");
                client.disconnect().await;
                break StreamOutcome::Cancelled;
            }
        }
    };

    drain(&mut events)?;
    match outcome {
        StreamOutcome::Completed => Ok(()),
        StreamOutcome::Cancelled => {
            warn!("stream cancelled");
            Ok(())
        }
        StreamOutcome::Failed(err) => Err(err),
    }
}

async fn listen(config: ClientConfig, session_id: String) -> Result<()> {
    let connector = WebSocketConnector::new(&config)?;
    let (client, mut events) = AgentClient::over_http(config, Session::new(session_id, ""))?;
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(err) = print_event(&event) {
                error!(%err, "failed to print event");
            }
        }
    });

    let result = {
        let mut listener = pin!(client.listen(&connector, &cancel));
        tokio::select! {
            result = &mut listener => result,
            () = shutdown_signal() => {
                info!("shutdown signal received");
                cancel.cancel();
                listener.await
            }
        }
    };

    client.disconnect().await;
    drop(client);
    if let Err(err) = printer.await {
        warn!(%err, "event printer ended abnormally");
    }
    result
}

async fn history(config: ClientConfig, session_id: String) -> Result<()> {
    let (client, _events) = AgentClient::over_http(config, Session::new(session_id, ""))?;
    let count = client.load_history().await?;
    info!(turns = count, "history loaded");

    let snapshot = client.snapshot().await;
    for turn in snapshot.turns() {
        println!("{}", serde_json::to_string(turn)?);
    }
    Ok(())
}

/// Answer a HITL pause, prompting on stderr until a valid decision is sent.
async fn decide(
    client: &AgentClient,
    request: &HitlRequest,
    auto_approve: bool,
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    if auto_approve {
        return client.respond(HitlAction::Approve, HitlPayload::default()).await;
    }

    loop {
        eprintln!(
            "agent awaiting {} decision{}: approve | reject [msg] | modify <text> | retry | skip | feedback <text>",
            request.kind.as_str(),
            request
                .prompt
                .as_deref()
                .map(|prompt| format!(" ({prompt})"))
                .unwrap_or_default()
        );

        let Some(line) = stdin
            .next_line()
            .await
            .map_err(|err| AppError::Io(format!("failed to read decision: {err}")))?
        else {
            warn!("stdin closed, leaving hitl request unanswered");
            return Ok(());
        };

        let Some((action, payload)) = parse_decision(&line, request.kind) else {
            eprintln!("unrecognised decision: {}", line.trim());
            continue;
        };

        match client.respond(action, payload).await {
            Ok(()) => return Ok(()),
            Err(AppError::HitlViolation(msg)) => eprintln!("rejected: {msg}"),
            Err(err) => return Err(err),
        }
    }
}

fn print_event(event: &DomainEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn drain(events: &mut mpsc::Receiver<DomainEvent>) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
