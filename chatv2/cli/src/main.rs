//! chatv2 - Terminal Client for the chatv2 Chat Service
//!
//! # Usage
//!
//! ```bash
//! # List models and conversations
//! chatv2 models
//! chatv2 conversations
//!
//! # Ask something in a fresh conversation
//! chatv2 send "What is a borrow checker?"
//!
//! # Continue a conversation with a specific model
//! chatv2 send --conversation 3f2c... --model deepseek-chat "And lifetimes?"
//!
//! # Verbose logging
//! RUST_LOG=debug chatv2 conversations
//! ```
//!
//! # Configuration
//!
//! Settings come from `~/.config/chatv2/client.toml`, then `CHATV2_*`
//! environment variables, then the flags below.
//!
//! # Signals
//!
//! - `SIGINT` while a reply streams: cancel the reply

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use chatv2_core::{
    config::{self, ConfigOverrides},
    ChatApi, ChatEvent, ChatSession, ClientConfig, ExchangeState, HttpChatApi, StreamingTransport,
};

/// chatv2 - terminal client for the chatv2 streaming chat service
#[derive(Parser, Debug)]
#[command(name = "chatv2")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "CHATV2_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat service address
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Auth token (sent verbatim in the auth header)
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Seconds of server silence before a reply is abandoned
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available models
    Models,

    /// List conversations, most recent first
    Conversations,

    /// Start a new conversation and print its id
    New,

    /// Print a conversation's messages
    Show {
        /// Conversation id
        conversation_id: String,
    },

    /// Rename a conversation
    Rename {
        /// Conversation id
        conversation_id: String,
        /// New title
        title: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id
        conversation_id: String,
    },

    /// Send a message and stream the reply
    Send {
        /// Conversation to continue (a new one is started otherwise)
        #[arg(short = 'C', long, value_name = "ID")]
        conversation: Option<String>,

        /// Model to use (server default otherwise)
        #[arg(short = 'm', long, value_name = "MODEL")]
        model: Option<String>,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Show token quotas
    Quota {
        /// Only this model
        #[arg(short = 'm', long, value_name = "MODEL")]
        model: Option<String>,

        /// Check whether this many tokens may be spent (requires --model)
        #[arg(long, value_name = "TOKENS", requires = "model")]
        check: Option<u32>,
    },
}

fn load_settings(args: &Args) -> Result<ClientConfig> {
    let path = args.config.clone().or_else(config::default_config_path);
    let mut settings = config::load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.base_url {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(ref token) = args.token {
        overrides = overrides.with_token(token.clone());
    }
    if let Some(secs) = args.idle_timeout {
        overrides = overrides.with_idle_timeout_secs(secs);
    }
    overrides.apply(&mut settings).context("Invalid command-line option")?;

    debug!(
        base_url = %settings.base_url,
        source = %settings.source(),
        "Configuration loaded"
    );
    Ok(settings)
}

fn build_session(settings: &ClientConfig) -> Result<ChatSession<HttpChatApi>> {
    let http = settings
        .http_client()
        .context("Failed to create HTTP client")?;
    let api = HttpChatApi::from_config(settings, http.clone())?;
    let transport = StreamingTransport::from_config(settings, http)?;
    Ok(ChatSession::new(api, transport).with_fallback_model(settings.default_model.clone()))
}

fn format_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn list_models(session: &ChatSession<HttpChatApi>) -> Result<()> {
    session.refresh_models().await?;
    let store = session.store().lock();
    let selected = store.selected_model_id().unwrap_or_default();
    for model in store.models() {
        let marker = if model.id == selected { '*' } else { ' ' };
        let state = if model.enabled { "" } else { " (disabled)" };
        println!("{marker} {:<24} {}{state}", model.id, model.name);
    }
    Ok(())
}

async fn list_conversations(session: &ChatSession<HttpChatApi>) -> Result<()> {
    session.refresh_conversations().await?;
    let store = session.store().lock();
    if store.conversations().is_empty() {
        println!("No conversations yet");
    }
    for conversation in store.conversations() {
        println!(
            "{}  {}  {}",
            conversation.conversation_id,
            format_time(conversation.update_time),
            if conversation.title.is_empty() { "(untitled)" } else { conversation.title.as_str() }
        );
    }
    Ok(())
}

async fn show_conversation(session: &ChatSession<HttpChatApi>, conversation_id: &str) -> Result<()> {
    session.select_conversation(conversation_id).await?;
    let store = session.store().lock();
    for message in store.messages() {
        println!("[{}] {}\n{}\n", message.role, format_time(message.timestamp), message.content);
    }
    Ok(())
}

async fn show_quota(
    session: &ChatSession<HttpChatApi>,
    model: Option<String>,
    check: Option<u32>,
) -> Result<()> {
    let api = session.api();
    match (model, check) {
        (Some(model), Some(tokens)) => {
            let allowed = api.check_quota(&model, Some(tokens)).await?;
            println!("{model}: {}", if allowed { "allowed" } else { "over quota" });
        }
        (Some(model), None) => print_quota(&api.my_quota(&model).await?),
        (None, _) => {
            for quota in api.my_quotas().await? {
                print_quota(&quota);
            }
        }
    }
    Ok(())
}

fn print_quota(quota: &chatv2_core::ModelQuota) {
    println!(
        "{:<24} used {:>8} / {:<8} remaining {:>8}{}",
        quota.model_id,
        quota.used_quota,
        quota.total_quota,
        quota.remaining_quota,
        if quota.is_exhausted() { "  EXHAUSTED" } else { "" }
    );
}

async fn send(
    session: ChatSession<HttpChatApi>,
    conversation: Option<String>,
    model: Option<String>,
    message: &str,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = session.with_events(tx);

    if let Some(ref id) = conversation {
        session.select_conversation(id).await?;
    }
    match model {
        Some(model) => session.select_model(model),
        None => session.refresh_models().await?,
    }

    let handle = session.send_message(message).await?;
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ChatEvent::Token { delta, .. }) => {
                    stdout.write_all(delta.as_bytes()).await?;
                    stdout.flush().await?;
                }
                Some(ChatEvent::StreamEnd { .. }) | None => {
                    stdout.write_all(b"\n").await?;
                    break;
                }
                Some(ChatEvent::StreamError(e)) => {
                    stdout.write_all(b"\n").await?;
                    anyhow::bail!("Reply failed: {e}");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, cancelling reply");
                handle.cancel();
            }
        }
    }

    if let ExchangeState::Failed(reason) = handle.wait().await {
        anyhow::bail!("Reply failed: {reason}");
    }
    if let Some(id) = session.store().lock().current_conversation_id() {
        eprintln!("conversation: {}", id.to_wire());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatv2=info".parse()?)
                .add_directive("chatv2_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    let session = build_session(&settings)?;

    match args.command {
        Command::Models => list_models(&session).await,
        Command::Conversations => list_conversations(&session).await,
        Command::New => {
            let id = session.new_conversation().await?;
            println!("{id}");
            Ok(())
        }
        Command::Show { conversation_id } => show_conversation(&session, &conversation_id).await,
        Command::Rename {
            conversation_id,
            title,
        } => {
            session.rename_conversation(&conversation_id, &title).await?;
            println!("Renamed {conversation_id}");
            Ok(())
        }
        Command::Delete { conversation_id } => {
            session.delete_conversation(&conversation_id).await?;
            println!("Deleted {conversation_id}");
            Ok(())
        }
        Command::Send {
            conversation,
            model,
            message,
        } => send(session, conversation, model, &message.join(" ")).await,
        Command::Quota { model, check } => show_quota(&session, model, check).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let args = Args::parse_from(["chatv2", "send", "-m", "qwen", "hello", "world"]);
        match args.command {
            Command::Send { model, message, conversation } => {
                assert_eq!(model.as_deref(), Some("qwen"));
                assert_eq!(message, vec!["hello", "world"]);
                assert!(conversation.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quota_check_requires_model() {
        assert!(Args::try_parse_from(["chatv2", "quota", "--check", "100"]).is_err());
        assert!(Args::try_parse_from(["chatv2", "quota", "-m", "qwen", "--check", "100"]).is_ok());
    }

    #[test]
    fn test_args_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
