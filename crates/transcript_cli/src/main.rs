use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chat_api::{Attachment, ChatApiClient, ChatApiConfig, ChatRequest};
use clap::{Parser, Subcommand};
use tool_transcript::DecoderState;
use tracing::{info, warn};
use transcript_cli::{commands, logging, LogConfig, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "chat-transcript")]
#[command(about = "Rebuild chat transcripts with inline tool-call blocks")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Chat service origin. Falls back to CHAT_API_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds. Falls back to CHAT_API_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Debug logging for every crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON file of persisted message rows
    Replay { file: PathBuf },
    /// Decode a captured response stream
    Decode {
        file: PathBuf,
        /// User message the stream answers
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// Load a chat from the service and replay it
    Load { chat_id: String },
    /// Send a message and stream the answer
    Send {
        message: String,
        /// Continue an existing chat
        #[arg(long)]
        chat_id: Option<String>,
        /// Attach a file (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Regenerate the reply at a message
    Retry {
        #[arg(long)]
        chat_id: String,
        #[arg(long)]
        message_id: String,
    },
    /// Replace a user message and regenerate from it
    Edit {
        #[arg(long)]
        chat_id: String,
        #[arg(long)]
        message_id: String,
        content: String,
    },
    /// Stop generation for a chat
    Abort { chat_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&LogConfig::from_env().verbose(cli.verbose));

    let output = match &cli.command {
        Command::Replay { file } => commands::render(&commands::replay_file(file)?, cli.format)?,
        Command::Decode { file, prompt } => {
            let (state, conversation) = commands::decode_file(file, prompt)?;
            if state != DecoderState::Completed {
                warn!(state = state.as_str(), "stream did not complete");
            }
            commands::render(&conversation, cli.format)?
        }
        Command::Load { chat_id } => {
            let client = build_client(&cli)?;
            let mut session = tool_transcript::TranscriptSession::new();
            let loaded = client
                .load_transcript(chat_id, &mut session, None)
                .await
                .with_context(|| format!("failed to load chat {chat_id}"))?;
            if let Some(title) = loaded.chat.title.as_deref() {
                info!(%chat_id, %title, "chat loaded");
            }
            commands::render(&loaded.conversation, cli.format)?
        }
        Command::Send {
            message,
            chat_id,
            files,
        } => {
            let mut request = ChatRequest::send(chat_id.clone(), message.clone());
            for path in files {
                let attachment = Attachment::from_path(path)
                    .with_context(|| format!("failed to attach {}", path.display()))?;
                request = request.with_attachment(attachment);
            }
            run_stream(&cli, &request).await?
        }
        Command::Retry {
            chat_id,
            message_id,
        } => run_stream(&cli, &ChatRequest::retry(chat_id.clone(), message_id.clone())).await?,
        Command::Edit {
            chat_id,
            message_id,
            content,
        } => {
            let request = ChatRequest::edit(chat_id.clone(), message_id.clone(), content.clone());
            run_stream(&cli, &request).await?
        }
        Command::Abort { chat_id } => {
            build_client(&cli)?.abort(chat_id).await?;
            format!("aborted {chat_id}\n")
        }
    };

    print!("{output}");
    Ok(())
}

fn build_client(cli: &Cli) -> Result<ChatApiClient> {
    let mut config = ChatApiConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    ChatApiClient::new(config).context("failed to build chat client")
}

/// Stream one request; Ctrl-C cancels locally and asks the service to stop.
async fn run_stream(cli: &Cli, request: &ChatRequest) -> Result<String> {
    let client = build_client(cli)?;
    let cancellation = Arc::new(AtomicBool::new(false));
    let interrupt = tokio::spawn({
        let cancellation = Arc::clone(&cancellation);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.store(true, Ordering::Release);
            }
        }
    });

    let outcome = commands::stream_request(&client, request, &cancellation).await;
    interrupt.abort();
    let outcome = outcome?;

    if outcome.state == DecoderState::Aborted {
        match outcome.chat_id.as_deref() {
            Some(chat_id) => client.abort(chat_id).await?,
            None => warn!("stream cancelled before a chat id was assigned"),
        }
    }
    if outcome.state == DecoderState::Errored {
        let rendered = commands::render(&outcome.conversation, cli.format)?;
        print!("{rendered}");
        bail!("chat stream reported an error");
    }
    commands::render(&outcome.conversation, cli.format)
}
