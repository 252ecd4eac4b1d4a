//! dashstream - Streaming Session Driver
//!
//! Drives the two session shapes of `dashstream-core` against caller-given
//! endpoints. Request bodies are passed through as raw JSON; the binary only
//! wires configuration, logging and signal handling.
//!
//! # Usage
//!
//! ```bash
//! # Stream a chat completion, printing chunks as they arrive
//! dashstream chat --url https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation \
//!     --body @request.json
//!
//! # Real-time recognition over a duplex WebSocket
//! dashstream recognize --url wss://dashscope.aliyuncs.com/api-ws/v1/inference \
//!     --start @run-task.json --finish @finish-task.json --audio speech.pcm
//!
//! # Verbose logging
//! RUST_LOG=debug dashstream chat --url ... --body '{"model": "qwen-turbo", ...}'
//! ```
//!
//! Streamed content goes to stdout; logs go to stderr.
//!
//! # Signals
//!
//! - `SIGINT` (Ctrl+C): cancels a recognition session, then closes it

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use dashstream_core::{
    connect_recognition, default_config_path, generate_task_id, handle_recognition_results,
    load_config_from_path, upload_audio, CancelSignal, ChatClient, ChatResponse, Frame,
    MessageContent, MultiModalContent, TextContent,
};

/// Placeholder replaced with a fresh task id in recognition envelopes
const TASK_ID_PLACEHOLDER: &str = "{task_id}";

/// dashstream - streaming chat and real-time recognition sessions
#[derive(Parser, Debug)]
#[command(name = "dashstream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, global = true, env = "DASHSTREAM_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// API token
    #[arg(long, global = true, env = "DASHSCOPE_API_KEY", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, env = "DASHSTREAM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a chat completion over HTTP/SSE
    Chat {
        /// Endpoint URL
        #[arg(long)]
        url: String,

        /// Request body: inline JSON or @file
        #[arg(long)]
        body: String,

        /// Decode content as a list of multimodal parts
        #[arg(long)]
        multimodal: bool,
    },

    /// Run a real-time recognition session over a duplex WebSocket
    Recognize {
        /// WebSocket URL
        #[arg(long)]
        url: String,

        /// Start envelope: inline JSON or @file ({task_id} is substituted)
        #[arg(long)]
        start: String,

        /// Envelope sent after the audio: inline JSON or @file ({task_id} is substituted)
        #[arg(long)]
        finish: Option<String>,

        /// Audio file streamed as binary frames
        #[arg(long, value_name = "FILE")]
        audio: PathBuf,

        /// Bytes per binary frame
        #[arg(long, default_value_t = 3200)]
        chunk_size: usize,

        /// Pause between binary frames in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },

    /// Print a new task identifier
    TaskId,
}

/// Initialize logging with the specified level, on stderr
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("dashstream={level},dashstream_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Read an argument that is either inline JSON or `@path`
async fn read_json_arg(arg: &str, task_id: Option<&str>) -> Result<serde_json::Value> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path}"))?,
        None => arg.to_string(),
    };
    let raw = match task_id {
        Some(task_id) => raw.replace(TASK_ID_PLACEHOLDER, task_id),
        None => raw,
    };
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {arg}"))
}

fn require_token(token: Option<String>) -> Result<String> {
    token.context("No API token: pass --token or set DASHSCOPE_API_KEY")
}

/// Write a chunk to stdout as soon as it arrives
fn print_chunk(chunk: &[u8]) -> Result<()> {
    let mut out = std::io::stdout();
    out.write_all(chunk)?;
    out.flush()?;
    Ok(())
}

fn report<C: MessageContent>(response: &ChatResponse<C>) {
    info!(
        request_id = %response.request_id,
        finish_reason = response.finish_reason().unwrap_or("unknown"),
        chars = response.text().chars().count(),
        "Chat completed"
    );
}

async fn run_chat(
    client: ChatClient,
    url: &str,
    body: &serde_json::Value,
    multimodal: bool,
) -> Result<()> {
    let mut print = |chunk: &[u8]| print_chunk(chunk);

    if multimodal {
        let response = client
            .stream::<MultiModalContent, _, _>(url, body, &mut print)
            .await?;
        println!();
        report(&response);
    } else {
        let response = client
            .stream::<TextContent, _, _>(url, body, &mut print)
            .await?;
        println!();
        report(&response);
    }
    Ok(())
}

struct RecognizeArgs {
    url: String,
    start: String,
    finish: Option<String>,
    audio: PathBuf,
    chunk_size: usize,
    interval: Duration,
}

async fn run_recognize(
    args: RecognizeArgs,
    token: &str,
    transport_config: dashstream_core::TransportConfig,
) -> Result<()> {
    let task_id = generate_task_id();
    let start = read_json_arg(&args.start, Some(&task_id)).await?;
    let finish = match args.finish {
        Some(ref finish) => Some(Frame::json(&read_json_arg(finish, Some(&task_id)).await?)?),
        None => None,
    };
    let audio = tokio::fs::File::open(&args.audio)
        .await
        .with_context(|| format!("Failed to open audio file {}", args.audio.display()))?;

    info!(task_id = %task_id, url = %args.url, "Starting recognition");
    let mut transport = connect_recognition(&args.url, token, &start, transport_config)
        .await
        .context("Failed to start recognition session")?;
    let (inbound, errors) = transport.results()?;

    let cancel = CancelSignal::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel("interrupted by user");
        }
    });

    let sender = transport.sender();
    let (chunk_size, interval) = (args.chunk_size, args.interval);
    let upload = tokio::spawn(async move {
        let sent = upload_audio(&sender, audio, chunk_size, interval).await?;
        if let Some(frame) = finish {
            sender.send(frame).await?;
        }
        Ok::<u64, dashstream_core::Error>(sent)
    });

    let mut print = |chunk: &[u8]| -> Result<()> {
        print_chunk(chunk)?;
        println!();
        Ok(())
    };
    let outcome = handle_recognition_results(inbound, errors, &cancel, &mut print).await;

    if outcome.is_err() {
        upload.abort();
    } else {
        match upload.await {
            Ok(Ok(bytes)) => info!(bytes, "Audio uploaded"),
            Ok(Err(e)) => warn!(error = %e, "Audio upload stopped early"),
            Err(e) => warn!(error = %e, "Upload task failed"),
        }
    }

    transport.close().await.context("Failed to close transport")?;

    match outcome {
        Ok(()) => {
            info!(task_id = %task_id, "Recognition finished");
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            info!(task_id = %task_id, reason = %e, "Recognition cancelled");
            Ok(())
        }
        Err(e) => {
            let stage = e.stage();
            Err(e).with_context(|| format!("Recognition failed at {stage} stage"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.or_else(default_config_path);
    let config = load_config_from_path(config_path).context("Failed to load configuration")?;
    info!(source = %config.source(), "Configuration loaded");

    match args.command {
        Command::Chat {
            url,
            body,
            multimodal,
        } => {
            let token = require_token(args.token)?;
            let body = read_json_arg(&body, None).await?;
            let client = ChatClient::new(token, config.pipeline)?;
            run_chat(client, &url, &body, multimodal).await
        }
        Command::Recognize {
            url,
            start,
            finish,
            audio,
            chunk_size,
            interval_ms,
        } => {
            let token = require_token(args.token)?;
            let recognize = RecognizeArgs {
                url,
                start,
                finish,
                audio,
                chunk_size,
                interval: Duration::from_millis(interval_ms),
            };
            run_recognize(recognize, &token, config.transport).await
        }
        Command::TaskId => {
            println!("{}", generate_task_id());
            Ok(())
        }
    }
}
