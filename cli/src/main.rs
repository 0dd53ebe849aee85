use std::io::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use seva_portal::llm::sse::{SseLineDecoder, data_payload};
use seva_portal::services::chat::ChatRequest;
use seva_portal::transcript::{APOLOGY, Exchange, Transcript};
use seva_portal::voice::{MicCommand, VoiceAction, VoiceCoordinator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing access token; pass --access-token or set SEVA_ACCESS_TOKEN")]
    MissingAccessToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("reply stream failed: {0}")]
    StreamFailed(String),
}

#[derive(Parser, Debug)]
#[command(name = "seva-cli", about = "Seva portal admin, pass and chat CLI")]
struct Cli {
    #[arg(long, env = "SEVA_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "SEVA_ACCESS_TOKEN")]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Chat with the assistant, one message per line.
    Chat,
    /// Hands-free conversation: each stdin line is a final speech transcript.
    Live,
    Export(ExportArgs),
    Blocked(BlockedCommand),
    Pass(PassCommand),
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    end: Option<String>,

    #[arg(long, default_value = "json")]
    format: String,

    #[arg(long, help = "Output path; defaults to the server's filename")]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BlockedCommand {
    #[command(subcommand)]
    command: BlockedSubcommand,
}

#[derive(Subcommand, Debug)]
enum BlockedSubcommand {
    List,
    Check,
    Unblock { user_id: Uuid },
}

#[derive(Args, Debug)]
struct PassCommand {
    #[command(subcommand)]
    command: PassSubcommand,
}

#[derive(Subcommand, Debug)]
enum PassSubcommand {
    Show { token: String },
    Attend { token: String },
}

struct CliContext {
    base_url: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl CliContext {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, self.url(path));
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, CliError> {
        if self.access_token.is_none() {
            return Err(CliError::MissingAccessToken);
        }
        Ok(self.request(method, path))
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, access_token: cli.access_token, http: reqwest::Client::new() };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Chat => run_chat(&ctx).await,
        Command::Live => run_live(&ctx).await,
        Command::Export(args) => run_export(&ctx, args).await,
        Command::Blocked(blocked) => run_blocked(&ctx, blocked).await,
        Command::Pass(pass) => run_pass(&ctx, pass).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    check(cli.request(Method::GET, "/healthz").send().await?).await?;
    println!("ok");
    Ok(())
}

// =============================================================================
// ADMIN + PASS
// =============================================================================

async fn run_blocked(cli: &CliContext, blocked: BlockedCommand) -> Result<(), CliError> {
    let request = match blocked.command {
        BlockedSubcommand::List => cli.authed(Method::GET, "/api/admin/blocked")?,
        BlockedSubcommand::Check => cli.authed(Method::POST, "/api/admin/blocked/check")?,
        BlockedSubcommand::Unblock { user_id } => {
            cli.authed(Method::POST, &format!("/api/admin/blocked/{user_id}/unblock"))?
        }
    };
    print_json(&json_of(request).await?)
}

async fn run_pass(cli: &CliContext, pass: PassCommand) -> Result<(), CliError> {
    let request = match &pass.command {
        PassSubcommand::Show { token } => cli.request(Method::GET, "/api/pass").query(&[("t", token)]),
        PassSubcommand::Attend { token } => cli.authed(Method::POST, "/api/pass/attend")?.query(&[("t", token)]),
    };
    print_json(&json_of(request).await?)
}

async fn run_export(cli: &CliContext, args: ExportArgs) -> Result<(), CliError> {
    let mut query = vec![("format", args.format.clone())];
    query.extend(args.start.clone().map(|start| ("start", start)));
    query.extend(args.end.clone().map(|end| ("end", end)));

    let response = check(cli.authed(Method::GET, "/api/admin/export")?.query(&query).send().await?).await?;
    let server_name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(attachment_filename)
        .map(PathBuf::from);
    let bytes = response.bytes().await?;

    let path = args
        .out
        .or(server_name)
        .unwrap_or_else(|| PathBuf::from(format!("admin-export.{}", args.format)));
    std::fs::write(&path, &bytes)?;
    eprintln!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// `name` from `attachment; filename="name"`.
fn attachment_filename(disposition: &str) -> Option<&str> {
    let rest = &disposition[disposition.find("filename=\"")? + "filename=\"".len()..];
    rest.find('"').map(|end| &rest[..end]).filter(|name| !name.is_empty())
}

async fn json_of(request: RequestBuilder) -> Result<Value, CliError> {
    let response = check(request.send().await?).await?;
    Ok(response.json::<Value>().await?)
}

/// Pass through a success response; turn anything else into a [`CliError`]
/// carrying the server's `error` message.
async fn check(response: Response) -> Result<Response, CliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    let message = value
        .get("error")
        .and_then(Value::as_str)
        .map_or_else(|| value.to_string(), ToOwned::to_owned);
    Err(CliError::ServerError { status: status.as_u16(), message })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

// =============================================================================
// CHAT
// =============================================================================

/// `text` of each `data:` event among `lines`.
/// Text fragments carried by complete SSE lines. A data line with an
/// `error` field is the server's terminal failure event.
fn chat_texts(lines: &[String]) -> Result<Vec<String>, CliError> {
    let mut texts = Vec::new();
    for event in lines
        .iter()
        .filter_map(|line| data_payload(line))
        .filter_map(|payload| serde_json::from_str::<Value>(payload).ok())
    {
        if let Some(error) = event.get("error") {
            let message = error.as_str().map_or_else(|| error.to_string(), str::to_string);
            return Err(CliError::StreamFailed(message));
        }
        if let Some(text) = event.get("text").and_then(Value::as_str) {
            texts.push(text.to_string());
        }
    }
    Ok(texts)
}

async fn stream_reply(cli: &CliContext, transcript: &mut Transcript, exchange: &Exchange) -> Result<(), CliError> {
    let body = ChatRequest::new(&exchange.message, &exchange.history);
    let response = check(cli.request(Method::POST, "/api/chat").json(&body).send().await?).await?;

    let mut decoder = SseLineDecoder::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        for text in chat_texts(&decoder.push(&chunk?))? {
            transcript.push_fragment(&text);
        }
    }
    for text in chat_texts(&decoder.finish().into_iter().collect::<Vec<_>>())? {
        transcript.push_fragment(&text);
    }
    Ok(())
}

/// Run one exchange to completion. On failure the transcript shows the
/// apology and the error is returned.
async fn stream_exchange(cli: &CliContext, transcript: &mut Transcript, exchange: Exchange) -> Result<String, CliError> {
    match stream_reply(cli, transcript, &exchange).await {
        Ok(()) => Ok(transcript.complete_exchange().unwrap_or_default()),
        Err(e) => {
            transcript.fail_exchange();
            Err(e)
        }
    }
}

async fn run_chat(cli: &CliContext) -> Result<(), CliError> {
    let mut transcript = Transcript::new();
    println!("{}\n", transcript.messages()[0].content);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(exchange) = transcript.begin_exchange(&line) else {
            continue;
        };
        match stream_exchange(cli, &mut transcript, exchange).await {
            Ok(reply) => println!("{reply}\n"),
            Err(e) => {
                eprintln!("chat failed: {e}");
                println!("{APOLOGY}\n");
            }
        }
    }
    Ok(())
}

// =============================================================================
// LIVE VOICE
// =============================================================================

async fn run_live(cli: &CliContext) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut voice = VoiceCoordinator::new();
    let mut transcript = Transcript::new();
    let mut pending = voice.start_live();
    loop {
        while !pending.is_empty() {
            for action in std::mem::take(&mut pending) {
                pending.extend(perform(cli, &mut voice, &mut transcript, action).await);
            }
        }

        let deadline = voice.next_deadline();
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => voice.on_transcript(&line, true, Instant::now()),
                None => break,
            },
            () = sleep_until(deadline) => pending = voice.poll(Instant::now()),
        }
    }

    for action in voice.stop_live() {
        perform(cli, &mut voice, &mut transcript, action).await;
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// Carry out one coordinator action; returns any follow-up actions.
async fn perform(
    cli: &CliContext,
    voice: &mut VoiceCoordinator,
    transcript: &mut Transcript,
    action: VoiceAction,
) -> Vec<VoiceAction> {
    match action {
        VoiceAction::Mic(MicCommand::Start) => {
            eprintln!("[listening]");
            Vec::new()
        }
        VoiceAction::Mic(MicCommand::Stop) => {
            eprintln!("[mic off]");
            Vec::new()
        }
        VoiceAction::Submit(text) => {
            println!("you: {text}");
            let Some(exchange) = transcript.begin_exchange(&text) else {
                voice.on_response_failed(Instant::now());
                return Vec::new();
            };
            match stream_exchange(cli, transcript, exchange).await {
                Ok(reply) => voice.on_response_complete(&reply, Instant::now()),
                Err(e) => {
                    eprintln!("chat failed: {e}");
                    voice.on_response_failed(Instant::now());
                    Vec::new()
                }
            }
        }
        VoiceAction::Speak(text) => {
            println!("assistant: {text}");
            voice.on_speech_end(Instant::now());
            Vec::new()
        }
        VoiceAction::CancelSpeech => Vec::new(),
    }
}
