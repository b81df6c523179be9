use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use parley_daemon::config::Config;
use parley_daemon::server::{self, Server};
use parley_protocol::{
    methods, Conversation, JsonRpcRequest, JsonRpcResponse, Message, Node, ProviderType,
    PruneResponse, RequestId, SendResponse, Sender, TriggerRules,
};
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "parley", about = "Character chat over resilient multi-provider LLM fallback")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Parley daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
    /// Send a message and print the reply
    Send {
        text: String,
        /// Continue an existing chat instead of starting a new one
        #[arg(long)]
        chat: Option<String>,
    },
    /// List conversations, most recent first
    Chats,
    /// Print a conversation
    History {
        chat_id: String,
        /// Show stored text without output filters
        #[arg(long)]
        raw: bool,
    },
    /// Delete the N least recently used conversations
    Prune { count: usize },
    /// Replace the system prompt of one chat
    Prompt { chat_id: String, system_prompt: String },
    /// Inspect or edit the fallback chain
    Fallback {
        #[command(subcommand)]
        action: FallbackAction,
    },
}

#[derive(Subcommand)]
enum FallbackAction {
    /// Show the chain in execution order
    List,
    /// Append a node to the chain
    Add(FallbackArgs),
    /// Swap a node with its neighbour (-1 up, 1 down)
    Move {
        index: usize,
        #[arg(allow_negative_numbers = true)]
        direction: i32,
    },
    /// Remove a node
    Remove { index: usize },
}

#[derive(Args)]
struct FallbackArgs {
    name: String,
    /// Wire format: openai, google or cohere
    #[arg(long = "type", default_value = "openai")]
    provider_type: ProviderType,
    #[arg(long, default_value = "")]
    url: String,
    #[arg(long, default_value = "")]
    model: String,
    #[arg(long, default_value = "")]
    key: String,
    /// Status codes that move on to the next node, e.g. "429,500,503"
    #[arg(long, default_value = "")]
    codes: String,
    /// Per-attempt deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl FallbackArgs {
    fn into_node(self) -> Node {
        Node {
            name: self.name,
            provider_type: self.provider_type,
            base_url: self.url,
            model: self.model,
            api_key: self.key,
            triggers: TriggerRules {
                status_codes: TriggerRules::parse_codes(&self.codes),
                timeout_ms: self.timeout_ms,
            },
            ..Node::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { foreground } => cmd_start(foreground, cli.config).await,
        Commands::Stop => cmd_stop(cli.config.as_deref()).await,
        Commands::Status => cmd_status(cli.config.as_deref()).await,
        Commands::Send { text, chat } => cmd_send(cli.config.as_deref(), &text, chat).await,
        Commands::Chats => cmd_chats(cli.config.as_deref()).await,
        Commands::History { chat_id, raw } => {
            cmd_history(cli.config.as_deref(), &chat_id, !raw).await
        }
        Commands::Prune { count } => cmd_prune(cli.config.as_deref(), count).await,
        Commands::Prompt {
            chat_id,
            system_prompt,
        } => cmd_prompt(cli.config.as_deref(), &chat_id, &system_prompt).await,
        Commands::Fallback { action } => cmd_fallback(cli.config.as_deref(), action).await,
    }
}

fn load_config(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from(Path::new(path)),
        None => Config::load(),
    }
}

async fn cmd_start(foreground: bool, config_path: Option<String>) -> Result<()> {
    if is_daemon_running() {
        println!("Parley daemon is already running.");
        return Ok(());
    }

    let config = load_config(config_path.as_deref())?;

    if foreground {
        server::init_tracing(&config.daemon.log_level);
        println!("Starting Parley daemon (foreground)...");
        let server = Server::new(config)?;
        server.run().await?;
    } else {
        let exe = std::env::current_exe()?;
        let mut args = vec!["start".to_string(), "--foreground".to_string()];
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path);
        }

        let child = std::process::Command::new(exe)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("Failed to spawn daemon process")?;

        println!("Parley daemon started (PID: {})", child.id());
    }

    Ok(())
}

async fn cmd_stop(config_path: Option<&str>) -> Result<()> {
    if !is_daemon_running() {
        println!("Parley daemon is not running.");
        return Ok(());
    }

    let config = load_config(config_path).unwrap_or_default();
    match send_request(&config.daemon.socket_path, methods::SHUTDOWN, None).await {
        Ok(_) => println!("Parley daemon stopped."),
        Err(_) => {
            // Fallback: kill via PID
            if let Ok(pid_str) = std::fs::read_to_string(Config::pid_path()) {
                if let Ok(pid) = pid_str.trim().parse::<i32>() {
                    unsafe {
                        libc::kill(pid, libc::SIGTERM);
                    }
                    let _ = std::fs::remove_file(Config::pid_path());
                    println!("Parley daemon stopped (via signal).");
                }
            }
        }
    }

    Ok(())
}

async fn cmd_status(config_path: Option<&str>) -> Result<()> {
    if !is_daemon_running() {
        println!("Parley daemon is not running.");
        return Ok(());
    }

    let config = load_config(config_path).unwrap_or_default();
    match call(&config, methods::STATUS, None).await {
        Ok(result) => {
            println!("Parley daemon status:");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Err(e) => println!("Failed to get status: {e}"),
    }

    Ok(())
}

async fn cmd_send(config_path: Option<&str>, text: &str, chat: Option<String>) -> Result<()> {
    let config = require_daemon(config_path)?;
    let params = json!({ "chat_id": chat, "text": text });
    let result = call(&config, methods::CHAT_SEND, Some(params)).await?;
    let response: SendResponse = serde_json::from_value(result)?;

    println!("{}", response.message.content);
    if let Some(url) = &response.triggers.background {
        println!("[background: {url}]");
    }
    for action in &response.triggers.actions {
        println!("[action: {action}]");
    }
    eprintln!("chat {} ({} ms)", response.chat_id, response.latency_ms);
    Ok(())
}

async fn cmd_chats(config_path: Option<&str>) -> Result<()> {
    let config = require_daemon(config_path)?;
    let result = call(&config, methods::CONVERSATION_LIST, None).await?;
    let conversations: Vec<Conversation> = serde_json::from_value(result)?;

    if conversations.is_empty() {
        println!("No conversations.");
    }
    for conversation in conversations {
        println!("{}  {}", conversation.id, conversation.name);
    }
    Ok(())
}

async fn cmd_history(config_path: Option<&str>, chat_id: &str, display: bool) -> Result<()> {
    let config = require_daemon(config_path)?;
    let params = json!({ "chat_id": chat_id, "display": display });
    let result = call(&config, methods::CHAT_HISTORY, Some(params)).await?;
    let messages: Vec<Message> = serde_json::from_value(result)?;

    for message in messages {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Ai => "ai",
        };
        println!("[{who}] {}", message.content);
    }
    Ok(())
}

async fn cmd_prune(config_path: Option<&str>, count: usize) -> Result<()> {
    if count == 0 {
        bail!("Please enter a positive number of chats to delete.");
    }
    let config = require_daemon(config_path)?;
    let result = call(&config, methods::CONVERSATION_PRUNE, Some(json!({ "count": count }))).await?;
    let pruned: PruneResponse = serde_json::from_value(result)?;
    println!("Deleted {} chat(s).", pruned.deleted.len());
    Ok(())
}

async fn cmd_prompt(config_path: Option<&str>, chat_id: &str, system_prompt: &str) -> Result<()> {
    let config = require_daemon(config_path)?;
    let params = json!({ "chat_id": chat_id, "system_prompt": system_prompt });
    let result = call(&config, methods::CONVERSATION_SYSTEM_PROMPT, Some(params)).await?;
    let conversation: Conversation = serde_json::from_value(result)?;
    println!("Updated system prompt for {}.", conversation.name);
    Ok(())
}

async fn cmd_fallback(config_path: Option<&str>, action: FallbackAction) -> Result<()> {
    let config = require_daemon(config_path)?;
    let result = match action {
        FallbackAction::List => {
            let settings = call(&config, methods::SETTINGS_GET, None).await?;
            settings["fallback_chain"].clone()
        }
        FallbackAction::Add(args) => {
            let node = serde_json::to_value(args.into_node())?;
            call(&config, methods::FALLBACK_ADD, Some(node)).await?
        }
        FallbackAction::Move { index, direction } => {
            let params = json!({ "index": index, "direction": direction });
            call(&config, methods::FALLBACK_MOVE, Some(params)).await?
        }
        FallbackAction::Remove { index } => {
            call(&config, methods::FALLBACK_REMOVE, Some(json!({ "index": index }))).await?
        }
    };

    let chain: Vec<Node> = serde_json::from_value(result)?;
    if chain.is_empty() {
        println!("Fallback chain is empty.");
    }
    for (index, node) in chain.iter().enumerate() {
        let codes: Vec<String> = node.triggers.status_codes.iter().map(u16::to_string).collect();
        println!(
            "{index}  {} ({})  codes [{}]  {} ms",
            node.name,
            node.provider_type,
            codes.join(","),
            node.triggers.timeout().as_millis()
        );
    }
    Ok(())
}

fn require_daemon(config_path: Option<&str>) -> Result<Config> {
    if !is_daemon_running() {
        bail!("Parley daemon is not running. Start it with `parley start`.");
    }
    load_config(config_path)
}

/// Send a request and unwrap the JSON-RPC result or error.
async fn call(config: &Config, method: &str, params: Option<Value>) -> Result<Value> {
    let response = send_request(&config.daemon.socket_path, method, params).await?;
    if let Some(error) = response.error {
        bail!("{} (code {})", error.message, error.code);
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Send a JSON-RPC request to the daemon and return the response.
async fn send_request(
    socket_path: &str,
    method: &str,
    params: Option<Value>,
) -> Result<JsonRpcResponse> {
    tracing::debug!(socket = %socket_path, method, "Sending request");
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to {socket_path}"))?;
    let (reader, mut writer) = stream.into_split();

    let request = JsonRpcRequest::new(method, params, RequestId::Number(1));
    let json = serde_json::to_string(&request)?;

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response: JsonRpcResponse = serde_json::from_str(&line)?;
    Ok(response)
}

fn is_daemon_running() -> bool {
    let pid_path = Config::pid_path();
    if !pid_path.exists() {
        return false;
    }

    if let Ok(pid_str) = std::fs::read_to_string(&pid_path) {
        if let Ok(pid) = pid_str.trim().parse::<i32>() {
            // Check if process is alive
            unsafe { libc::kill(pid, 0) == 0 }
        } else {
            false
        }
    } else {
        false
    }
}
