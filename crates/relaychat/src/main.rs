//! `relaychat serve` runs the gateway, `relaychat chat` talks to it.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use relaychat::core::{
    ChatSession, ChatSessionBuilder, ChatView, ConnectionState,
    NetworkMonitor, NetworkStatus, SubmitError,
};
use relaychat::gateway::GatewayConfig;
use relaychat::{TranscriptPrinter, openai_gateway_state};
use relaychat_openai_model::OpenAIConfigBuilder;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "relaychat", version, about = "Streaming chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the gateway in front of an OpenAI-compatible provider.
    Serve(ServeArgs),
    /// Chats with a running gateway.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "RELAYCHAT_ADDR", default_value = "127.0.0.1:3001")]
    addr: SocketAddr,
    /// API key of the provider.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Base URL of the provider API.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,
    /// Model to ask.
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,
}

#[derive(Debug, Args)]
struct ChatArgs {
    /// URL of the gateway.
    #[arg(long, default_value = "http://localhost:3001")]
    server: String,
    /// How often to check that the gateway is reachable.
    #[arg(long, default_value_t = 1000)]
    probe_interval_ms: u64,
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Chat(args) => chat(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = OpenAIConfigBuilder::with_api_key(args.api_key);
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    let state = openai_gateway_state(config.build());

    relaychat::gateway::serve(GatewayConfig { addr: args.addr }, state)
        .await
        .with_context(|| format!("failed to serve on {}", args.addr))
}

async fn chat(args: ChatArgs) -> anyhow::Result<()> {
    let url = reqwest::Url::parse(&args.server)
        .with_context(|| format!("invalid server URL: {}", args.server))?;
    let host = url.host_str().context("server URL has no host")?;
    let port = url
        .port_or_known_default()
        .context("server URL has no port")?;
    let (network, _probe) = NetworkMonitor::probe(
        format!("{host}:{port}"),
        Duration::from_millis(args.probe_interval_ms),
    );

    let session = ChatSessionBuilder::with_server_url(&args.server)
        .with_network_monitor(network)
        .build();
    let mut view_rx = session.subscribe();
    let mut screen = Screen::new()?;
    let lines = read_lines();

    let result = chat_loop(&session, &mut view_rx, &mut screen, lines).await;
    screen.clear_spinner();
    session.close();
    result
}

async fn chat_loop(
    session: &ChatSession,
    view_rx: &mut tokio::sync::watch::Receiver<ChatView>,
    screen: &mut Screen,
    mut lines: mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<()> {
    screen.update(&view_rx.borrow_and_update().clone());
    loop {
        select! {
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = view_rx.borrow_and_update().clone();
                screen.update(&view);
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                let line = line.trim_end_matches(['\r', '\n']);
                if line.trim() == "/quit" {
                    break;
                }
                match session.submit(line) {
                    Ok(()) => screen.submitted(),
                    Err(SubmitError::MissingInput) => screen.prompt(),
                    Err(err @ SubmitError::SessionClosed) => {
                        return Err(err.into());
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                let view = session.view();
                if view.connection.is_active() || view.is_typing() {
                    session.cancel();
                } else {
                    println!();
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Reads stdin lines on a separate task, so that reading never blocks
/// rendering.
fn read_lines() -> mpsc::UnboundedReceiver<String> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut stdin = io::BufReader::new(io::stdin());
        loop {
            let mut line = String::new();
            match stdin.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!("error reading input: {}", err);
                    break;
                }
            }
        }
    });
    line_rx
}

struct Screen {
    printer: TranscriptPrinter,
    progress_style: ProgressStyle,
    progress_bar: Option<ProgressBar>,
    network: NetworkStatus,
    awaiting_input: bool,
}

impl Screen {
    fn new() -> anyhow::Result<Self> {
        let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Ok(Self {
            printer: TranscriptPrinter::default(),
            progress_style,
            progress_bar: None,
            network: NetworkStatus::Online,
            awaiting_input: false,
        })
    }

    fn update(&mut self, view: &ChatView) {
        let out = self.printer.render(view);
        if !out.is_empty() {
            // Finish the progress bar before printing anything else.
            self.clear_spinner();
            print!("{out}");
        }

        if view.network != self.network {
            self.clear_spinner();
            self.network = view.network;
            let bar = BAR_CHAR.bright_yellow();
            match view.network {
                NetworkStatus::Offline => {
                    println!("{bar}{}", "You are offline".bright_yellow());
                }
                NetworkStatus::Online => println!("{bar}Back online"),
            }
        }

        match (view.connection, view.status_text()) {
            (
                ConnectionState::Connecting | ConnectionState::Retrying,
                Some(status),
            ) => {
                let style = &self.progress_style;
                self.progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(style.clone());
                        progress_bar
                            .enable_steady_tick(Duration::from_millis(100));
                        progress_bar
                    })
                    .set_message(status);
            }
            _ => self.clear_spinner(),
        }

        if !self.awaiting_input && view.accepts_input() && !view.is_typing() {
            if view.transcript.assistant_tail().is_some() {
                println!();
            }
            self.prompt();
        }
        std::io::stdout().flush().ok();
    }

    fn submitted(&mut self) {
        self.awaiting_input = false;
    }

    fn prompt(&mut self) {
        self.awaiting_input = true;
        print!("> ");
        std::io::stdout().flush().ok();
    }

    fn clear_spinner(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}
