// ABOUTME: Main entry point for the Elisa chat client
// Composition root: wires config, storage, session runtime and quiz store, then runs a line-based chat

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use elisa_chat::config::ClientConfig;
use elisa_chat::i18n::{Language, Localizer};
use elisa_chat::models::{ChatMessage, MessageKind, MessageRole};
use elisa_chat::quiz::QuizStore;
use elisa_chat::session::{
    ChatStore, FileStorage, KeyValueStorage, MemoryStorage, MessagePersistence, SessionHandle,
    SessionRuntime,
};
use elisa_chat::transport::{ConnectionStatus, TransportDiscovery, WebSocketConnector};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "elisa-chat", version, about = "Chat with the Elisa learning assistant")]
struct Args {
    /// Config file (defaults to ~/.elisa-chat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Origin serving the websocket discovery endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// UI language (en, de)
    #[arg(long)]
    language: Option<Language>,

    /// Directory for the persisted chat history
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Keep the chat history in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Clear the chat history before connecting
    #[arg(long)]
    reset: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose)?;

    let config = load_config(&args);
    let localizer = Localizer::new(config.language);

    let storage: Box<dyn KeyValueStorage> = if args.ephemeral {
        Box::new(MemoryStorage::new())
    } else if let Some(dir) = &config.storage_dir {
        Box::new(FileStorage::with_dir(dir).context("Failed to open storage directory")?)
    } else {
        Box::new(FileStorage::new().context("Failed to open storage directory")?)
    };

    let mut store = ChatStore::new(
        MessagePersistence::new(storage),
        localizer.clone(),
        config.store_settings(),
    );

    let quiz = Arc::new(QuizStore::new(localizer));
    store.set_quiz_sink(quiz.clone());

    let discovery = TransportDiscovery::new(&config.base_url, &config.discovery_path);
    let connector = Arc::new(WebSocketConnector::new(discovery));

    let (runtime, session) = SessionRuntime::new(store, connector);
    let runtime = runtime.with_auto_connect(config.auto_connect && !args.reset);
    quiz.set_chat(session.clone());

    if args.reset {
        session.reset_history();
        if config.auto_connect {
            session.connect(false);
        }
    }

    let runtime_task = tokio::spawn(runtime.run());
    let printer_task = tokio::spawn(print_session(
        session.subscribe_messages(),
        session.subscribe_status(),
    ));

    let result = run_repl(&session, &quiz).await;

    session.shutdown();
    let _ = runtime_task.await;
    printer_task.abort();

    result
}

fn load_config(args: &Args) -> ClientConfig {
    let path = args.config.clone().or_else(ClientConfig::default_path);
    let mut config = path.map(|p| ClientConfig::load(&p)).unwrap_or_default();

    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(language) = args.language {
        config.language = language;
    }
    if let Some(storage_dir) = &args.storage_dir {
        config.storage_dir = Some(storage_dir.clone());
    }

    config
}

async fn run_repl(session: &SessionHandle, quiz: &QuizStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        match line {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => session.reset_history(),
            "/reconnect" => session.connect(false),
            "/status" => println!("{}", format!("status: {}", session.status()).dark_grey()),
            "/quiz" => match quiz.current() {
                Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
                None => println!("{}", "no quiz yet".dark_grey()),
            },
            _ => {
                if let Some(tag) = line.strip_prefix("/lang ") {
                    match tag.parse::<Language>() {
                        Ok(language) => session.set_language(language),
                        Err(e) => println!("{}", e.red()),
                    }
                } else if let Some(answers) = line.strip_prefix("/answers ") {
                    if let Err(e) = quiz.request_feedback(answers) {
                        println!("{}", e.to_string().red());
                    }
                } else {
                    session.send_chat_message(line, false);
                }
            }
        }
    }

    Ok(())
}

async fn print_session(
    mut messages: watch::Receiver<Vec<ChatMessage>>,
    mut status: watch::Receiver<ConnectionStatus>,
) {
    let mut printer = Printer::default();

    loop {
        let snapshot = messages.borrow_and_update().clone();
        if let Err(e) = printer.render(&snapshot) {
            tracing::error!("Failed to print chat messages: {}", e);
        }

        tokio::select! {
            changed = messages.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                printer.print_status(current);
            }
        }
    }
}

/// Prints log changes line by line. Streamed agent replies that only grow are
/// printed as suffixes of the current line.
#[derive(Default)]
struct Printer {
    rendered: Vec<(String, String)>,
    line_open: bool,
}

impl Printer {
    fn render(&mut self, messages: &[ChatMessage]) -> io::Result<()> {
        let mut out = io::stdout().lock();

        if messages.len() < self.rendered.len() {
            self.close_line(&mut out)?;
            writeln!(out, "{}", "-- history cleared --".dark_grey())?;
            self.rendered.clear();
        }

        for (index, message) in messages.iter().enumerate() {
            let known = self
                .rendered
                .get(index)
                .map(|(id, text)| (*id == message.id, text.clone()));

            match known {
                Some((true, previous)) if previous == message.text => {}
                Some((true, previous)) => {
                    let is_last = index + 1 == self.rendered.len();
                    match message.text.strip_prefix(previous.as_str()) {
                        Some(suffix) if is_last && self.line_open => write!(out, "{suffix}")?,
                        _ => {
                            self.close_line(&mut out)?;
                            self.print_message(&mut out, message)?;
                        }
                    }
                    self.rendered[index].1.clone_from(&message.text);
                }
                _ => {
                    self.rendered.truncate(index);
                    self.close_line(&mut out)?;
                    self.print_message(&mut out, message)?;
                    self.rendered.push((message.id.clone(), message.text.clone()));
                }
            }
        }

        out.flush()
    }

    fn print_message(&mut self, out: &mut impl Write, message: &ChatMessage) -> io::Result<()> {
        let prefix = match (message.role, message.kind) {
            (MessageRole::User, _) => "you>".blue().bold(),
            (MessageRole::Agent, MessageKind::Think) => "elisa (thinking)>".dark_grey(),
            (MessageRole::Agent, MessageKind::Say) => "elisa>".green().bold(),
            (MessageRole::Status, _) => "status>".yellow(),
            (MessageRole::Error, _) => "error>".red().bold(),
        };
        write!(out, "{} {}", prefix, message.text)?;
        self.line_open = true;
        Ok(())
    }

    fn close_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.line_open {
            writeln!(out)?;
            self.line_open = false;
        }
        Ok(())
    }

    fn print_status(&mut self, status: ConnectionStatus) {
        let mut out = io::stdout().lock();
        let _ = self.close_line(&mut out);
        let _ = writeln!(out, "{}", format!("[{status}]").dark_grey());
        let _ = out.flush();
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    // Create log directory if it doesn't exist
    let log_dir = dirs::home_dir()
        .map(|home| home.join(".elisa-chat").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".elisa-chat/logs"));

    std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Create log file with timestamp
    let log_file = log_dir.join(format!(
        "elisa-chat-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    let default_filter = if verbose { "elisa_chat=debug" } else { "elisa_chat=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false), // No ANSI colors in log file
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    Ok(())
}
