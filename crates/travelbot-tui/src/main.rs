use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use travelbot_core::{
    probe_once, spawn_probe, Config, ConnectivityMonitor, FileStore, HttpTransport,
    SessionController,
};

mod app;
mod cards;
mod handler;
mod markdown;
mod render;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const LOG_FILE: &str = "travelbot.log";

#[derive(Parser)]
#[command(name = "travelbot")]
#[command(about = "TravelBot - chat with a travel planning assistant")]
#[command(version)]
struct Cli {
    /// Chat backend base URL (overrides config and TRAVELBOT_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// File the conversation is saved to
    #[arg(long)]
    store: Option<PathBuf>,

    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Start a new conversation instead of restoring the saved one
    #[arg(long)]
    new: bool,
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// The TUI owns the terminal, so logs go to a file next to the saved conversation.
fn init_file_logging(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }

    let store = match &config.store_path {
        Some(path) => FileStore::with_path(path),
        None => FileStore::new()?,
    };

    if cli.prompt.is_some() {
        init_stderr_logging();
    } else {
        let log_dir = store.path().parent().unwrap_or(Path::new(".")).to_path_buf();
        init_file_logging(&log_dir)?;
    }

    let transport = Arc::new(HttpTransport::new(&config.chat_url()));
    tracing::info!(url = transport.url(), store = %store.path().display(), "starting");

    let probe_interval = Duration::from_secs(config.probe_interval_secs.max(1));
    let online = probe_once(&config.endpoint, Duration::from_secs(2)).await;
    let connectivity = ConnectivityMonitor::new(online);
    let _probe = spawn_probe(connectivity.clone(), &config.endpoint, probe_interval);

    let mut controller = SessionController::new(store, transport, &connectivity);
    controller.initialize();
    if cli.new {
        controller.reset_conversation();
    }

    if let Some(prompt) = cli.prompt {
        return run_single_prompt(controller, &prompt).await;
    }
    run_tui(controller).await
}

async fn run_single_prompt(mut controller: SessionController, prompt: &str) -> Result<()> {
    if let Err(e) = controller.send_message(prompt).await {
        let shown = controller.error().map(str::to_string).unwrap_or_else(|| e.to_string());
        anyhow::bail!("{} ({})", shown, e);
    }

    if let Some(reply) = controller.messages().last() {
        println!("{}", render::message_text(reply));
    }
    Ok(())
}

async fn run_tui(controller: SessionController) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(controller, events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}
