use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod app;
mod handler;
mod logging;
mod render;
mod tui;
mod ui;

use app::App;
use codementor_core::{
    format_message, ChatSession, Config, DisplaySink, GeminiClient, HtmlTranscript,
    NoopIndicator, RequestLifecycle, WELCOME_MESSAGE,
};
use tui::EventHandler;

const NO_KEY_NOTICE: &str = "No API key found. Set `GEMINI_API_KEY` or add `api_key` to the config file, then restart.";

#[derive(Parser)]
#[command(name = "codementor")]
#[command(version, about = "Ask programming and DSA questions from the terminal")]
struct Cli {
    /// Config file (defaults to <config dir>/codementor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model name, overrides the config file
    #[arg(long, global = true)]
    model: Option<String>,

    /// Request deadline in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Mirror the conversation into this HTML file
    #[arg(long, global = true)]
    transcript: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one question and print the formatted reply
    Ask {
        /// The question
        #[arg(required = true)]
        prompt: Vec<String>,
        /// Print the reply text instead of HTML
        #[arg(long)]
        text: bool,
    },
    /// Format a Markdown file (or stdin) as HTML
    Format {
        file: Option<PathBuf>,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(path) = &self.transcript {
            config.transcript_path = Some(path.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let _log_guard = match logging::default_log_path().and_then(|p| logging::init(&p, cli.debug)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("logging disabled: {}", e);
            None
        }
    };

    match cli.command {
        None => run_tui(config).await,
        Some(Commands::Ask { prompt, text }) => ask(config, &prompt.join(" "), text).await,
        Some(Commands::Format { file }) => format_file(file),
        Some(Commands::Config { init }) => show_config(&cli.config, &config, init),
    }
}

async fn run_tui(config: Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let bridge = Arc::new(events.bridge());

    let mut sinks: Vec<Arc<dyn DisplaySink>> = vec![bridge.clone()];
    if let Some(path) = &config.transcript_path {
        match HtmlTranscript::create(path, "Code Mentor transcript") {
            Ok(transcript) => sinks.push(Arc::new(transcript)),
            Err(e) => error!(path = ?path, error = %e, "transcript disabled"),
        }
    }

    let lifecycle = RequestLifecycle::new(config.clone(), bridge);
    let session = Arc::new(ChatSession::new(lifecycle, Arc::new(sinks)));
    let mut app = App::new(session.clone(), &config, events.bridge());

    if config.show_welcome {
        session.greet(WELCOME_MESSAGE);
    }
    if config.resolve_api_key().is_none() {
        session.greet(NO_KEY_NOTICE);
    }
    info!(model = %config.model, "chat started");

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

async fn ask(config: Config, prompt: &str, text: bool) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(anyhow!("prompt must not be empty"));
    }

    let lifecycle = RequestLifecycle::new(config, Arc::new(NoopIndicator));
    let outcome = lifecycle.send(prompt.trim()).await;

    let reply = outcome.display_text();
    if text {
        println!("{}", reply);
    } else {
        println!("{}", format_message(&reply));
    }

    match outcome.error_kind() {
        None => Ok(()),
        Some(kind) => Err(anyhow!("request failed: {}", kind)),
    }
}

fn format_file(file: Option<PathBuf>) -> Result<()> {
    let input = match file {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read {:?}: {}", path, e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    println!("{}", format_message(&input));
    Ok(())
}

fn show_config(path: &Option<PathBuf>, config: &Config, init: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };

    if init {
        config.save_to(&path)?;
        println!("Wrote {}", path.display());
    }

    let key_state = if config.resolve_api_key().is_some() {
        "set"
    } else {
        "missing"
    };

    println!("config:     {}", path.display());
    println!("endpoint:   {}", config.endpoint);
    println!("model:      {}", config.model);
    println!("known:      {}", GeminiClient::list_models().join(", "));
    println!("timeout_ms: {}", config.timeout_ms);
    println!("api key:    {}", key_state);
    if let Some(transcript) = &config.transcript_path {
        println!("transcript: {}", transcript.display());
    }
    Ok(())
}
