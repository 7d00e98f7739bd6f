use anyhow::{anyhow, Result};
use clap::Parser;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use novelcraft::app::App;
use novelcraft::config::Config;
use novelcraft::gemini::GeminiClient;
use novelcraft::mock::MockBackend;
use novelcraft::provider::GenerateBackend;
use novelcraft::tree::starter_project;
use novelcraft::{handler, tui, ui};

#[derive(Parser)]
#[command(name = "novelcraft")]
#[command(about = "TUI for AI-assisted novel drafting with specialized agent personas")]
struct Cli {
    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Run against the deterministic mock backend (no API key needed)
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let model = cli
        .model
        .or(config.default_model.clone())
        .unwrap_or_else(|| GeminiClient::DEFAULT_MODEL.to_string());

    let backend = if cli.mock {
        GenerateBackend::Mock(MockBackend::new())
    } else {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            anyhow!(
                "No Gemini API key found. Set GEMINI_API_KEY, add it to the config file, \
                 or run with --mock."
            )
        })?;
        GenerateBackend::Gemini(GeminiClient::new(&api_key, &model))
    };

    tracing::info!(backend = backend.label(), model = %model, "starting novelcraft");

    let mut app = App::new(backend, starter_project());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

/// Route diagnostics to a file under the config dir; the alternate screen
/// owns the terminal.
fn init_logging() -> Result<()> {
    let log_dir = Config::log_dir()?;
    fs::create_dir_all(&log_dir)?;
    let log_file = fs::File::create(log_dir.join("novelcraft.log"))?;

    let filter = EnvFilter::try_from_env("NOVELCRAFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("novelcraft=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}
