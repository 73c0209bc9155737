use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use folio::api::{ApiClient, HttpPageSource};
use folio::clipboard::FallbackClipboard;
use folio::event_source::KeyboardEventSource;
use folio::location::ReaderUrl;
use folio::panic_handler::initialize_panic_handler;
use folio::settings::{get_settings, load_settings, set_settings};
use folio::storage::LocalStore;
use folio::{App, run_app_with_event_source};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Terminal reader for books served page by page", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio --path books/dune.epub --title Dune
    folio --url '?path=books/dune.epub&page=12'")]
struct Cli {
    /// Full reader URL; its query carries path, title and page
    #[arg(long, conflicts_with_all = ["path", "title", "page"])]
    url: Option<String>,

    /// Book path on the page service
    #[arg(long)]
    path: Option<String>,

    /// Title shown until the service reports one
    #[arg(long)]
    title: Option<String>,

    /// 1-based page to open
    #[arg(long)]
    page: Option<usize>,

    /// Scheme and host of the page service
    #[arg(long)]
    origin: Option<String>,

    /// API root path or absolute URL
    #[arg(long)]
    api_root: Option<String>,

    /// Settings file (YAML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where positions, notes and preferences are kept
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Keep nothing between runs
    #[arg(long)]
    ephemeral: bool,

    #[arg(long, value_name = "FILE", default_value = "folio.log")]
    log_file: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: LevelFilter = cli
        .log_level
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown log level {:?}", cli.log_level))?;
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {}", cli.log_file.display()))?,
    )?;

    info!("Starting folio");

    load_settings(cli.config.as_deref());
    let mut settings = get_settings();
    if let Some(origin) = cli.origin {
        settings.origin = origin;
    }
    if cli.api_root.is_some() {
        settings.api_root = cli.api_root;
    }
    if cli.state_file.is_some() {
        settings.state_file = cli.state_file;
    }
    set_settings(settings.clone());

    let url = match cli.url.as_deref() {
        Some(url) => ReaderUrl::parse(url)?,
        None => ReaderUrl::from_params(cli.path.as_deref(), cli.title.as_deref(), cli.page),
    };
    info!("Opening {url}");

    let store = if cli.ephemeral {
        LocalStore::ephemeral()
    } else {
        LocalStore::load_or_ephemeral(settings.effective_state_file().as_deref())
    };

    let client = ApiClient::new(&settings.origin, &settings.effective_api_root())?;
    info!("Page service at {}", client.base_url());
    let source = Arc::new(HttpPageSource::new(client));

    let mut app = App::new(url, store, source, FallbackClipboard::system())
        .with_cell_size(settings.cell_width, settings.cell_height);

    initialize_panic_handler();

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down folio");
    Ok(())
}
