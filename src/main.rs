mod app;
mod components;
mod event;
mod handler;
mod logging;
mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use orbit::config::{AppConfig, CacheConfig, GeneralConfig, LogConfig, MappingConfig, TreeConfig};
use orbit::error::{AppError, Result};
use orbit::fs::cache::NodeCache;
use orbit::fs::mapping::MappingSupervisor;
use orbit::fs::policy::ExpansionPolicy;
use orbit::fs::tree::{FileTree, TreeOptions};

use crate::app::App;
use crate::event::{Event, EventHandler, TreeEventSink};
use crate::tui::{install_panic_hook, Tui};

/// A terminal file tree that expands lazily and keeps listings warm in the background.
#[derive(Parser, Debug)]
#[command(name = "orbit", version, about)]
struct Cli {
    /// Root path to display (defaults to the configured path, then the current directory)
    path: Option<PathBuf>,

    /// Path to a config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Expansion policy: single, recursive, main-recursive or default
    #[arg(long, short = 'p')]
    policy: Option<String>,

    /// Do not warm the cache in the background
    #[arg(long)]
    no_mapping: bool,

    /// Maximum number of cached directory listings
    #[arg(long)]
    cache_size: Option<usize>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// CLI flags as the highest-priority config layer.
    fn overrides(&self) -> Result<AppConfig> {
        let policy = match &self.policy {
            Some(name) => match ExpansionPolicy::parse(name) {
                Some(policy) => Some(policy.label().to_string()),
                None => return Err(AppError::Config(format!("unknown policy '{name}'"))),
            },
            None => None,
        };
        Ok(AppConfig {
            general: GeneralConfig {
                default_path: self.path.as_ref().map(|p| p.to_string_lossy().to_string()),
                ..Default::default()
            },
            tree: TreeConfig { policy },
            cache: CacheConfig {
                max_size: self.cache_size,
                ..Default::default()
            },
            mapping: MappingConfig {
                enabled: self.no_mapping.then_some(false),
                ..Default::default()
            },
            log: LogConfig {
                file: self
                    .log_file
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                ..Default::default()
            },
        })
    }
}

/// Canonicalize the root when possible. A root that can't be resolved is
/// kept as given; the tree logs it and opens with just the root row.
fn resolve_root(path: PathBuf) -> PathBuf {
    match path.canonicalize() {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not resolve root path");
            path
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()?));

    logging::init(&config.log_file(), config.log_level())?;

    let path = config
        .general
        .default_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let path = resolve_root(path);

    let cache = Arc::new(NodeCache::new(config.cache_max_size()));
    let _trim = cache.spawn_trim_task(config.trim_interval());
    let mapping = Arc::new(MappingSupervisor::new(
        Arc::clone(&cache),
        config.mapping_workers(),
    ));

    install_panic_hook();
    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(Duration::from_millis(16));

    let options = TreeOptions {
        policy: config.policy(),
        start_mapping: config.mapping_enabled(),
    };
    let listener = Arc::new(TreeEventSink(events.sender()));
    let tree = FileTree::open(&path, options, cache, mapping, listener).await;
    let mut app = App::new(tree);

    loop {
        tui.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key),
            Event::Mouse(mouse) => handler::handle_mouse_event(&mut app, mouse),
            Event::Tick => app.clear_expired_status(),
            Event::Resize(_, _) => {}
            Event::TreeUpdated(update) => app.handle_tree_update(update),
        }

        if app.should_quit {
            break;
        }
    }

    app.tree.destroy();
    tui.restore()?;
    info!("orbit exited");
    Ok(())
}
