//! `rollcall` — terminal simulator and live console for the Rollcall
//! attendance store.
//!
//! # Usage
//!
//! ```
//! rollcall --db ./rollcall.db --seed-demo
//! rollcall --config ~/.config/rollcall/config.toml --serve 127.0.0.1:8717
//! ```

mod app;
mod console;
mod seed;
mod ui;

use std::{io, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
  },
};
use ratatui::{Terminal, backend::CrosstermBackend};
use rollcall_core::session::SessionPolicy;
use rollcall_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
  name = "rollcall",
  about = "RFID attendance terminal simulator and live console"
)]
struct Args {
  /// Path to a TOML config file (db_path, session_minutes, …).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// SQLite database path (default: ./rollcall.db).
  #[arg(long, env = "ROLLCALL_DB")]
  db: Option<PathBuf>,

  /// Maximum session length in minutes before the implicit timeout.
  #[arg(long)]
  session_minutes: Option<i64>,

  /// Reject scans from students not enrolled in the session's course.
  #[arg(long)]
  require_enrollment: bool,

  /// Populate demo lecturers, courses, and tagged students on startup.
  #[arg(long)]
  seed_demo: bool,

  /// Also serve the portal JSON API on this address.
  #[arg(long, value_name = "ADDR")]
  serve: Option<SocketAddr>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  db_path:            Option<String>,
  session_minutes:    Option<i64>,
  #[serde(default)]
  require_enrollment: bool,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .with_writer(io::stderr)
    .init();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let db_path = args
    .db
    .clone()
    .or_else(|| file_cfg.db_path.as_deref().map(PathBuf::from))
    .unwrap_or_else(|| PathBuf::from("rollcall.db"));
  let policy = SessionPolicy::with_minutes(
    args
      .session_minutes
      .or(file_cfg.session_minutes)
      .unwrap_or(60),
  );
  let require_enrollment = args.require_enrollment || file_cfg.require_enrollment;

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  // An unreachable store means an offline device, not a crash.
  let run_result = match SqliteStore::open(&db_path).await {
    Ok(store) => run(&mut terminal, store, &args, policy, require_enrollment).await,
    Err(e) => {
      error!(error = %e, path = %db_path.display(), "store unreachable");
      run_offline(&mut terminal).await
    }
  };

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  store: SqliteStore,
  args: &Args,
  policy: SessionPolicy,
  require_enrollment: bool,
) -> Result<()> {
  if args.seed_demo {
    seed::seed_demo(&store).await.context("seeding demo data")?;
  }

  if let Some(addr) = args.serve {
    spawn_api(store.clone(), addr, policy, require_enrollment).await?;
  }

  let mut app = App::new(store, policy, require_enrollment);
  app.boot().await;

  run_event_loop(terminal, &mut app).await
}

/// Mount the portal API over the same store handle the device uses.
async fn spawn_api(
  store: SqliteStore,
  addr: SocketAddr,
  policy: SessionPolicy,
  require_enrollment: bool,
) -> Result<()> {
  let router = axum::Router::new()
    .nest(
      "/api",
      rollcall_api::api_router(store, policy, require_enrollment),
    )
    .layer(tower_http::trace::TraceLayer::new_for_http());

  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("binding API listener on {addr}"))?;
  info!(%addr, "portal API listening");

  tokio::spawn(async move {
    if let Err(e) = axum::serve(listener, router).await {
      error!(error = %e, "API server exited");
    }
  });
  Ok(())
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<SqliteStore>,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      if !app.handle_key(key).await {
        break;
      }
    }

    app.pump_events().await;
    app.drain_scan_results();
    app.tick(chrono::Utc::now(), std::time::Instant::now()).await;
  }

  Ok(())
}

/// Minimal loop shown when the store could not even be opened: the device
/// boots straight to its offline face and waits for quit.
async fn run_offline(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
  use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
  };

  loop {
    terminal
      .draw(|f| {
        let block = Block::default()
          .title(" RFID-TERMINAL ")
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(f.area());
        f.render_widget(block, f.area());
        let lines = vec![
          Line::from(""),
          Line::from(Span::styled(
            "> NO NETWORK",
            Style::default()
              .fg(Color::Red)
              .add_modifier(Modifier::BOLD),
          )),
          Line::from(Span::styled(
            "> CHECK CONFIG",
            Style::default().fg(Color::Red),
          )),
          Line::from(""),
          Line::from(Span::styled(
            "press q to quit",
            Style::default().fg(Color::DarkGray),
          )),
        ];
        f.render_widget(
          Paragraph::new(lines).alignment(Alignment::Center),
          inner,
        );
      })
      .context("drawing frame")?;

    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(200))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      use crossterm::event::{KeyCode, KeyModifiers};
      let quit = key.code == KeyCode::Char('q')
        || (key.modifiers.contains(KeyModifiers::CONTROL)
          && key.code == KeyCode::Char('c'));
      if quit {
        break;
      }
    }
  }

  Ok(())
}
