//! Console pane — the live feed for the active session.

use chrono::{Local, Utc};
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, Paragraph},
};

use rollcall_core::{feed::SessionFeed, store::AttendanceStore};

use crate::app::App;

/// Render the console pane into `area`.
pub fn draw<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  match app.console.feed.as_ref() {
    Some(feed) => draw_active(f, area, app, feed),
    None => draw_standby(f, area),
  }
}

// ─── Standby ──────────────────────────────────────────────────────────────────

fn draw_standby(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let lines = vec![
    Line::from(""),
    Line::from(Span::styled(
      "SYSTEM STANDBY",
      Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    )),
    Line::from(Span::styled(
      "Waiting for a terminal to start a session.",
      Style::default().fg(Color::DarkGray),
    )),
    Line::from(""),
    Line::from(Span::styled(
      "● LISTENING FOR HARDWARE SIGNAL",
      Style::default().fg(Color::Yellow),
    )),
  ];
  f.render_widget(
    Paragraph::new(lines).alignment(Alignment::Center),
    inner,
  );
}

// ─── Active ───────────────────────────────────────────────────────────────────

fn draw_active<S>(f: &mut Frame, area: Rect, app: &App<S>, feed: &SessionFeed)
where
  S: AttendanceStore + Clone + 'static,
{
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(0), Constraint::Length(36)])
    .split(area);

  let left = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(2), // session header
      Constraint::Length(3), // stats
      Constraint::Min(0),    // spotlight stage
    ])
    .split(cols[0]);

  draw_session_header(f, left[0], app, feed);
  draw_stats(f, left[1], feed);
  draw_spotlight(f, left[2], app);
  draw_log(f, cols[1], feed);
}

fn draw_session_header<S>(
  f: &mut Frame,
  area: Rect,
  app: &App<S>,
  feed: &SessionFeed,
) where
  S: AttendanceStore + Clone + 'static,
{
  let (code, name) = app
    .console
    .course
    .as_ref()
    .map(|c| (c.code.clone(), c.name.clone()))
    .unwrap_or_else(|| ("—".into(), String::new()));

  let remaining = feed.session().remaining(app.policy(), Utc::now());
  let secs = remaining.num_seconds();
  let clock = format!("{:02}:{:02} left", secs / 60, secs % 60);

  let lines = vec![
    Line::from(vec![
      Span::styled(
        "● LIVE  ",
        Style::default()
          .fg(Color::Green)
          .add_modifier(Modifier::BOLD),
      ),
      Span::styled(
        code,
        Style::default()
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      ),
      Span::styled(
        format!("  {clock}"),
        Style::default().fg(Color::DarkGray),
      ),
    ]),
    Line::from(Span::styled(name, Style::default().fg(Color::DarkGray))),
  ];
  f.render_widget(Paragraph::new(lines), area);
}

fn draw_stats(f: &mut Frame, area: Rect, feed: &SessionFeed) {
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let line = Line::from(vec![
    Span::styled("PRESENT ", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!("{}", feed.count()),
      Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled("    RATE ", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!("{:.1}/m", feed.rate(Utc::now())),
      Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled("    STATUS ", Style::default().fg(Color::DarkGray)),
    Span::styled(
      "ONLINE",
      Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD),
    ),
  ]);
  f.render_widget(Paragraph::new(line), inner);
}

fn draw_spotlight<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let lines = match app.console.spotlight.as_ref() {
    Some((entry, _)) => vec![
      Line::from(""),
      Line::from(Span::styled(
        "✓ IDENTITY CONFIRMED",
        Style::default()
          .fg(Color::Green)
          .add_modifier(Modifier::BOLD),
      )),
      Line::from(Span::styled(
        entry.student.display_name(),
        Style::default()
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )),
      Line::from(Span::styled(
        entry.student.number.clone(),
        Style::default().fg(Color::DarkGray),
      )),
      Line::from(Span::styled(
        format!(
          "{}  PRESENT",
          entry.log.timestamp.with_timezone(&Local).format("%H:%M:%S")
        ),
        Style::default().fg(Color::Green),
      )),
    ],
    None => vec![
      Line::from(""),
      Line::from(Span::styled(
        "S C A N N I N G",
        Style::default().fg(Color::DarkGray),
      )),
    ],
  };
  f.render_widget(
    Paragraph::new(lines).alignment(Alignment::Center),
    inner,
  );
}

fn draw_log(f: &mut Frame, area: Rect, feed: &SessionFeed) {
  let block = Block::default()
    .title(" Activity Log ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let items: Vec<ListItem> = feed
    .entries()
    .iter()
    .map(|entry| {
      let time = entry
        .log
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();
      ListItem::new(Line::from(vec![
        Span::styled(
          format!("{time} "),
          Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
          entry.student.last_name.clone(),
          Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
          format!("  {}", entry.student.number),
          Style::default().fg(Color::DarkGray),
        ),
      ]))
    })
    .collect();

  f.render_widget(List::new(items), inner);
}
