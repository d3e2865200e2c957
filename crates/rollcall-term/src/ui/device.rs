//! Device pane — the emulated terminal and its tray of test cards.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use rollcall_core::store::AttendanceStore;

use crate::app::{App, DeviceState};

/// Render the device pane into `area`.
pub fn draw<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  // Device on the left, test cards on the right.
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
    .split(area);

  draw_terminal(f, cols[0], app);
  draw_cards(f, cols[1], app);
}

// ─── Terminal ─────────────────────────────────────────────────────────────────

fn draw_terminal<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let block = Block::default()
    .title(" RFID-TERMINAL ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // LED row
      Constraint::Length(8), // OLED
      Constraint::Min(0),    // keypad legend
    ])
    .split(inner);

  draw_leds(f, rows[0], app);
  draw_oled(f, rows[1], app);
  draw_legend(f, rows[2]);
}

fn draw_leds<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let led = |label: &str, on: bool, color: Color| {
    vec![
      Span::styled(
        " ● ",
        Style::default().fg(if on { color } else { Color::DarkGray }),
      ),
      Span::styled(
        label.to_string(),
        Style::default().fg(Color::DarkGray),
      ),
    ]
  };

  let mut spans = led("PWR", true, Color::Green);
  spans.extend(led("NET", app.device != DeviceState::Offline, Color::Blue));
  spans.extend(led("READ", app.scan_in_flight, Color::Cyan));
  f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_oled<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray))
    .style(Style::default().bg(Color::Black));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let lines: Vec<Line> = app
    .screen
    .iter()
    .map(|l| {
      Line::from(Span::styled(
        l.clone(),
        Style::default()
          .fg(Color::Green)
          .add_modifier(Modifier::BOLD),
      ))
    })
    .collect();
  f.render_widget(Paragraph::new(lines), inner);
}

fn draw_legend(f: &mut Frame, area: Rect) {
  let dim = Style::default().fg(Color::DarkGray);
  let lines = vec![
    Line::from(Span::styled("Keypad", dim.add_modifier(Modifier::BOLD))),
    Line::from(Span::styled("  0-9        digits / course select", dim)),
    Line::from(Span::styled("  Enter      confirm (ENT)", dim)),
    Line::from(Span::styled("  Backspace  clear (CLR)", dim)),
    Line::from(Span::styled("  e          end session", dim)),
    Line::from(Span::styled("  ↑↓ + t     tap a test card", dim)),
  ];
  f.render_widget(Paragraph::new(lines), area);
}

// ─── Test cards ───────────────────────────────────────────────────────────────

fn draw_cards<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let title = format!(" Test Cards ({}) ", app.cards.len());
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  if app.cards.is_empty() {
    f.render_widget(
      Paragraph::new(Span::styled(
        "No students loaded. Run with --seed-demo.",
        Style::default().fg(Color::DarkGray),
      )),
      inner,
    );
    return;
  }

  // Cards are tappable only while a session is running.
  let enabled = app.device == DeviceState::Active;

  let items: Vec<ListItem> = app
    .cards
    .iter()
    .enumerate()
    .map(|(i, card)| {
      let is_cursor = i == app.card_cursor;
      let base = if enabled {
        Style::default()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      let style = if is_cursor {
        base
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD)
      } else {
        base
      };

      let tag = card.rfid_tag.as_deref().unwrap_or("— no tag —");
      ListItem::new(Line::from(vec![
        Span::styled(
          format!("{} {}", card.first_name, card.last_name),
          style,
        ),
        Span::styled(
          format!("  {}  {}", card.number, tag),
          style.fg(if is_cursor { Color::White } else { Color::DarkGray }),
        ),
      ]))
    })
    .collect();

  let mut state = ListState::default();
  state.select(Some(app.card_cursor));

  f.render_stateful_widget(
    List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol(""),
    inner,
    &mut state,
  );
}
