//! TUI rendering — orchestrates all panes.

pub mod console;
pub mod device;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};

use rollcall_core::store::AttendanceStore;

use crate::app::{App, DeviceState, View};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<S>(f: &mut Frame, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let area = f.area();

  // Vertical stack: header, body, status bar.
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0]);
  match app.view {
    View::Device => device::draw(f, rows[1], app),
    View::Console => console::draw(f, rows[1], app),
  }
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect) {
  let date = Local::now().format("%Y-%m-%d").to_string();

  let left = Span::styled(
    " rollcall  [Tab] switch pane  [q] quit",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(
    format!("{date} "),
    Style::default().fg(Color::DarkGray),
  );

  // Simple left-right header: pad the middle.
  let left_width = left.content.len() as u16;
  let right_width = right.content.len() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<S>(f: &mut Frame, area: Rect, app: &App<S>)
where
  S: AttendanceStore + Clone + 'static,
{
  let (mode_label, hints) = match app.view {
    View::Console => ("CONSOLE", "Tab device view  q quit"),
    View::Device => match app.device {
      DeviceState::Booting => ("BOOT", "Contacting store…"),
      DeviceState::Offline => ("OFFLINE", "q quit"),
      DeviceState::Idle => ("IDLE", "Enter start  Tab console  q quit"),
      DeviceState::EnterStaffId => {
        ("STAFF ID", "0-9 type  Backspace clear  Enter confirm")
      }
      DeviceState::SelectCourse => ("COURSE", "1-9 select course"),
      DeviceState::Active => {
        ("ACTIVE", "↑↓ pick card  t tap  e end session  Tab console")
      }
    },
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {hints}"),
    Style::default().fg(Color::DarkGray),
  );

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
