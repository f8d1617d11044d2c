use cesizen::{
    history::InteractionRecord,
    util::{format_clock, truncate_to_width},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::{App, SortBy};

const EXERCISE_COLUMN_WIDTH: usize = 28;

/// Pure presenter for a single session row
pub fn present_row(record: &InteractionRecord) -> Row<'static> {
    let duration = record
        .duration_secs()
        .map(|secs| format_clock(secs as u64))
        .unwrap_or_else(|| "-".to_string());

    let (outcome, outcome_color) = match (record.completed, record.ended_at) {
        (true, _) => ("done", Color::Green),
        (false, Some(_)) => ("stopped", Color::Yellow),
        (false, None) => ("open", Color::Gray),
    };

    Row::new(vec![
        Cell::from(record.started_at.format("%Y-%m-%d %H:%M").to_string()),
        Cell::from(truncate_to_width(&record.exercise, EXERCISE_COLUMN_WIDTH))
            .style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(record.mode.clone()),
        Cell::from(duration),
        Cell::from(record.cycles.to_string()),
        Cell::from(outcome).style(Style::default().fg(outcome_color)),
    ])
}

/// Render the session history screen
pub fn render_history(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // summary
            Constraint::Min(0),    // sessions table
            Constraint::Length(2), // instructions
        ])
        .split(area);

    let state = &mut app.history_state;

    let summary_text = match &state.summary {
        Some(summary) => {
            let mean = summary
                .mean_completed_minutes
                .map(|m| format!(", {m:.1} min on average"))
                .unwrap_or_default();
            format!(
                "{} sessions · {} completed · {:.0} minutes{mean}",
                summary.sessions, summary.completed, summary.total_minutes
            )
        }
        None => "No summary available".to_string(),
    };
    let title = Paragraph::new(summary_text)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    if state.records.is_empty() {
        let no_data = Paragraph::new("No sessions recorded yet. Start an exercise to fill your history.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(no_data, chunks[1]);
    } else {
        let table_height = chunks[1].height.saturating_sub(3) as usize; // borders + header
        let max_scroll = state.records.len().saturating_sub(table_height);
        if state.scroll_offset > max_scroll {
            state.scroll_offset = max_scroll;
        }

        let sort_direction = if state.sort_ascending { "↑" } else { "↓" };
        let indicator = |column: SortBy| {
            if state.sort_by == column {
                sort_direction
            } else {
                ""
            }
        };

        let header = Row::new(vec![
            Cell::from(format!("Started {}", indicator(SortBy::StartedAt))),
            Cell::from(format!("Exercise {}", indicator(SortBy::Exercise))),
            Cell::from("Mode"),
            Cell::from(format!("Length {}", indicator(SortBy::Duration))),
            Cell::from(format!("Cycles {}", indicator(SortBy::Cycles))),
            Cell::from("Outcome"),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = state
            .sorted()
            .into_iter()
            .skip(state.scroll_offset)
            .take(table_height)
            .map(present_row)
            .collect();

        let widths = [
            Constraint::Length(18), // Started
            Constraint::Min(16),    // Exercise
            Constraint::Length(7),  // Mode
            Constraint::Length(9),  // Length
            Constraint::Length(9),  // Cycles
            Constraint::Length(8),  // Outcome
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Sessions ({}/{})",
                (state.scroll_offset + table_height).min(state.records.len()),
                state.records.len()
            )))
            .column_spacing(1);

        f.render_widget(table, chunks[1]);
    }

    let instructions = Paragraph::new(
        "(↑/↓) scroll  (PgUp/PgDn) page  (Home) top  (1-4) sort  (b/backspace) back  (esc) quit",
    )
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(instructions, chunks[2]);
}
