pub mod history;
pub mod screen;

use cesizen::{
    phase::{Phase, PhaseKind},
    session::TimerStatus,
    timer::PhaseTimer,
    util::format_clock,
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Widget, Wrap},
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

pub fn phase_color(kind: PhaseKind) -> Color {
    match kind {
        PhaseKind::Inhale => Color::Cyan,
        PhaseKind::HoldAfterInhale => Color::Yellow,
        PhaseKind::Exhale => Color::Green,
        PhaseKind::HoldAfterExhale => Color::Magenta,
    }
}

/// Cycle counter as shown under the gauge, e.g. `cycle 3 / 30`
fn cycle_text(timer: &PhaseTimer) -> String {
    let done = timer.cycle_count();
    let current = match timer.status() {
        TimerStatus::Running | TimerStatus::Paused => done + 1,
        TimerStatus::Idle | TimerStatus::Completed => done,
    };
    match timer.total_cycles() {
        Some(total) => format!("cycle {} / {total}", current.min(total)),
        None => format!("cycle {current}"),
    }
}

fn elapsed_text(timer: &PhaseTimer) -> String {
    let elapsed = format_clock(timer.elapsed_ms() / 1000);
    match timer.total_duration_secs() {
        Some(total) => format!("{elapsed} / {}", format_clock(total)),
        None => elapsed,
    }
}

fn editor_item(index: usize, phase: &Phase, selected: bool, current: bool) -> ListItem<'static> {
    let marker = if selected { "> " } else { "  " };
    let mut style = Style::default().fg(phase_color(phase.kind));
    if !phase.enabled {
        style = Style::default().add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
    }
    if selected {
        style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
    }

    let mut spans = vec![
        Span::raw(marker),
        Span::styled(
            format!("{}. {:<12} {:>3}s", index + 1, phase.display_label(), phase.duration_secs),
            style,
        ),
    ];
    if !phase.enabled {
        spans.push(Span::styled("  off", Style::default().add_modifier(Modifier::DIM)));
    }
    if current {
        spans.push(Span::styled("  ◀", Style::default().add_modifier(Modifier::BOLD)));
    }
    ListItem::new(Line::from(spans))
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let timer = self.player.timer();
        let exercise = self.player.exercise();
        let free = self.is_free();

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let editor_height = if free {
            exercise.phases.len() as u16 + 2
        } else {
            0
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2),             // title
                Constraint::Length(2),             // phase and cue
                Constraint::Length(3),             // gauge
                Constraint::Length(2),             // cycle, elapsed, status
                Constraint::Length(editor_height), // free editor
                Constraint::Min(0),                // summary
                Constraint::Length(1),             // message
                Constraint::Length(1),             // legend
            ])
            .split(area);

        let title = Paragraph::new(vec![
            Line::from(Span::styled(exercise.name.clone(), bold_style)),
            Line::from(Span::styled(
                format!("{} · {}", exercise.mode, exercise.pattern()),
                dim_style,
            )),
        ])
        .alignment(Alignment::Center);
        title.render(chunks[0], buf);

        let phase = timer.current_phase();
        let color = phase.map(|p| phase_color(p.kind)).unwrap_or(Color::Gray);

        let phase_lines = match (timer.status(), phase) {
            (TimerStatus::Idle, _) => vec![
                Line::from(Span::styled("Ready", bold_style)),
                Line::from(Span::styled("press space to start", italic_style)),
            ],
            (TimerStatus::Completed, _) => vec![
                Line::from(Span::styled("Well done", bold_style.fg(Color::Green))),
                Line::from(Span::styled("session complete", italic_style)),
            ],
            (status, Some(phase)) => {
                let cue = if status == TimerStatus::Paused {
                    "paused"
                } else {
                    phase.kind.cue()
                };
                vec![
                    Line::from(Span::styled(phase.display_label(), bold_style.fg(color))),
                    Line::from(Span::styled(cue, italic_style)),
                ]
            }
            (_, None) => vec![Line::from("no enabled phase")],
        };
        Paragraph::new(phase_lines)
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let gauge_label = match timer.status() {
            TimerStatus::Running | TimerStatus::Paused => {
                format!("{}s", timer.remaining_phase_secs())
            }
            _ => String::new(),
        };
        Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(color))
            .ratio((timer.progress() / 100.0).clamp(0.0, 1.0))
            .label(gauge_label)
            .render(chunks[2], buf);

        let stats = Line::from(vec![
            Span::styled(cycle_text(timer), bold_style),
            Span::raw("   "),
            Span::raw(elapsed_text(timer)),
            Span::raw("   "),
            Span::styled(timer.status().to_string(), dim_style),
        ]);
        Paragraph::new(stats)
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        if free {
            let current = timer
                .is_active()
                .then(|| timer.current_config_index())
                .flatten();
            let selected = self.selected_phase.min(exercise.phases.len().saturating_sub(1));
            let items: Vec<ListItem> = exercise
                .phases
                .iter()
                .enumerate()
                .map(|(i, p)| editor_item(i, p, i == selected, Some(i) == current))
                .collect();
            List::new(items)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("Phases · {}s per cycle", exercise.cycle_duration_secs())),
                )
                .render(chunks[4], buf);
        }

        if timer.is_completed() {
            let minutes = timer.elapsed_ms() as f64 / 60_000.0;
            let summary = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("{} cycles in {}", timer.cycle_count(), format_clock(timer.elapsed_ms() / 1000)),
                    bold_style.fg(Color::Green),
                )),
                Line::from(Span::styled(
                    format!("{minutes:.1} minutes of calm breathing"),
                    italic_style,
                )),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            summary.render(chunks[5], buf);
        }

        if let Some(message) = &self.message {
            Paragraph::new(Span::styled(message.clone(), Style::default().fg(Color::Red)))
                .alignment(Alignment::Center)
                .render(chunks[6], buf);
        }

        let legend = if free {
            "(space) start/pause  (r)eset  (↑/↓) select  (K/J) move  (t)oggle  (+/-) duration  (h)istory  (esc) quit"
        } else {
            "(space) start/pause  (r)eset  (h)istory  (esc) quit"
        };
        Paragraph::new(Span::styled(legend, italic_style.add_modifier(Modifier::DIM)))
            .alignment(Alignment::Center)
            .render(chunks[7], buf);
    }
}
