mod ui;

use cesizen::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    error::ExerciseError,
    exercise::{load_records, Exercise, ExerciseMode},
    history::{HistorySummary, InteractionRecord, SessionLog},
    logging,
    player::Player,
    presets::{self, DEFAULT_PRESET},
    session::GUIDED_TICK_RANGE_MS,
    runtime::{CrosstermEventSource, FixedTicker, Runner, SessionEvent, TickScheduler, TickToken},
    timer::TimerEvent,
    util::format_clock,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin, Write},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

use crate::ui::screen::current_screen;

/// Redraw interval while no tick is due
const REDRAW_INTERVAL_MS: u64 = 250;

const HISTORY_LIMIT: usize = 500;

/// breathing exercises in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Guided breathing exercises with a fixed rhythm and duration, a free mode with an editable phase list, and a local history of your sessions."
)]
pub struct Cli {
    /// inhale duration in seconds
    #[clap(short = 'i', long)]
    inhale: Option<u32>,

    /// hold (after inhale) duration in seconds, 0 to skip
    #[clap(short = 'a', long)]
    hold: Option<u32>,

    /// exhale duration in seconds
    #[clap(short = 'e', long)]
    exhale: Option<u32>,

    /// total exercise duration in minutes
    #[clap(short = 'm', long)]
    minutes: Option<u32>,

    /// built-in exercise to play (see --list-presets)
    #[clap(short = 'p', long)]
    preset: Option<String>,

    /// play an exercise record (or the first of a list) from a JSON file
    #[clap(long, value_name = "PATH")]
    exercise_file: Option<PathBuf>,

    /// free exercise: editable phases, no time limit
    #[clap(long)]
    free: bool,

    /// tick granularity of guided exercises, in milliseconds
    #[clap(long, value_parser = clap::value_parser!(u64).range(GUIDED_TICK_RANGE_MS))]
    tick_ms: Option<u64>,

    /// print the built-in exercises and exit
    #[clap(long)]
    list_presets: bool,

    /// print a summary of past sessions and exit
    #[clap(long)]
    history: bool,

    /// write every past session as CSV to PATH and exit
    #[clap(long, value_name = "PATH")]
    export_history: Option<PathBuf>,
}

impl Cli {
    /// Commands that print and exit without opening the player
    fn is_batch(&self) -> bool {
        self.list_presets || self.history || self.export_history.is_some()
    }

    fn has_timings(&self) -> bool {
        self.inhale.is_some() || self.hold.is_some() || self.exhale.is_some() || self.minutes.is_some()
    }

    /// Picks the exercise to play: `--free`, then `--exercise-file`, then
    /// `--preset`, then explicit timings, then the configured default preset.
    /// Timings given alongside a file or preset override its values.
    fn resolve_exercise(&self, config: &Config) -> Result<Exercise, ExerciseError> {
        if self.free {
            return Ok(Exercise::free(config.free_phases.clone()));
        }

        let base = if let Some(path) = &self.exercise_file {
            let records = load_records(path)?;
            if records.len() > 1 {
                info!(path = %path.display(), count = records.len(), "playing the first exercise of the file");
            }
            let record = records.into_iter().next().ok_or(ExerciseError::Empty)?;
            Exercise::from(&record)
        } else if let Some(slug) = &self.preset {
            presets::find_preset(slug)?
        } else if self.has_timings() {
            presets::find_preset(DEFAULT_PRESET)?.renamed("Custom")
        } else {
            presets::find_preset(&config.default_preset).or_else(|e| {
                warn!(error = %e, "falling back to the default preset");
                presets::find_preset(DEFAULT_PRESET)
            })?
        };

        Ok(self.apply_timings(base))
    }

    fn apply_timings(&self, base: Exercise) -> Exercise {
        if !self.has_timings() {
            return base;
        }
        let [inhale, hold, exhale] = base.guided_timings();
        let minutes = base.total_duration_secs.unwrap_or(0) / 60;
        Exercise::guided(
            base.name,
            self.inhale.unwrap_or(inhale),
            self.hold.unwrap_or(hold),
            self.exhale.unwrap_or(exhale),
            self.minutes.unwrap_or(minutes as u32),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Player,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    StartedAt,
    Exercise,
    Duration,
    Cycles,
}

#[derive(Debug)]
pub struct HistoryState {
    pub records: Vec<InteractionRecord>,
    pub summary: Option<HistorySummary>,
    pub scroll_offset: usize,
    pub sort_by: SortBy,
    pub sort_ascending: bool,
}

impl Default for HistoryState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            summary: None,
            scroll_offset: 0,
            sort_by: SortBy::StartedAt,
            sort_ascending: false,
        }
    }
}

impl HistoryState {
    fn sort(&mut self, sort_by: SortBy) {
        if self.sort_by == sort_by {
            self.sort_ascending = !self.sort_ascending;
        } else {
            self.sort_by = sort_by;
            self.sort_ascending = sort_by != SortBy::StartedAt;
        }
        self.scroll_offset = 0;
    }

    /// Records in display order
    pub fn sorted(&self) -> Vec<&InteractionRecord> {
        let mut rows: Vec<&InteractionRecord> = self.records.iter().collect();
        rows.sort_by(|a, b| {
            let cmp = match self.sort_by {
                SortBy::StartedAt => a.started_at.cmp(&b.started_at),
                SortBy::Exercise => a.exercise.to_lowercase().cmp(&b.exercise.to_lowercase()),
                SortBy::Duration => a.duration_secs().cmp(&b.duration_secs()),
                SortBy::Cycles => a.cycles.cmp(&b.cycles),
            };
            if self.sort_ascending {
                cmp
            } else {
                cmp.reverse()
            }
        });
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitType {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub player: Player,
    pub state: AppState,
    /// Row of the phase editor under the cursor
    pub selected_phase: usize,
    pub history_state: HistoryState,
    /// Feedback line, e.g. a rejected edit
    pub message: Option<String>,
}

impl App {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            state: AppState::Player,
            selected_phase: 0,
            history_state: HistoryState::default(),
            message: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.player.exercise().mode == ExerciseMode::Free
    }

    fn on_tick(&mut self, token: TickToken, sched: &mut impl TickScheduler) -> Vec<TimerEvent> {
        let events = self.player.on_tick(token, sched);
        if events.iter().any(|e| matches!(e, TimerEvent::Completed { .. })) {
            self.message = None;
        }
        events
    }

    fn open_history(&mut self) {
        let Some(log) = self.player.session_log() else {
            self.message = Some("session history is unavailable".to_string());
            return;
        };
        let loaded = log
            .recent(HISTORY_LIMIT)
            .and_then(|records| Ok((records, log.summary()?)));
        match loaded {
            Ok((records, summary)) => {
                self.history_state.records = records;
                self.history_state.summary = Some(summary);
                self.history_state.scroll_offset = 0;
                self.state = AppState::History;
            }
            Err(e) => {
                warn!(error = %e, "could not read session history");
                self.message = Some(format!("could not read history: {e}"));
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent, sched: &mut impl TickScheduler) -> ExitType {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return ExitType::Quit;
        }

        match self.state {
            AppState::Player => self.handle_player_key(key, sched),
            AppState::History => self.handle_history_key(key),
        }
        ExitType::Continue
    }

    fn handle_player_key(&mut self, key: KeyEvent, sched: &mut impl TickScheduler) {
        self.message = None;
        match key.code {
            KeyCode::Char(' ') => {
                if let Err(e) = self.player.toggle_pause(sched) {
                    self.message = Some(e.to_string());
                }
            }
            KeyCode::Char('r') => self.player.reset(sched),
            KeyCode::Char('h') => self.open_history(),
            _ if self.is_free() => self.handle_editor_key(key),
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let len = self.player.exercise().phases.len();
        if len == 0 {
            return;
        }
        let selected = self.selected_phase.min(len - 1);

        let result = match key.code {
            KeyCode::Up => {
                self.selected_phase = selected.saturating_sub(1);
                Ok(())
            }
            KeyCode::Down => {
                self.selected_phase = (selected + 1).min(len - 1);
                Ok(())
            }
            KeyCode::Char('K') if selected > 0 => self
                .player
                .move_phase(selected, selected - 1)
                .map(|_| self.selected_phase = selected - 1),
            KeyCode::Char('J') if selected + 1 < len => self
                .player
                .move_phase(selected, selected + 1)
                .map(|_| self.selected_phase = selected + 1),
            KeyCode::Char('t') => self.player.toggle_phase(selected).map(|_| ()),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.player.adjust_phase_duration(selected, 1).map(|_| ())
            }
            KeyCode::Char('-') => self.player.adjust_phase_duration(selected, -1).map(|_| ()),
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.message = Some(e.to_string());
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        let state = &mut self.history_state;
        match key.code {
            KeyCode::Char('b') | KeyCode::Backspace => self.state = AppState::Player,
            KeyCode::Up => state.scroll_offset = state.scroll_offset.saturating_sub(1),
            // clamped against the table height when rendering
            KeyCode::Down => state.scroll_offset += 1,
            KeyCode::PageUp => state.scroll_offset = state.scroll_offset.saturating_sub(10),
            KeyCode::PageDown => state.scroll_offset += 10,
            KeyCode::Home => state.scroll_offset = 0,
            KeyCode::Char('1') => state.sort(SortBy::StartedAt),
            KeyCode::Char('2') => state.sort(SortBy::Exercise),
            KeyCode::Char('3') => state.sort(SortBy::Duration),
            KeyCode::Char('4') => state.sort(SortBy::Cycles),
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = FileConfigStore::new();

    if cli.is_batch() {
        logging::init_to_stderr();
        return run_batch(&cli, &mut io::stdout().lock());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        if let Err(e) = logging::init_to_file(&path) {
            eprintln!("cesizen: logging disabled ({}): {e}", path.display());
        }
    }

    let mut config = store.load();
    let exercise = match cli.resolve_exercise(&config) {
        Ok(exercise) => exercise,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };
    let tick_ms = cli.tick_ms.unwrap_or(config.guided_tick_ms);

    let mut player = Player::new(exercise, tick_ms);
    match SessionLog::new() {
        Ok(log) => player = player.with_session_log(log),
        Err(e) => warn!(error = %e, "session history disabled"),
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(player);
    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if app.is_free() {
        config.free_phases = app.player.exercise().phases.clone();
        if let Err(e) = store.save(&config) {
            warn!(path = %store.path().display(), error = %e, "could not save free phases");
        }
    }

    res
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(REDRAW_INTERVAL_MS)),
    );

    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            SessionEvent::Tick(token) => {
                app.on_tick(token, &mut runner);
            }
            SessionEvent::Key(key) => {
                if app.handle_key(key, &mut runner) == ExitType::Quit {
                    break;
                }
            }
            SessionEvent::Resize | SessionEvent::Idle => {}
        }
        terminal.draw(|f| ui(app, f))?;
    }

    // closes the open session record, if any
    app.player.reset(&mut runner);
    Ok(())
}

fn run_batch(cli: &Cli, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    if cli.list_presets {
        write_presets(out)?;
    }

    if cli.history || cli.export_history.is_some() {
        let log = SessionLog::new()?;

        if cli.history {
            write_history(&log, out)?;
        }

        if let Some(path) = &cli.export_history {
            let count = log.export_csv(File::create(path)?)?;
            writeln!(out, "exported {count} sessions to {}", path.display())?;
        }
    }

    Ok(())
}

fn write_presets(out: &mut impl Write) -> io::Result<()> {
    for preset in presets::builtin_presets() {
        let exercise = preset.exercise();
        writeln!(
            out,
            "{:<14} {:<24} {:>8}  {:>3} min",
            preset.slug,
            exercise.name,
            exercise.pattern(),
            preset.record.ex_duration
        )?;
    }
    Ok(())
}

fn write_history(log: &SessionLog, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let summary = log.summary()?;
    writeln!(
        out,
        "{} sessions, {} completed, {:.1} minutes in total",
        summary.sessions, summary.completed, summary.total_minutes
    )?;
    if let Some(mean) = summary.mean_completed_minutes {
        writeln!(out, "completed sessions last {mean:.1} minutes on average")?;
    }

    for record in log.recent(20)? {
        writeln!(
            out,
            "{}  {:<24} {:<7} {:>8} {:>4} cycles{}",
            record.started_at.format("%Y-%m-%d %H:%M"),
            record.exercise,
            record.mode,
            record
                .duration_secs()
                .map(|s| format_clock(s as u64))
                .unwrap_or_else(|| "-".to_string()),
            record.cycles,
            if record.completed { "  done" } else { "" }
        )?;
    }
    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    let screen = current_screen(&app.state);
    screen.render(app, f);
}
