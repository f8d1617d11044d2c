use ratatui::Frame;

use crate::{ui::history::render_history, App, AppState};

/// A UI Screen boundary: one per application state
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
}

/// Player screen: phase, progress, cycles and the free editor
pub struct PlayerScreen;

impl Screen for PlayerScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_history(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Player => Box::new(PlayerScreen),
        AppState::History => Box::new(HistoryScreen),
    }
}
