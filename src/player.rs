use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::TimerError;
use crate::exercise::Exercise;
use crate::history::SessionLog;
use crate::phase;
use crate::runtime::{TickScheduler, TickToken};
use crate::session::TimerStatus;
use crate::timer::{PhaseTimer, TimerEvent};

/// Owner of a [`PhaseTimer`]: keeps the pending tick token, reschedules after
/// every processed tick and reports session start/end to the session log.
#[derive(Debug)]
pub struct Player {
    exercise: Exercise,
    timer: PhaseTimer,
    pending: Option<TickToken>,
    session_log: Option<SessionLog>,
    interaction_id: Option<i64>,
}

impl Player {
    pub fn new(exercise: Exercise, guided_tick_ms: u64) -> Self {
        let timer = exercise.timer(guided_tick_ms);
        Self {
            exercise,
            timer,
            pending: None,
            session_log: None,
            interaction_id: None,
        }
    }

    pub fn with_session_log(mut self, log: SessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    pub fn timer(&self) -> &PhaseTimer {
        &self.timer
    }

    pub fn session_log(&self) -> Option<&SessionLog> {
        self.session_log.as_ref()
    }

    pub fn pending_tick(&self) -> Option<TickToken> {
        self.pending
    }

    /// Id of the open session record, if any
    pub fn interaction_id(&self) -> Option<i64> {
        self.interaction_id
    }

    /// Starts (or restarts) the session and schedules its first tick
    pub fn start(&mut self, sched: &mut impl TickScheduler) -> Result<(), TimerError> {
        phase::validate(self.timer.phases())?;

        self.cancel_pending(sched);
        self.close_interaction(false);
        self.timer.start()?;
        self.schedule_next(sched);
        self.open_interaction();

        info!(
            exercise = %self.exercise.name,
            mode = %self.exercise.mode,
            pattern = %self.exercise.pattern(),
            "session started"
        );
        Ok(())
    }

    pub fn pause(&mut self, sched: &mut impl TickScheduler) -> bool {
        if !self.timer.pause() {
            return false;
        }
        self.cancel_pending(sched);
        debug!(elapsed_ms = self.timer.elapsed_ms(), "session paused");
        true
    }

    pub fn resume(&mut self, sched: &mut impl TickScheduler) -> bool {
        if !self.timer.resume() {
            return false;
        }
        self.schedule_next(sched);
        debug!(elapsed_ms = self.timer.elapsed_ms(), "session resumed");
        true
    }

    /// Space-bar behaviour: start when idle or finished, otherwise pause/resume
    pub fn toggle_pause(&mut self, sched: &mut impl TickScheduler) -> Result<TimerStatus, TimerError> {
        match self.timer.status() {
            TimerStatus::Idle | TimerStatus::Completed => self.start(sched)?,
            TimerStatus::Running => {
                self.pause(sched);
            }
            TimerStatus::Paused => {
                self.resume(sched);
            }
        }
        Ok(self.timer.status())
    }

    pub fn reset(&mut self, sched: &mut impl TickScheduler) {
        self.cancel_pending(sched);
        if self.interaction_id.is_some() {
            info!(
                exercise = %self.exercise.name,
                cycles = self.timer.cycle_count(),
                "session stopped"
            );
        }
        self.close_interaction(false);
        self.timer.reset();
    }

    /// Applies a delivered tick. Ticks other than the pending one are stale and ignored.
    pub fn on_tick(&mut self, token: TickToken, sched: &mut impl TickScheduler) -> Vec<TimerEvent> {
        if self.pending != Some(token) {
            debug!(tick = token.id(), "dropping stale tick");
            return Vec::new();
        }
        self.pending = None;

        let events = self.timer.tick(token.delay().as_millis() as u64);

        if self.timer.status() == TimerStatus::Running {
            self.schedule_next(sched);
        }

        if let Some(TimerEvent::Completed { cycles }) = events
            .iter()
            .find(|e| matches!(e, TimerEvent::Completed { .. }))
        {
            info!(
                exercise = %self.exercise.name,
                cycles,
                elapsed_ms = self.timer.elapsed_ms(),
                "session completed"
            );
            self.close_interaction(true);
        }

        events
    }

    pub fn move_phase(&mut self, from: usize, to: usize) -> Result<(), TimerError> {
        self.timer.move_phase(from, to)?;
        self.sync_phases();
        Ok(())
    }

    pub fn toggle_phase(&mut self, index: usize) -> Result<bool, TimerError> {
        let enabled = self.timer.toggle_phase(index)?;
        self.sync_phases();
        Ok(enabled)
    }

    pub fn set_phase_duration(&mut self, index: usize, secs: u32) -> Result<(), TimerError> {
        self.timer.set_phase_duration(index, secs)?;
        self.sync_phases();
        Ok(())
    }

    pub fn adjust_phase_duration(&mut self, index: usize, delta: i32) -> Result<u32, TimerError> {
        let secs = self.timer.adjust_phase_duration(index, delta)?;
        self.sync_phases();
        Ok(secs)
    }

    fn sync_phases(&mut self) {
        self.exercise.phases = self.timer.phases().to_vec();
    }

    fn schedule_next(&mut self, sched: &mut impl TickScheduler) {
        self.pending = Some(sched.schedule_tick(self.timer.next_tick_interval()));
    }

    fn cancel_pending(&mut self, sched: &mut impl TickScheduler) {
        if let Some(token) = self.pending.take() {
            sched.cancel_tick(token);
        }
    }

    fn open_interaction(&mut self) {
        let Some(log) = &self.session_log else {
            return;
        };
        match log.record_start(&self.exercise.name, self.exercise.mode, Local::now()) {
            Ok(id) => self.interaction_id = Some(id),
            Err(e) => warn!(error = %e, "could not record session start"),
        }
    }

    fn close_interaction(&mut self, completed: bool) {
        let Some(id) = self.interaction_id.take() else {
            return;
        };
        if let Some(log) = &self.session_log {
            if let Err(e) = log.record_end(id, Local::now(), self.timer.cycle_count(), completed) {
                warn!(error = %e, interaction = id, "could not record session end");
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close_interaction(false);
    }
}
