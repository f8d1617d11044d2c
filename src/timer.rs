use std::time::Duration;

use tracing::debug;

use crate::error::TimerError;
use crate::phase::{self, Phase, PhaseKind};
use crate::session::{SessionState, TickGranularity, TimerSettings, TimerStatus};

/// Transitions reported by [`PhaseTimer::start`] and [`PhaseTimer::tick`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    PhaseStarted { index: usize, kind: PhaseKind },
    CycleCompleted { cycles: u64 },
    Completed { cycles: u64 },
}

/// Drives a repeating sequence of timed phases.
///
/// The timer owns its phase configuration and the runtime [`SessionState`].
/// It never schedules anything itself: the owner calls [`PhaseTimer::tick`]
/// with the time that passed and reads the progress back for rendering.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    phases: Vec<Phase>,
    total_duration_secs: Option<u64>,
    settings: TimerSettings,
    // enabled phases, in order; only changes while the session is inactive
    active: Vec<usize>,
    state: SessionState,
}

impl PhaseTimer {
    pub fn new(
        phases: Vec<Phase>,
        total_duration_secs: Option<u64>,
        settings: TimerSettings,
    ) -> Self {
        let active = phase::enabled_indices(&phases);
        Self {
            phases,
            total_duration_secs,
            settings,
            active,
            state: SessionState::default(),
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    pub fn total_duration_secs(&self) -> Option<u64> {
        self.total_duration_secs
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms
    }

    pub fn phase_elapsed_ms(&self) -> u64 {
        self.state.phase_elapsed_ms
    }

    pub fn cycle_count(&self) -> u64 {
        self.state.cycle_count
    }

    /// Index into the enabled phases
    pub fn current_phase_index(&self) -> usize {
        self.state.current_phase_index
    }

    /// Index of the current phase in the full configuration list
    pub fn current_config_index(&self) -> Option<usize> {
        self.active.get(self.state.current_phase_index).copied()
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.current_config_index().map(|i| &self.phases[i])
    }

    pub fn enabled_count(&self) -> usize {
        self.active.len()
    }

    pub fn cycle_duration_secs(&self) -> u64 {
        phase::cycle_duration_secs(&self.phases)
    }

    /// Whole cycles that fit in the duration budget; `None` when unbounded
    pub fn total_cycles(&self) -> Option<u64> {
        let total = self.total_duration_secs?;
        match self.cycle_duration_secs() {
            0 => Some(0),
            cycle => Some(total / cycle),
        }
    }

    /// Starts a fresh session and reports entry into its first phase
    pub fn start(&mut self) -> Result<TimerEvent, TimerError> {
        phase::validate(&self.phases)?;
        self.active = phase::enabled_indices(&self.phases);
        let kind = self
            .active
            .first()
            .map(|&i| self.phases[i].kind)
            .ok_or(TimerError::NoEnabledPhase)?;
        self.state = SessionState {
            status: TimerStatus::Running,
            ..SessionState::default()
        };
        debug!(
            phases = self.active.len(),
            total_cycles = ?self.total_cycles(),
            "phase timer started"
        );
        Ok(TimerEvent::PhaseStarted { index: 0, kind })
    }

    /// Returns true if the timer was running
    pub fn pause(&mut self) -> bool {
        if self.state.status != TimerStatus::Running {
            return false;
        }
        self.state.status = TimerStatus::Paused;
        true
    }

    /// Returns true if the timer was paused
    pub fn resume(&mut self) -> bool {
        if self.state.status != TimerStatus::Paused {
            return false;
        }
        self.state.status = TimerStatus::Running;
        true
    }

    pub fn reset(&mut self) {
        self.state = SessionState::default();
    }

    pub fn tick(&mut self, delta_ms: u64) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if self.state.status != TimerStatus::Running {
            return events;
        }
        let Some(phase_ms) = self.current_phase().map(Phase::duration_ms) else {
            return events;
        };

        self.state.elapsed_ms = self.state.elapsed_ms.saturating_add(delta_ms);
        self.state.phase_elapsed_ms = self.state.phase_elapsed_ms.saturating_add(delta_ms);

        if self.state.phase_elapsed_ms >= phase_ms {
            self.state.phase_elapsed_ms = 0;
            let total_cycles = self.total_cycles();
            let is_last = self.state.current_phase_index + 1 >= self.active.len();

            if is_last {
                self.state.cycle_count += 1;
                events.push(TimerEvent::CycleCompleted {
                    cycles: self.state.cycle_count,
                });
                if total_cycles.is_some_and(|total| self.state.cycle_count >= total) {
                    self.complete(&mut events);
                    return events;
                }
                self.state.current_phase_index = 0;
            } else if total_cycles == Some(0) {
                // budget shorter than one cycle
                self.complete(&mut events);
                return events;
            } else {
                self.state.current_phase_index += 1;
            }

            if let Some(phase) = self.current_phase() {
                events.push(TimerEvent::PhaseStarted {
                    index: self.state.current_phase_index,
                    kind: phase.kind,
                });
            }
        }

        if self.settings.duration_ceiling {
            if let Some(total) = self.total_duration_secs {
                if self.state.elapsed_ms >= total.saturating_mul(1000) {
                    self.complete(&mut events);
                }
            }
        }

        events
    }

    fn complete(&mut self, events: &mut Vec<TimerEvent>) {
        if self.state.completed {
            return;
        }
        self.state.completed = true;
        self.state.status = TimerStatus::Completed;
        events.push(TimerEvent::Completed {
            cycles: self.state.cycle_count,
        });
        debug!(
            cycles = self.state.cycle_count,
            elapsed_ms = self.state.elapsed_ms,
            "phase timer completed"
        );
    }

    /// Percentage of the current phase already elapsed, in [0, 100]
    pub fn progress(&self) -> f64 {
        match self.current_phase().map(Phase::duration_ms) {
            Some(phase_ms) if phase_ms > 0 => {
                (self.state.phase_elapsed_ms as f64 / phase_ms as f64 * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }

    pub fn remaining_phase_secs(&self) -> u64 {
        self.current_phase()
            .map(|p| {
                p.duration_ms()
                    .saturating_sub(self.state.phase_elapsed_ms)
                    .div_ceil(1000)
            })
            .unwrap_or(0)
    }

    pub fn remaining_session_secs(&self) -> Option<u64> {
        self.total_duration_secs.map(|total| {
            total
                .saturating_mul(1000)
                .saturating_sub(self.state.elapsed_ms)
                .div_ceil(1000)
        })
    }

    /// Delay before the next tick should be delivered
    pub fn next_tick_interval(&self) -> Duration {
        let ms = match self.settings.granularity {
            TickGranularity::Fixed(ms) => ms,
            TickGranularity::PercentOfPhase => self
                .current_phase()
                .map(|p| p.duration_ms() / 100)
                .unwrap_or(10),
        };
        Duration::from_millis(ms.max(1))
    }

    fn ensure_editable(&self) -> Result<(), TimerError> {
        if self.state.is_active() {
            Err(TimerError::SessionActive)
        } else {
            Ok(())
        }
    }

    fn after_edit(&mut self) {
        self.active = phase::enabled_indices(&self.phases);
        if self.state.status == TimerStatus::Completed {
            self.state = SessionState::default();
        }
    }

    pub fn move_phase(&mut self, from: usize, to: usize) -> Result<(), TimerError> {
        self.ensure_editable()?;
        phase::move_phase(&mut self.phases, from, to)?;
        self.after_edit();
        Ok(())
    }

    pub fn toggle_phase(&mut self, index: usize) -> Result<bool, TimerError> {
        self.ensure_editable()?;
        let enabled = phase::toggle_phase(&mut self.phases, index)?;
        self.after_edit();
        Ok(enabled)
    }

    pub fn set_phase_duration(&mut self, index: usize, secs: u32) -> Result<(), TimerError> {
        self.ensure_editable()?;
        phase::set_phase_duration(&mut self.phases, index, secs)?;
        self.after_edit();
        Ok(())
    }

    pub fn adjust_phase_duration(&mut self, index: usize, delta: i32) -> Result<u32, TimerError> {
        self.ensure_editable()?;
        let secs = phase::adjust_phase_duration(&mut self.phases, index, delta)?;
        self.after_edit();
        Ok(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn guided(durations: &[u32], total_secs: Option<u64>) -> PhaseTimer {
        let kinds = [PhaseKind::Inhale, PhaseKind::HoldAfterInhale, PhaseKind::Exhale];
        let phases = durations
            .iter()
            .zip(kinds)
            .map(|(&d, k)| Phase::new(k, d))
            .collect();
        PhaseTimer::new(phases, total_secs, TimerSettings::guided(50))
    }

    fn tick_secs(timer: &mut PhaseTimer, secs: u64) -> Vec<TimerEvent> {
        (0..secs).flat_map(|_| timer.tick(1000)).collect()
    }

    #[test]
    fn test_new_timer_is_idle() {
        let timer = guided(&[4, 4, 4], Some(24));
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.cycle_duration_secs(), 12);
        assert_eq!(timer.total_cycles(), Some(2));
        assert_eq!(timer.current_phase().unwrap().kind, PhaseKind::Inhale);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn test_tick_ignored_before_start() {
        let mut timer = guided(&[4, 4, 4], Some(24));
        assert!(timer.tick(1000).is_empty());
        assert_eq!(timer.elapsed_ms(), 0);
    }

    #[test]
    fn test_four_four_four_over_twenty_four_seconds() {
        let mut timer = guided(&[4, 4, 4], Some(24));
        timer.start().unwrap();

        tick_secs(&mut timer, 12);
        assert_eq!(timer.cycle_count(), 1);
        assert_eq!(timer.current_phase_index(), 0);
        assert!(!timer.is_completed());

        let events = tick_secs(&mut timer, 12);
        assert!(timer.is_completed());
        assert_eq!(timer.cycle_count(), 2);
        assert_eq!(timer.status(), TimerStatus::Completed);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, TimerEvent::Completed { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_start_reports_first_enabled_phase() {
        let mut timer = PhaseTimer::new(
            vec![
                Phase::new(PhaseKind::Inhale, 3).disabled(),
                Phase::new(PhaseKind::Exhale, 5),
            ],
            None,
            TimerSettings::free(),
        );
        assert_eq!(
            timer.start(),
            Ok(TimerEvent::PhaseStarted {
                index: 0,
                kind: PhaseKind::Exhale
            })
        );

        // the wrap back into the first phase is reported the same way
        let events = tick_secs(&mut timer, 5);
        assert!(events.contains(&TimerEvent::PhaseStarted {
            index: 0,
            kind: PhaseKind::Exhale
        }));
    }

    #[test]
    fn test_one_cycle_returns_to_first_phase() {
        let mut timer = PhaseTimer::new(
            vec![
                Phase::new(PhaseKind::Inhale, 3),
                Phase::new(PhaseKind::HoldAfterInhale, 2).disabled(),
                Phase::new(PhaseKind::Exhale, 5),
                Phase::new(PhaseKind::HoldAfterExhale, 1),
            ],
            None,
            TimerSettings::free(),
        );
        timer.start().unwrap();

        tick_secs(&mut timer, 9);
        assert_eq!(timer.cycle_count(), 1);
        assert_eq!(timer.current_phase_index(), 0);
        assert_eq!(timer.current_phase().unwrap().kind, PhaseKind::Inhale);

        tick_secs(&mut timer, 90);
        assert_eq!(timer.cycle_count(), 11);
        assert!(!timer.is_completed());
    }

    #[test]
    fn test_phase_events_follow_enabled_order() {
        let mut timer = guided(&[1, 1, 1], None);
        timer.start().unwrap();

        let events = tick_secs(&mut timer, 3);
        assert_eq!(
            events,
            vec![
                TimerEvent::PhaseStarted {
                    index: 1,
                    kind: PhaseKind::HoldAfterInhale
                },
                TimerEvent::PhaseStarted {
                    index: 2,
                    kind: PhaseKind::Exhale
                },
                TimerEvent::CycleCompleted { cycles: 1 },
                TimerEvent::PhaseStarted {
                    index: 0,
                    kind: PhaseKind::Inhale
                },
            ]
        );
    }

    #[test]
    fn test_progress_monotonic_then_resets() {
        let mut timer = guided(&[2, 2, 2], None);
        timer.start().unwrap();

        let mut last = timer.progress();
        for _ in 0..39 {
            timer.tick(50);
            let now = timer.progress();
            assert!(now >= last, "progress went backwards: {last} -> {now}");
            last = now;
        }
        assert!(last > 90.0);

        timer.tick(50);
        assert_eq!(timer.current_phase_index(), 1);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn test_remaining_phase_secs() {
        let mut timer = guided(&[4, 4, 4], None);
        timer.start().unwrap();
        assert_eq!(timer.remaining_phase_secs(), 4);

        timer.tick(1);
        assert_eq!(timer.remaining_phase_secs(), 4);

        timer.tick(999);
        assert_eq!(timer.remaining_phase_secs(), 3);

        timer.tick(2999);
        assert_eq!(timer.remaining_phase_secs(), 1);
    }

    #[test]
    fn test_budget_shorter_than_one_cycle() {
        let mut timer = guided(&[4, 4, 4], Some(6));
        assert_eq!(timer.total_cycles(), Some(0));
        timer.start().unwrap();

        tick_secs(&mut timer, 4);
        assert!(timer.is_completed());
        assert_eq!(timer.cycle_count(), 0);

        tick_secs(&mut timer, 20);
        assert_eq!(timer.cycle_count(), 0);
    }

    #[test]
    fn test_zero_budget_completes_on_first_tick() {
        let mut timer = guided(&[4, 4, 4], Some(0));
        timer.start().unwrap();

        let events = timer.tick(50);
        assert!(timer.is_completed());
        assert_eq!(events, vec![TimerEvent::Completed { cycles: 0 }]);
    }

    #[test]
    fn test_budget_with_remainder_stops_after_whole_cycles() {
        // 25s budget, 12s cycles: two whole cycles fit
        let mut timer = guided(&[4, 4, 4], Some(25));
        timer.start().unwrap();

        tick_secs(&mut timer, 23);
        assert!(!timer.is_completed());
        tick_secs(&mut timer, 1);
        assert!(timer.is_completed());
        assert_eq!(timer.cycle_count(), 2);
    }

    #[test]
    fn test_ceiling_mid_phase() {
        let mut timer = PhaseTimer::new(
            vec![Phase::new(PhaseKind::Inhale, 10)],
            Some(3),
            TimerSettings::guided(50),
        );
        timer.start().unwrap();

        tick_secs(&mut timer, 3);
        assert!(timer.is_completed());
        assert_eq!(timer.phase_elapsed_ms(), 3000);
        assert_eq!(timer.progress(), 30.0);
    }

    #[test]
    fn test_without_ceiling_waits_for_phase_boundary() {
        let mut timer = PhaseTimer::new(
            vec![Phase::new(PhaseKind::Inhale, 10)],
            Some(3),
            TimerSettings {
                duration_ceiling: false,
                ..TimerSettings::guided(50)
            },
        );
        timer.start().unwrap();

        tick_secs(&mut timer, 3);
        assert!(!timer.is_completed());
        tick_secs(&mut timer, 7);
        assert!(timer.is_completed());
        assert_eq!(timer.cycle_count(), 1);
    }

    #[test]
    fn test_start_rejects_no_enabled_phase() {
        let mut timer = PhaseTimer::new(
            vec![Phase::new(PhaseKind::Inhale, 4).disabled()],
            None,
            TimerSettings::free(),
        );
        assert_eq!(timer.start(), Err(TimerError::NoEnabledPhase));
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn test_start_rejects_zero_duration() {
        let mut timer = guided(&[4, 0, 4], None);
        assert_matches!(timer.start(), Err(TimerError::ZeroDuration { index: 1 }));
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let mut timer = guided(&[4, 4, 4], None);
        assert!(!timer.pause());

        timer.start().unwrap();
        timer.tick(1500);
        let before = timer.state().clone();

        assert!(timer.pause());
        assert!(!timer.pause());
        assert!(timer.tick(1000).is_empty());
        assert!(timer.resume());
        assert!(!timer.resume());

        assert_eq!(timer.phase_elapsed_ms(), before.phase_elapsed_ms);
        assert_eq!(timer.current_phase_index(), before.current_phase_index);
        assert_eq!(timer.status(), TimerStatus::Running);
    }

    #[test]
    fn test_reset_zeroes_runtime_state() {
        let mut timer = guided(&[1, 1, 1], Some(3));
        timer.start().unwrap();
        tick_secs(&mut timer, 3);
        assert!(timer.is_completed());

        timer.reset();
        assert_eq!(timer.cycle_count(), 0);
        assert_eq!(timer.phase_elapsed_ms(), 0);
        assert_eq!(timer.current_phase_index(), 0);
        assert!(!timer.is_completed());
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.phases().len(), 3);
    }

    #[test]
    fn test_restart_from_running() {
        let mut timer = guided(&[1, 1, 1], None);
        timer.start().unwrap();
        tick_secs(&mut timer, 4);
        assert_eq!(timer.cycle_count(), 1);

        timer.start().unwrap();
        assert_eq!(timer.cycle_count(), 0);
        assert_eq!(timer.elapsed_ms(), 0);
    }

    #[test]
    fn test_editing_rejected_while_active() {
        let mut timer = guided(&[4, 4, 4], None);
        timer.start().unwrap();
        assert_eq!(timer.move_phase(0, 1), Err(TimerError::SessionActive));
        assert_eq!(timer.toggle_phase(1), Err(TimerError::SessionActive));

        timer.pause();
        assert_eq!(
            timer.set_phase_duration(0, 5),
            Err(TimerError::SessionActive)
        );
        assert_eq!(
            timer.adjust_phase_duration(0, 1),
            Err(TimerError::SessionActive)
        );

        timer.reset();
        assert!(timer.move_phase(0, 1).is_ok());
        assert_eq!(timer.phases()[1].kind, PhaseKind::Inhale);
    }

    #[test]
    fn test_disable_then_reenable_restores_rotation() {
        let mut timer = guided(&[1, 1, 1], None);
        timer.toggle_phase(1).unwrap();
        timer.start().unwrap();
        let events = tick_secs(&mut timer, 1);
        assert_eq!(
            events,
            vec![TimerEvent::PhaseStarted {
                index: 1,
                kind: PhaseKind::Exhale
            }]
        );

        timer.reset();
        timer.toggle_phase(1).unwrap();
        timer.start().unwrap();
        let events = tick_secs(&mut timer, 1);
        assert_eq!(
            events,
            vec![TimerEvent::PhaseStarted {
                index: 1,
                kind: PhaseKind::HoldAfterInhale
            }]
        );
    }

    #[test]
    fn test_edit_after_completion_returns_to_idle() {
        let mut timer = guided(&[1, 1, 1], Some(3));
        timer.start().unwrap();
        tick_secs(&mut timer, 3);
        assert!(timer.is_completed());

        timer.toggle_phase(0).unwrap();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.current_phase().unwrap().kind, PhaseKind::HoldAfterInhale);
    }

    #[test]
    fn test_next_tick_interval() {
        let timer = guided(&[4, 4, 4], None);
        assert_eq!(timer.next_tick_interval(), Duration::from_millis(50));

        let free = PhaseTimer::new(
            vec![Phase::new(PhaseKind::Inhale, 5)],
            None,
            TimerSettings::free(),
        );
        assert_eq!(free.next_tick_interval(), Duration::from_millis(50));

        let free = PhaseTimer::new(
            vec![Phase::new(PhaseKind::Inhale, 30)],
            None,
            TimerSettings::free(),
        );
        assert_eq!(free.next_tick_interval(), Duration::from_millis(300));
    }

    #[test]
    fn test_free_granularity_reaches_boundary_in_hundred_ticks() {
        let mut timer = PhaseTimer::new(
            vec![
                Phase::new(PhaseKind::Inhale, 2),
                Phase::new(PhaseKind::Exhale, 3),
            ],
            None,
            TimerSettings::free(),
        );
        timer.start().unwrap();
        for _ in 0..99 {
            let delta = timer.next_tick_interval().as_millis() as u64;
            timer.tick(delta);
        }
        assert_eq!(timer.current_phase_index(), 0);

        let delta = timer.next_tick_interval().as_millis() as u64;
        timer.tick(delta);
        assert_eq!(timer.current_phase_index(), 1);
    }

    #[test]
    fn test_remaining_session_secs() {
        let mut timer = guided(&[4, 4, 4], Some(24));
        timer.start().unwrap();
        timer.tick(1500);
        assert_eq!(timer.remaining_session_secs(), Some(23));

        let free = guided(&[4, 4, 4], None);
        assert_eq!(free.remaining_session_secs(), None);
    }
}
