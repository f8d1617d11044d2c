use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Identifies one scheduled tick. Holding it is the only way to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickToken {
    id: u64,
    delay: Duration,
}

impl TickToken {
    pub fn new(id: u64, delay: Duration) -> Self {
        Self { id, delay }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Time the tick stands for; the timer advances by this much
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Key(KeyEvent),
    Resize,
    Tick(TickToken),
    /// Nothing happened during the poll interval
    Idle,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait SessionEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<SessionEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(SessionEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => tx.send(SessionEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<SessionEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Event source plus the sender used to feed it
    pub fn channel() -> (Sender<SessionEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl SessionEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Hands out one-shot ticks and cancels them
pub trait TickScheduler {
    /// Schedule a tick `delay` from now. Any tick scheduled earlier is superseded.
    fn schedule_tick(&mut self, delay: Duration) -> TickToken;

    /// Returns true if the tick was still pending
    fn cancel_tick(&mut self, token: TickToken) -> bool;
}

#[derive(Clone, Copy, Debug)]
struct PendingTick {
    token: TickToken,
    due: Instant,
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: SessionEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    pending: Option<PendingTick>,
    next_id: u64,
}

impl<E: SessionEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            pending: None,
            next_id: 1,
        }
    }

    pub fn pending_tick(&self) -> Option<TickToken> {
        self.pending.map(|p| p.token)
    }

    /// Blocks until the next event, the pending tick's deadline, or the poll interval.
    /// A tick that is already due wins over queued input.
    pub fn step(&mut self) -> SessionEvent {
        if let Some(token) = self.take_due(Instant::now()) {
            return SessionEvent::Tick(token);
        }

        let timeout = match self.pending {
            Some(p) => p
                .due
                .saturating_duration_since(Instant::now())
                .min(self.ticker.interval()),
            None => self.ticker.interval(),
        };

        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => return ev,
            Err(RecvTimeoutError::Timeout) => {}
            // input thread is gone and the channel returns at once
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(timeout),
        }
        self.take_due(Instant::now())
            .map(SessionEvent::Tick)
            .unwrap_or(SessionEvent::Idle)
    }

    fn take_due(&mut self, now: Instant) -> Option<TickToken> {
        match self.pending {
            Some(p) if now >= p.due => {
                self.pending = None;
                Some(p.token)
            }
            _ => None,
        }
    }
}

impl<E: SessionEventSource, T: Ticker> TickScheduler for Runner<E, T> {
    fn schedule_tick(&mut self, delay: Duration) -> TickToken {
        let token = TickToken::new(self.next_id, delay);
        self.next_id += 1;
        self.pending = Some(PendingTick {
            token,
            due: Instant::now() + delay,
        });
        token
    }

    fn cancel_tick(&mut self, token: TickToken) -> bool {
        match self.pending {
            Some(p) if p.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}
