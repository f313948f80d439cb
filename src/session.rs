//! Session management
//!
//! A session owns one console and one dispatcher and drives them from idle
//! ticks. Within a tick the order is fixed:
//!
//! ```text
//! blink tick -> indicator refresh -> pending commit -> queued opcode calls
//! ```
//!
//! Indicator refresh itself runs carrier event, flash refresh, spinner, idle digits.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::{Console, IndicatorLayout, ScreenError, StagingError};
use crate::dispatch::scanner::{self, ScanError, Segment};
use crate::dispatch::{AmpCall, DispatchError, Dispatcher, OpcodeTable, SessionTable};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Screen(#[from] ScreenError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

bitflags! {
    /// What happened during one tick
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TickEvents: u16 {
        const BLINK       = 1 << 0;
        const CARRIER     = 1 << 1;
        const FLASH       = 1 << 2;
        const SPINNER     = 1 << 3;
        const IDLE_DIGITS = 1 << 4;
        const COMMIT      = 1 << 5;
        const DISPATCH    = 1 << 6;
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub events: TickEvents,
    pub errors: Vec<SessionError>,
}

/// Geometry, layout and timing for new sessions
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub cols: u16,
    pub rows: u16,
    pub background: u8,
    pub overlay_row: u16,
    pub fill_colour: u8,
    pub layout: IndicatorLayout,
    pub blink_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cols: 40,
            rows: 25,
            background: 6,
            overlay_row: 24,
            fill_colour: 1,
            layout: IndicatorLayout::default(),
            blink_interval: Duration::from_millis(200),
        }
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Turns elapsed wall time into blink ticks and idle seconds
#[derive(Debug, Clone)]
struct IdleClock {
    blink_interval: Duration,
    blink_accum: Duration,
    idle: Duration,
    shown_second: Option<u64>,
}

impl IdleClock {
    fn new(blink_interval: Duration) -> Self {
        Self {
            blink_interval,
            blink_accum: Duration::ZERO,
            idle: Duration::ZERO,
            shown_second: None,
        }
    }

    /// Add `dt`; returns how many blink ticks fell due
    fn advance(&mut self, dt: Duration) -> u64 {
        self.idle = self.idle.saturating_add(dt);
        if self.blink_interval.is_zero() {
            return 1;
        }
        self.blink_accum = self.blink_accum.saturating_add(dt);
        let interval = self.blink_interval.as_nanos();
        let accum = self.blink_accum.as_nanos();
        let rem = accum % interval;
        self.blink_accum = Duration::new((rem / NANOS_PER_SEC) as u64, (rem % NANOS_PER_SEC) as u32);
        u64::try_from(accum / interval).unwrap_or(u64::MAX)
    }

    fn idle_seconds(&self) -> u64 {
        self.idle.as_secs()
    }

    /// Whole-second count not yet shown, if it changed
    fn take_new_second(&mut self) -> Option<u64> {
        let secs = self.idle_seconds();
        if self.shown_second == Some(secs) {
            return None;
        }
        self.shown_second = Some(secs);
        Some(secs)
    }

    fn reset_idle(&mut self) {
        self.idle = Duration::ZERO;
    }
}

/// Result of running one source line
#[derive(Debug, Default)]
pub struct LineOutcome {
    /// Calls dispatched, including failed ones
    pub calls: usize,
    /// Non-call text, per statement, for the regular evaluator
    pub text: Vec<String>,
    pub errors: Vec<DispatchError>,
}

/// A caller session
pub struct Session {
    /// Session ID
    pub id: u64,
    pub console: Console,
    dispatcher: Dispatcher,
    options: SessionOptions,
    clock: IdleClock,
    pending_commit: bool,
    pending_carrier: Option<bool>,
    queue: VecDeque<AmpCall>,
    running: bool,
}

impl Session {
    /// Create a new session
    pub fn new(id: u64, base: Arc<OpcodeTable>, options: SessionOptions) -> Result<Self, SessionError> {
        let console = Console::new(
            options.cols,
            options.rows,
            options.background,
            options.overlay_row,
            options.fill_colour,
            options.layout.clone(),
        )?;
        info!("Session {} started ({}x{})", id, options.cols, options.rows);
        Ok(Self {
            id,
            console,
            dispatcher: Dispatcher::new(base),
            clock: IdleClock::new(options.blink_interval),
            options,
            pending_commit: false,
            pending_carrier: None,
            queue: VecDeque::new(),
            running: true,
        })
    }

    /// Check if session is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        if self.running {
            info!("Session {} stopped", self.id);
        }
        self.running = false;
    }

    /// Reset console state and queues; session overrides are kept
    pub fn restart(&mut self) -> Result<(), SessionError> {
        self.console
            .reset(self.options.background, self.options.fill_colour)?;
        self.clock = IdleClock::new(self.options.blink_interval);
        self.pending_commit = false;
        self.pending_carrier = None;
        self.queue.clear();
        self.running = true;
        info!("Session {} restarted", self.id);
        Ok(())
    }

    pub fn table(&self) -> &SessionTable {
        self.dispatcher.table()
    }

    /// Session-local opcode overrides
    pub fn table_mut(&mut self) -> &mut SessionTable {
        self.dispatcher.table_mut()
    }

    pub fn idle_seconds(&self) -> u64 {
        self.clock.idle_seconds()
    }

    /// User input arrived; restart the idle timer
    pub fn note_activity(&mut self) {
        self.clock.reset_idle();
    }

    /// Commit the masked pane during the next tick
    pub fn request_commit(&mut self) {
        self.pending_commit = true;
    }

    /// Carrier transition from the transport, applied during the next tick
    pub fn carrier_event(&mut self, connected: bool) {
        self.pending_carrier = Some(connected);
    }

    /// Queue a call for the dispatch phase of the next tick
    pub fn enqueue_call(&mut self, call: AmpCall) {
        self.queue.push_back(call);
    }

    pub fn queued_calls(&self) -> usize {
        self.queue.len()
    }

    /// Dispatch immediately.
    ///
    /// Errors are logged and returned; a fatal handler error stops the session.
    pub fn call(&mut self, opcode: u8, arg1: u8, arg2: u8) -> Result<(), DispatchError> {
        let result = self.dispatcher.call(&mut self.console, opcode, arg1, arg2);
        if let Err(e) = &result {
            warn!("Session {}: {}", self.id, e);
            if e.is_fatal() {
                self.stop();
            }
        }
        result
    }

    /// Scan a source line and dispatch its calls in order.
    ///
    /// Statements run left to right and each call is dispatched as soon as it
    /// is scanned. A scan error aborts the rest of the line, as does a fatal
    /// handler error; calls before it have already run.
    pub fn run_line(&mut self, line: &str) -> Result<LineOutcome, ScanError> {
        let mut outcome = LineOutcome::default();
        for statement in scanner::split_statements(line) {
            let mut text = String::new();
            for segment in scanner::Scanner::new(statement) {
                match segment? {
                    Segment::Text(t) => text.push_str(t),
                    Segment::Call(call) => {
                        if !self.running {
                            return Ok(outcome);
                        }
                        outcome.calls += 1;
                        if let Err(e) = self.call(call.opcode, call.arg1, call.arg2) {
                            outcome.errors.push(e);
                        }
                    }
                }
            }
            if !text.trim().is_empty() {
                outcome.text.push(text);
            }
        }
        Ok(outcome)
    }

    /// Advance the session by `dt` of wall time
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let mut report = TickReport::default();
        if !self.running {
            return report;
        }

        let due = self.clock.advance(dt);
        if due > 0 {
            self.console.blink.advance(due);
            report.events |= TickEvents::BLINK;
        }

        self.refresh_indicators(&mut report);

        if std::mem::take(&mut self.pending_commit) {
            match self.console.commit() {
                Ok(()) => report.events |= TickEvents::COMMIT,
                Err(e) => {
                    warn!("Session {}: commit failed: {}", self.id, e);
                    report.errors.push(e.into());
                }
            }
        }

        while let Some(call) = self.queue.pop_front() {
            report.events |= TickEvents::DISPATCH;
            if let Err(e) = self.call(call.opcode, call.arg1, call.arg2) {
                report.errors.push(e.into());
            }
            if !self.running {
                self.queue.clear();
                break;
            }
        }

        report
    }

    fn refresh_indicators(&mut self, report: &mut TickReport) {
        let mut record = |result: Result<(), ScreenError>, event: TickEvents| match result {
            Ok(()) => report.events |= event,
            Err(e) => report.errors.push(e.into()),
        };

        if let Some(connected) = self.pending_carrier.take() {
            record(self.console.set_carrier(connected), TickEvents::CARRIER);
        }
        match self.console.refresh_flash() {
            Ok(true) => record(Ok(()), TickEvents::FLASH),
            Ok(false) => {}
            Err(e) => record(Err(e), TickEvents::FLASH),
        }
        record(self.console.advance_spinner(), TickEvents::SPINNER);
        if let Some(secs) = self.clock.take_new_second() {
            let secs = u32::try_from(secs).unwrap_or(u32::MAX);
            record(self.console.update_idle_digits(secs), TickEvents::IDLE_DIGITS);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Session manager for multiple sessions sharing one base opcode table
pub struct SessionManager {
    base: Arc<OpcodeTable>,
    options: SessionOptions,
    sessions: Vec<Session>,
    next_id: u64,
    active_session: Option<usize>,
}

impl SessionManager {
    pub fn new(base: Arc<OpcodeTable>, options: SessionOptions) -> Self {
        Self {
            base,
            options,
            sessions: Vec::new(),
            next_id: 1,
            active_session: None,
        }
    }

    /// Create a new session
    pub fn create_session(&mut self) -> Result<&mut Session, SessionError> {
        let id = self.next_id;
        let session = Session::new(id, Arc::clone(&self.base), self.options.clone())?;
        self.next_id += 1;
        self.sessions.push(session);

        let index = self.sessions.len() - 1;
        if self.active_session.is_none() {
            self.active_session = Some(index);
        }
        Ok(&mut self.sessions[index])
    }

    /// Get the active session
    pub fn active(&self) -> Option<&Session> {
        self.active_session.and_then(|i| self.sessions.get(i))
    }

    /// Get the active session mutably
    pub fn active_mut(&mut self) -> Option<&mut Session> {
        self.active_session.and_then(|i| self.sessions.get_mut(i))
    }

    /// Set active session by index
    pub fn set_active(&mut self, index: usize) {
        if index < self.sessions.len() {
            self.active_session = Some(index);
        }
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Get all sessions
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Remove a session by index
    pub fn remove_session(&mut self, index: usize) {
        if index < self.sessions.len() {
            self.sessions.remove(index);

            // Adjust active session
            if let Some(active) = self.active_session {
                if active >= self.sessions.len() {
                    self.active_session = if self.sessions.is_empty() {
                        None
                    } else {
                        Some(self.sessions.len() - 1)
                    };
                } else if active > index {
                    self.active_session = Some(active - 1);
                }
            }
        }
    }

    /// Tick every session, then drop the ones that stopped
    pub fn tick_all(&mut self, dt: Duration) -> Vec<(u64, TickReport)> {
        let reports = self
            .sessions
            .iter_mut()
            .map(|s| (s.id, s.tick(dt)))
            .collect();

        while let Some(index) = self.sessions.iter().position(|s| !s.is_running()) {
            info!("Reaping session {}", self.sessions[index].id);
            self.remove_session(index);
        }
        reports
    }

    /// Get session count
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
