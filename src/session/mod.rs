//! Stream session lifecycle
//!
//! A [`StreamSession`] owns at most one worker thread per role. The worker
//! owns the [`Acquisition`], which owns the device handle; the handle is
//! released when the worker drops it, on stop or on failure, and never
//! twice.
//!
//! ```text
//! Idle → Opening → Playing ⇄ (Pausing → Paused) → Stopping → Stopped
//!           └──────────┴──────────────┴──→ Failed
//! ```

pub mod rangefinder;
pub mod thermal_link;
pub mod video;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::display::DeliverySink;
use crate::error::SessionError;
use crate::pipeline::SourceKind;

pub use rangefinder::RangefinderAcquisition;
pub use thermal_link::{ThermalCommander, ThermalLinkAcquisition};
pub use video::VideoAcquisition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    Visible,
    Thermal,
    Rangefinder,
    /// Thermal camera control UART, separate from the thermal video stream
    ThermalLink,
}

impl SessionRole {
    pub const ALL: [SessionRole; 4] = [
        SessionRole::Visible,
        SessionRole::Thermal,
        SessionRole::Rangefinder,
        SessionRole::ThermalLink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionRole::Visible => "visible",
            SessionRole::Thermal => "thermal",
            SessionRole::Rangefinder => "rangefinder",
            SessionRole::ThermalLink => "thermal-link",
        }
    }

    pub fn source_kind(self) -> Option<SourceKind> {
        match self {
            SessionRole::Visible => Some(SourceKind::Visible),
            SessionRole::Thermal => Some(SourceKind::Thermal),
            _ => None,
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Opening = 1,
    Playing = 2,
    Pausing = 3,
    Paused = 4,
    Stopping = 5,
    Stopped = 6,
    Failed = 7,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Opening,
            2 => SessionState::Playing,
            3 => SessionState::Pausing,
            4 => SessionState::Paused,
            5 => SessionState::Stopping,
            6 => SessionState::Stopped,
            7 => SessionState::Failed,
            _ => SessionState::Idle,
        }
    }

    /// A device handle may be held in these states
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Opening
                | SessionState::Playing
                | SessionState::Pausing
                | SessionState::Paused
                | SessionState::Stopping
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Playing => "playing",
            SessionState::Pausing => "pausing",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backoff for transient read errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 50,
            max_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn next(&self, current: Duration) -> Duration {
        (current * 2).min(Duration::from_millis(self.max_ms.max(self.initial_ms)))
    }
}

/// Work done by a session's worker, one bounded cycle at a time.
///
/// Implementors own the device handle. Dropping the implementor closes it.
pub trait Acquisition: Send + 'static {
    /// Pull, process and deliver once. Must return within the device read timeout.
    fn cycle(&mut self) -> Result<(), SessionError>;

    fn on_pause(&mut self) {}

    fn on_resume(&mut self) {}

    /// Last chance to talk to the device before the handle is dropped on stop.
    fn on_stop(&mut self) {}
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    transient_errors: AtomicU64,
    starts: AtomicU64,
}

/// Snapshot of a session's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub cycles: u64,
    pub transient_errors: u64,
    pub starts: u64,
}

struct Shared {
    role: SessionRole,
    state: AtomicU8,
    sink: DeliverySink,
    counters: CachePadded<Counters>,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, to: SessionState, message: impl Into<String>) {
        self.state.store(to as u8, Ordering::Release);
        self.sink.report_status(self.role, to, message);
    }

    /// Move to `to` if currently in one of `from`.
    fn transition(
        &self,
        from: &[SessionState],
        to: SessionState,
        message: impl Into<String>,
    ) -> Result<SessionState, SessionState> {
        let mut current = self.state();
        loop {
            if !from.contains(&current) {
                return Err(current);
            }
            match self.state.compare_exchange(
                current as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.sink.report_status(self.role, to, message);
                    return Ok(current);
                }
                Err(actual) => current = SessionState::from_u8(actual),
            }
        }
    }

    /// Sleep for `total` unless the session leaves Playing first.
    fn backoff(&self, total: Duration, slice: Duration) {
        let deadline = Instant::now() + total;
        while self.state() == SessionState::Playing {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }
}

/// Lifecycle of one acquisition role
pub struct StreamSession {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    retry: RetryPolicy,
    idle_poll: Duration,
}

impl StreamSession {
    pub fn new(role: SessionRole, sink: DeliverySink, retry: RetryPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                role,
                state: AtomicU8::new(SessionState::Idle as u8),
                sink,
                counters: CachePadded::new(Counters::default()),
            }),
            worker: None,
            retry,
            idle_poll: Duration::from_millis(10),
        }
    }

    /// Poll interval used while paused and between backoff checks
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn role(&self) -> SessionRole {
        self.shared.role
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn stats(&self) -> SessionStats {
        let c = &self.shared.counters;
        SessionStats {
            cycles: c.cycles.load(Ordering::Relaxed),
            transient_errors: c.transient_errors.load(Ordering::Relaxed),
            starts: c.starts.load(Ordering::Relaxed),
        }
    }

    /// Open the device through `open` and start the worker.
    ///
    /// `open` runs only after the state check passes, so a rejected start
    /// never touches the device.
    pub fn start<A, F>(&mut self, open: F) -> Result<(), SessionError>
    where
        A: Acquisition,
        F: FnOnce() -> Result<A, SessionError>,
    {
        let role = self.shared.role;
        match self.state() {
            s if s.is_active() => return Err(SessionError::AlreadyRunning(role)),
            SessionState::Failed => self.reap(),
            _ => {}
        }

        self.shared.set(SessionState::Opening, "opening");
        let acquisition = match open() {
            Ok(a) => a,
            Err(e) => {
                error!("{} open failed: {}", role, e);
                self.shared.set(SessionState::Failed, e.to_string());
                return Err(e);
            }
        };

        self.shared.set(SessionState::Playing, "playing");
        self.shared.counters.starts.fetch_add(1, Ordering::Relaxed);
        let shared = self.shared.clone();
        let retry = self.retry;
        let idle_poll = self.idle_poll;
        let spawned = thread::Builder::new()
            .name(format!("eoir-{}", role))
            .spawn(move || run_worker(shared, acquisition, retry, idle_poll));

        match spawned {
            Ok(handle) => {
                info!("{} session started", role);
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                // the closure, and with it the device handle, is already dropped
                let err = SessionError::Spawn(e.to_string());
                self.shared.set(SessionState::Failed, err.to_string());
                Err(err)
            }
        }
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.shared
            .transition(&[SessionState::Playing], SessionState::Pausing, "pausing")
            .map(|_| ())
            .map_err(|from| SessionError::InvalidTransition {
                role: self.shared.role,
                from,
                op: "pause",
            })
    }

    /// Resume from Paused, or cancel a pause the worker has not acknowledged yet.
    pub fn resume(&self) -> Result<(), SessionError> {
        self.shared
            .transition(
                &[SessionState::Paused, SessionState::Pausing],
                SessionState::Playing,
                "playing",
            )
            .map(|_| ())
            .map_err(|from| SessionError::InvalidTransition {
                role: self.shared.role,
                from,
                op: "resume",
            })
    }

    /// Stop the worker and wait for it to release the device.
    ///
    /// A no-op when nothing is running; a failed session stays Failed.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        let role = self.shared.role;
        let previous = self.shared.transition(
            &[
                SessionState::Opening,
                SessionState::Playing,
                SessionState::Pausing,
                SessionState::Paused,
            ],
            SessionState::Stopping,
            "stopping",
        );
        if let Err(current) = previous {
            debug!("{} stop while {}", role, current);
            self.reap();
            return Ok(());
        }

        self.reap();
        self.shared.set(SessionState::Stopped, "stopped");
        info!("{} session stopped", role);
        Ok(())
    }

    fn reap(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("{} worker panicked", self.shared.role);
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_worker<A: Acquisition>(
    shared: Arc<Shared>,
    mut acquisition: A,
    retry: RetryPolicy,
    idle_poll: Duration,
) {
    let role = shared.role;
    let mut backoff = retry.initial();
    let mut paused = false;

    loop {
        match shared.state() {
            SessionState::Playing => {
                if paused {
                    acquisition.on_resume();
                    paused = false;
                }
                match acquisition.cycle() {
                    Ok(()) => {
                        shared.counters.cycles.fetch_add(1, Ordering::Relaxed);
                        backoff = retry.initial();
                    }
                    Err(e) if e.is_transient() => {
                        warn!("{} transient error, retrying in {:?}: {}", role, backoff, e);
                        shared.counters.transient_errors.fetch_add(1, Ordering::Relaxed);
                        shared.backoff(backoff, idle_poll);
                        backoff = retry.next(backoff);
                    }
                    Err(e) => {
                        error!("{} session failed: {}", role, e);
                        let _ = shared.transition(
                            &[SessionState::Playing, SessionState::Pausing, SessionState::Paused],
                            SessionState::Failed,
                            e.to_string(),
                        );
                        break;
                    }
                }
            }
            SessionState::Pausing => {
                if !paused {
                    acquisition.on_pause();
                    paused = true;
                }
                let _ = shared.transition(&[SessionState::Pausing], SessionState::Paused, "paused");
            }
            SessionState::Paused => thread::sleep(idle_poll),
            _ => {
                acquisition.on_stop();
                break;
            }
        }
    }

    drop(acquisition);
    debug!("{} worker exited, device released", role);
}
