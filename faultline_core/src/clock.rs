//! Incident Clock - evolves the incident state on its own.
//!
//! Every `tick_period` the clock rolls for a new incident while calm. A
//! started incident gets a one-shot expiry task; the clock owns that task so
//! overrides and shutdown can cancel it.
//!
//! ```text
//!        tick && roll < p                      expiry / force / shutdown
//!  Calm ───────────────────────▶ Active{kind, episode} ───────────────────▶ Calm
//!   ▲  tick && roll >= p                │  tick: no-op
//!   └──────────┘                        └──────┘
//! ```

use crate::catalog::IncidentKind;
use crate::config::{ClockConfig, ConfigError};
use crate::state::{IncidentSnapshot, IncidentState};
use crate::telemetry::{IncidentEvent, NoopSink, ResolveReason, TelemetrySink};
use faultline_env::{FaultlineContext, TaskHandle};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// An incident is already running; nothing changed
    Busy(IncidentSnapshot),

    /// Calm, and the start roll did not fire
    Quiet,

    /// A new incident started
    Started {
        snapshot: IncidentSnapshot,
        duration: Duration,
    },
}

/// Sole writer of the incident state.
pub struct IncidentClock<Ctx: FaultlineContext> {
    /// Environment context (clock, spawner, generators)
    context: Arc<Ctx>,

    /// Shared state handed to readers
    state: Arc<IncidentState>,

    /// Tick period, start probability, duration range
    config: ClockConfig,

    /// Receiver of start/stop transitions
    sink: Arc<dyn TelemetrySink>,

    /// Expiry of the current episode, if one is scheduled. Every state
    /// transition and its sink event happen under this lock.
    pending_expiry: Arc<Mutex<Option<TaskHandle>>>,
}

impl<Ctx: FaultlineContext> IncidentClock<Ctx> {
    /// Creates a clock over a fresh, calm state.
    pub fn new(context: Arc<Ctx>, config: ClockConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            context,
            state: Arc::new(IncidentState::new()),
            config,
            sink: Arc::new(NoopSink),
            pending_expiry: Arc::new(Mutex::new(None)),
        })
    }

    /// Routes incident transitions to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Read-only handle to the shared state.
    pub fn state(&self) -> Arc<IncidentState> {
        Arc::clone(&self.state)
    }

    /// Current incident.
    pub fn snapshot(&self) -> IncidentSnapshot {
        self.state.snapshot()
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    /// Runs one tick of the clock.
    ///
    /// An active incident is never extended or re-rolled.
    pub fn tick(&self) -> ClockTick {
        let current = self.state.snapshot();
        if current.is_active() {
            debug!(incident = %current, "clock tick: incident in progress");
            return ClockTick::Busy(current);
        }

        let mut rng = self.context.derive_rng();
        if rng.gen::<f64>() >= self.config.start_probability {
            debug!("clock tick: no incident");
            return ClockTick::Quiet;
        }

        let kind = IncidentKind::ALL[rng.gen_range(0..IncidentKind::ALL.len())];
        let duration = self.draw_duration(&mut rng);

        match self.begin(kind, Some(duration)) {
            Some(snapshot) => ClockTick::Started { snapshot, duration },
            None => ClockTick::Busy(self.state.snapshot()),
        }
    }

    /// Replaces whatever is active with `kind`.
    ///
    /// With `duration` the new incident expires like a rolled one; without
    /// it the incident stays until [`IncidentClock::resolve`] or the next force.
    pub fn force(&self, kind: IncidentKind, duration: Option<Duration>) -> IncidentSnapshot {
        let mut pending = self.pending();
        self.resolve_locked(&mut pending, ResolveReason::Forced);
        // Every writer holds the lock, so the state is still calm here
        self.begin_locked(&mut pending, kind, duration)
            .unwrap_or_else(|| self.state.snapshot())
    }

    /// Ends the active incident now and cancels its expiry.
    pub fn resolve(&self) -> Option<IncidentSnapshot> {
        self.resolve_with(ResolveReason::Forced)
    }

    /// Starts the periodic tick loop.
    ///
    /// The first tick happens one period after the call.
    pub fn start(self: Arc<Self>) -> ClockHandle<Ctx> {
        let clock = Arc::clone(&self);
        let ticker = self.context.spawn("incident-clock", async move {
            loop {
                clock.context.sleep(clock.config.tick_period).await;
                clock.tick();
            }
        });

        ClockHandle {
            clock: self,
            ticker: Some(ticker),
        }
    }

    fn draw_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min_ms = self.config.min_duration.as_millis() as u64;
        let max_ms = self.config.max_duration.as_millis() as u64;
        if max_ms <= min_ms {
            return self.config.min_duration;
        }
        Duration::from_millis(rng.gen_range(min_ms..max_ms))
    }

    fn begin(&self, kind: IncidentKind, duration: Option<Duration>) -> Option<IncidentSnapshot> {
        let mut pending = self.pending();
        self.begin_locked(&mut pending, kind, duration)
    }

    fn begin_locked(
        &self,
        pending: &mut Option<TaskHandle>,
        kind: IncidentKind,
        duration: Option<Duration>,
    ) -> Option<IncidentSnapshot> {
        let snapshot = self.state.try_begin(kind)?;
        let episode = snapshot.episode().unwrap_or_default();

        self.sink.on_incident(&IncidentEvent::Started {
            kind,
            episode,
            duration,
            at: self.context.now(),
        });

        if let Some(after) = duration {
            let handle = self.spawn_expiry(snapshot, after);
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
        Some(snapshot)
    }

    fn spawn_expiry(&self, snapshot: IncidentSnapshot, after: Duration) -> TaskHandle {
        let context = Arc::clone(&self.context);
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let pending = Arc::clone(&self.pending_expiry);

        self.context.spawn("incident-expiry", async move {
            context.sleep(after).await;

            let mut pending = lock_pending(&pending);
            // Only the episode this task was scheduled for may be cleared
            if state.try_end(snapshot) {
                pending.take();
                if let IncidentSnapshot::Active { kind, episode } = snapshot {
                    sink.on_incident(&IncidentEvent::Resolved {
                        kind,
                        episode,
                        reason: ResolveReason::Expired,
                        at: context.now(),
                    });
                }
            }
        })
    }

    fn resolve_with(&self, reason: ResolveReason) -> Option<IncidentSnapshot> {
        let mut pending = self.pending();
        self.resolve_locked(&mut pending, reason)
    }

    fn resolve_locked(&self, pending: &mut Option<TaskHandle>, reason: ResolveReason) -> Option<IncidentSnapshot> {
        if let Some(expiry) = pending.take() {
            expiry.abort();
        }

        match self.state.clear() {
            IncidentSnapshot::Calm => None,
            ended @ IncidentSnapshot::Active { kind, episode } => {
                self.sink.on_incident(&IncidentEvent::Resolved {
                    kind,
                    episode,
                    reason,
                    at: self.context.now(),
                });
                Some(ended)
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        lock_pending(&self.pending_expiry)
    }
}

fn lock_pending(pending: &Mutex<Option<TaskHandle>>) -> MutexGuard<'_, Option<TaskHandle>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running clock. Dropping or shutting down the handle stops the tick loop,
/// cancels any pending expiry and resolves the active incident.
pub struct ClockHandle<Ctx: FaultlineContext> {
    clock: Arc<IncidentClock<Ctx>>,
    ticker: Option<TaskHandle>,
}

impl<Ctx: FaultlineContext> ClockHandle<Ctx> {
    /// The clock driven by this handle.
    pub fn clock(&self) -> &Arc<IncidentClock<Ctx>> {
        &self.clock
    }

    /// Stops the clock.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            self.clock.resolve_with(ResolveReason::Shutdown);
            debug!("incident clock stopped");
        }
    }
}

impl<Ctx: FaultlineContext> Drop for ClockHandle<Ctx> {
    fn drop(&mut self) {
        self.stop();
    }
}
