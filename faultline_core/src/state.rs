//! Incident State - the one shared, mutable piece of the engine.
//!
//! The `{active, kind}` pair is packed into a single `AtomicU64`:
//!
//! ```text
//!  63                              8 7        0
//! ┌─────────────────────────────────┬──────────┐
//! │          episode number         │ kind code│
//! └─────────────────────────────────┴──────────┘
//! ```
//!
//! Kind code 0 is the calm state, so `active` is derived from the kind and a
//! reader can never observe `active=true, kind=none`.

use crate::catalog::{IncidentKind, IncidentProfile, BASELINE_PROFILE, GENERIC_FAILURE_MESSAGE, NO_INCIDENT_LABEL};
use std::sync::atomic::{AtomicU64, Ordering};

const KIND_MASK: u64 = 0xff;
const EPISODE_SHIFT: u32 = 8;
const CALM: u64 = 0;

/// Point-in-time read of the incident state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncidentSnapshot {
    /// No incident active
    Calm,

    /// An incident episode is in progress
    Active {
        /// Fault kind
        kind: IncidentKind,
        /// Episode number, unique per started incident
        episode: u64,
    },
}

impl IncidentSnapshot {
    /// Returns true while an incident is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, IncidentSnapshot::Active { .. })
    }

    /// Returns the fault kind, or `None` when calm.
    pub fn kind(&self) -> Option<IncidentKind> {
        match self {
            IncidentSnapshot::Calm => None,
            IncidentSnapshot::Active { kind, .. } => Some(*kind),
        }
    }

    /// Returns the episode number, or `None` when calm.
    pub fn episode(&self) -> Option<u64> {
        match self {
            IncidentSnapshot::Calm => None,
            IncidentSnapshot::Active { episode, .. } => Some(*episode),
        }
    }

    /// Returns the kind label, `"none"` when calm.
    pub fn kind_label(&self) -> &'static str {
        self.kind().map_or(NO_INCIDENT_LABEL, |k| k.name())
    }

    /// Resolves the effect profile for this snapshot.
    pub fn profile(&self) -> IncidentProfile {
        self.kind().map_or(BASELINE_PROFILE, |k| k.profile())
    }

    /// Message attached to a failure produced under this snapshot.
    pub fn failure_message(&self) -> &'static str {
        self.kind().map_or(GENERIC_FAILURE_MESSAGE, |k| k.failure_message())
    }

    fn pack(&self) -> u64 {
        match self {
            IncidentSnapshot::Calm => CALM,
            IncidentSnapshot::Active { kind, episode } => (episode << EPISODE_SHIFT) | kind.code() as u64,
        }
    }

    fn unpack(word: u64) -> Self {
        match IncidentKind::from_code((word & KIND_MASK) as u8) {
            Some(kind) => IncidentSnapshot::Active {
                kind,
                episode: word >> EPISODE_SHIFT,
            },
            None => IncidentSnapshot::Calm,
        }
    }
}

impl Default for IncidentSnapshot {
    fn default() -> Self {
        IncidentSnapshot::Calm
    }
}

impl std::fmt::Display for IncidentSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentSnapshot::Calm => write!(f, "{}", NO_INCIDENT_LABEL),
            IncidentSnapshot::Active { kind, episode } => write!(f, "{}#{}", kind, episode),
        }
    }
}

/// Process-wide incident state.
///
/// Readers call [`IncidentState::snapshot`]. All writes are crate-private and
/// issued by the incident clock.
#[derive(Debug)]
pub struct IncidentState {
    /// Packed `(episode, kind)` word
    word: AtomicU64,

    /// Last episode number handed out
    episodes: AtomicU64,
}

impl IncidentState {
    /// Creates a calm state.
    pub fn new() -> Self {
        Self {
            word: AtomicU64::new(CALM),
            episodes: AtomicU64::new(0),
        }
    }

    /// Reads the current incident.
    pub fn snapshot(&self) -> IncidentSnapshot {
        IncidentSnapshot::unpack(self.word.load(Ordering::Acquire))
    }

    /// Returns true while an incident is in progress.
    pub fn is_active(&self) -> bool {
        self.snapshot().is_active()
    }

    /// Number of episodes started so far.
    pub fn episodes_started(&self) -> u64 {
        self.episodes.load(Ordering::Relaxed)
    }

    /// Begins a new episode of `kind` if the state is calm.
    ///
    /// Callers serialize writes; the incident clock does so under its lock.
    ///
    /// Returns the new snapshot, or `None` if an incident is already active.
    pub(crate) fn try_begin(&self, kind: IncidentKind) -> Option<IncidentSnapshot> {
        let episode = self.episodes.load(Ordering::Acquire) + 1;
        let next = IncidentSnapshot::Active { kind, episode };

        self.word
            .compare_exchange(CALM, next.pack(), Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.episodes.fetch_max(episode, Ordering::AcqRel);
        Some(next)
    }

    /// Ends `expected` if it is still the current episode.
    pub(crate) fn try_end(&self, expected: IncidentSnapshot) -> bool {
        if !expected.is_active() {
            return false;
        }
        self.word
            .compare_exchange(expected.pack(), CALM, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditionally returns to calm, yielding whatever was active.
    pub(crate) fn clear(&self) -> IncidentSnapshot {
        IncidentSnapshot::unpack(self.word.swap(CALM, Ordering::AcqRel))
    }
}

impl Default for IncidentState {
    fn default() -> Self {
        Self::new()
    }
}
