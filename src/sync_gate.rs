//! A small set of outcome flags that one side sets from event context and the other side
//! awaits.
//!
//! Setting a flag never blocks. A waiter names the flags it is interested in and wakes as
//! soon as any of them is set, getting back a snapshot of every flag set at that moment.
//! With `consume`, only the interesting flags are cleared on wake.
//!
//! ```rust,no_run
//! use link_envoy::sync_gate::{Outcome, OutcomeSet, SyncGate};
//!
//! #[derive(Clone, Copy)]
//! enum Done {
//!     Ok,
//!     Failed,
//! }
//!
//! impl Outcome for Done {
//!     fn bit(self) -> u32 {
//!         match self {
//!             Done::Ok => 1 << 0,
//!             Done::Failed => 1 << 1,
//!         }
//!     }
//! }
//!
//! static GATE: SyncGate<Done> = SyncGate::new();
//!
//! async fn wait_for_done() -> bool {
//!     let seen = GATE.wait(OutcomeSet::of(&[Done::Ok, Done::Failed]), true).await;
//!     seen.contains(Done::Ok)
//! }
//! ```

use core::cell::Cell;
use core::marker::PhantomData;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, with_timeout};

/// A flag that can be set on a [`SyncGate`]. Each value maps to one distinct bit.
pub trait Outcome: Copy {
    /// The single bit this outcome occupies.
    fn bit(self) -> u32;
}

/// A set of outcomes, stored as bits.
pub struct OutcomeSet<O> {
    bits: u32,
    _outcome: PhantomData<fn() -> O>,
}

impl<O> Clone for OutcomeSet<O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O> Copy for OutcomeSet<O> {}

impl<O> PartialEq for OutcomeSet<O> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<O> Eq for OutcomeSet<O> {}

impl<O> core::fmt::Debug for OutcomeSet<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "OutcomeSet({:#b})", self.bits)
    }
}

impl<O: Outcome> OutcomeSet<O> {
    /// No outcomes.
    #[must_use]
    pub const fn empty() -> Self {
        Self::from_bits(0)
    }

    /// The given outcomes.
    #[must_use]
    pub fn of(outcomes: &[O]) -> Self {
        outcomes
            .iter()
            .fold(Self::empty(), |set, outcome| set.with(*outcome))
    }

    /// This set plus `outcome`.
    #[must_use]
    pub fn with(self, outcome: O) -> Self {
        Self::from_bits(self.bits | outcome.bit())
    }

    /// Whether `outcome` is in the set.
    #[must_use]
    pub fn contains(self, outcome: O) -> bool {
        self.bits & outcome.bit() != 0
    }

    /// Whether no outcome is in the set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// The raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    const fn from_bits(bits: u32) -> Self {
        Self {
            bits,
            _outcome: PhantomData,
        }
    }
}

/// Outcome flags plus a wakeup for whoever is waiting on them.
///
/// Suitable for `static` placement. Setting flags is safe from any context; waiting is meant
/// for a single waiter at a time.
pub struct SyncGate<O> {
    bits: Mutex<CriticalSectionRawMutex, Cell<u32>>,
    changed: Signal<CriticalSectionRawMutex, ()>,
    _outcome: PhantomData<fn() -> O>,
}

impl<O: Outcome> Default for SyncGate<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Outcome> SyncGate<O> {
    /// A gate with every flag cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: Mutex::new(Cell::new(0)),
            changed: Signal::new(),
            _outcome: PhantomData,
        }
    }

    /// Set `outcome` and wake the waiter. Never blocks.
    pub fn signal(&self, outcome: O) {
        self.bits.lock(|bits| bits.set(bits.get() | outcome.bit()));
        self.changed.signal(());
    }

    /// Wait until any outcome in `interest` is set and return every flag set at that moment.
    /// With `consume`, the flags in `interest` are cleared before returning; other flags stay.
    pub async fn wait(&self, interest: OutcomeSet<O>, consume: bool) -> OutcomeSet<O> {
        loop {
            if let Some(seen) = self.try_take(interest, consume) {
                return seen;
            }
            self.changed.wait().await;
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. `None` means nothing of
    /// interest was set in time.
    pub async fn wait_timeout(
        &self,
        interest: OutcomeSet<O>,
        consume: bool,
        timeout: Duration,
    ) -> Option<OutcomeSet<O>> {
        with_timeout(timeout, self.wait(interest, consume)).await.ok()
    }

    /// Non-blocking check. Returns the snapshot if any outcome in `interest` is set.
    pub fn try_take(&self, interest: OutcomeSet<O>, consume: bool) -> Option<OutcomeSet<O>> {
        self.bits.lock(|bits| {
            let current = bits.get();
            if current & interest.bits() == 0 {
                return None;
            }
            if consume {
                bits.set(current & !interest.bits());
            }
            Some(OutcomeSet::from_bits(current))
        })
    }

    /// Every flag currently set, without clearing anything.
    pub fn peek(&self) -> OutcomeSet<O> {
        OutcomeSet::from_bits(self.bits.lock(Cell::get))
    }

    /// Clear every flag and drop any stale wakeup.
    pub fn clear(&self) {
        self.bits.lock(|bits| bits.set(0));
        self.changed.reset();
    }
}
