//! One-shot cancelable delay driven by an embassy task.

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use portable_atomic::{AtomicU32, Ordering};

use crate::platform::TimerService;

/// Arms are numbered so a late expiry can tell whether it is still the current one.
/// Generation 0 means nothing is outstanding.
#[derive(Clone, Copy)]
enum TimerCommand {
    Arm { delay: Duration, generation: u32 },
    Cancel,
}

/// [`TimerService`] backed by `embassy-time`.
///
/// `arm`/`cancel` may be called from any context. Expiries are delivered by
/// [`run`](Self::run), which must be polled by a task for as long as the timer is in use.
/// Once `cancel` returns, the outstanding delay will not fire even if it has already
/// elapsed and `run` has not yet been polled.
pub struct ReconnectTimer {
    commands: Signal<CriticalSectionRawMutex, TimerCommand>,
    next_generation: AtomicU32,
    armed: AtomicU32,
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectTimer {
    /// An idle timer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Signal::new(),
            next_generation: AtomicU32::new(0),
            armed: AtomicU32::new(0),
        }
    }

    /// Whether a delay is outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.armed.load(Ordering::Acquire) != 0
    }

    /// Wait for commands and call `on_fire` each time an armed delay elapses.
    pub async fn run(&self, mut on_fire: impl FnMut()) -> ! {
        let mut deadline: Option<(Instant, u32)> = None;
        loop {
            let command = match deadline {
                None => self.commands.wait().await,
                Some((at, generation)) => {
                    match select(Timer::at(at), self.commands.wait()).await {
                        Either::First(()) => {
                            // A command that raced the expiry takes precedence.
                            if self.commands.signaled() {
                                self.commands.wait().await
                            } else {
                                deadline = None;
                                // Fails when a newer arm or a cancel got in first.
                                if self
                                    .armed
                                    .compare_exchange(
                                        generation,
                                        0,
                                        Ordering::AcqRel,
                                        Ordering::Acquire,
                                    )
                                    .is_ok()
                                {
                                    on_fire();
                                }
                                continue;
                            }
                        }
                        Either::Second(command) => command,
                    }
                }
            };

            deadline = match command {
                TimerCommand::Arm { delay, generation } => Some((
                    Instant::now().checked_add(delay).unwrap_or(Instant::MAX),
                    generation,
                )),
                TimerCommand::Cancel => None,
            };
        }
    }
}

impl TimerService for ReconnectTimer {
    fn arm(&self, delay: Duration) {
        let mut generation = self
            .next_generation
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        if generation == 0 {
            generation = self
                .next_generation
                .fetch_add(1, Ordering::AcqRel)
                .wrapping_add(1);
        }
        self.armed.store(generation, Ordering::Release);
        self.commands.signal(TimerCommand::Arm { delay, generation });
    }

    fn cancel(&self) {
        self.armed.store(0, Ordering::Release);
        self.commands.signal(TimerCommand::Cancel);
    }
}
