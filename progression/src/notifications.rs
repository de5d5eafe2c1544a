//! Achievement toast notification queue.
//!
//! A presentation-side scheduler that serializes simultaneous award
//! notifications into sequential toasts. Lives only for a page view; never
//! persisted.
//!
//! ## Phases
//!
//! The queue is an explicit state machine rather than a chain of nested
//! delayed callbacks:
//! 1. **Idle** - nothing on screen, queue may hold pending entries
//! 2. **Showing** - one toast visible for `visible_ms`
//! 3. **TransitioningOut** - exit animation for `transition_ms`, then the
//!    next entry (back to Showing) or the hidden baseline (back to Idle)
//!
//! ## Disposal
//!
//! The queue is driven by delayed wake-ups, so a wake-up can race page
//! teardown. `dispose` empties the queue and marks it permanently inert;
//! every entry point re-checks the flag before touching presentation
//! state, and `enqueue` after disposal is a silent no-op.

use commonware_runtime::Clock;
use parlay_types::AchievementId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Default time a toast stays fully visible.
pub const DEFAULT_VISIBLE_MS: u64 = 4_000;

/// Default exit transition duration.
pub const DEFAULT_TRANSITION_MS: u64 = 400;

/// One award notification, ready for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastEntry {
    pub id: AchievementId,
    pub name: String,
    pub icon: String,
}

/// Display timing configuration in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToastConfig {
    /// How long a toast stays fully visible.
    pub visible_ms: u64,
    /// Duration of the exit transition.
    pub transition_ms: u64,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            visible_ms: DEFAULT_VISIBLE_MS,
            transition_ms: DEFAULT_TRANSITION_MS,
        }
    }
}

impl ToastConfig {
    /// Validate the configuration (all durations must be > 0).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.visible_ms == 0 {
            return Err("visible_ms must be greater than zero");
        }
        if self.transition_ms == 0 {
            return Err("transition_ms must be greater than zero");
        }
        Ok(())
    }

    /// Total on-screen time for a single toast.
    pub fn cycle_ms(&self) -> u64 {
        self.visible_ms.saturating_add(self.transition_ms)
    }
}

/// Current display phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastPhase {
    Idle,
    Showing,
    TransitioningOut,
}

/// Presentation command produced by [`ToastQueue::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToastAction {
    /// Present this entry.
    Show(ToastEntry),
    /// Start the exit transition for the current entry.
    BeginExit,
    /// Reset to the fully-hidden baseline; the queue is drained.
    Hidden,
}

/// FIFO, unbounded, time-sliced toast queue.
///
/// Pure state machine: all timing is parameterized on a caller-supplied
/// `now_ms`, so tests can drive it with a fake clock and the async driver
/// ([`present`]) stays a thin adapter.
pub struct ToastQueue {
    config: ToastConfig,
    queue: VecDeque<ToastEntry>,
    current: Option<ToastEntry>,
    phase: ToastPhase,
    phase_ends_at_ms: u64,
    disposed: bool,
}

impl ToastQueue {
    pub fn new(config: ToastConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            current: None,
            phase: ToastPhase::Idle,
            phase_ends_at_ms: 0,
            disposed: false,
        }
    }

    pub fn config(&self) -> &ToastConfig {
        &self.config
    }

    /// Append entries in arrival order. Silently ignored after disposal.
    pub fn enqueue(&mut self, entries: impl IntoIterator<Item = ToastEntry>) {
        if self.disposed {
            return;
        }
        self.queue.extend(entries);
    }

    /// Advance the state machine to `now_ms`.
    ///
    /// Returns the next presentation command that is due, or `None` when
    /// the queue is waiting (on a deadline, or idle and empty).
    pub fn poll(&mut self, now_ms: u64) -> Option<ToastAction> {
        if self.disposed {
            return None;
        }
        match self.phase {
            ToastPhase::Idle => {
                let entry = self.queue.pop_front()?;
                self.current = Some(entry.clone());
                self.phase = ToastPhase::Showing;
                self.phase_ends_at_ms = now_ms.saturating_add(self.config.visible_ms);
                Some(ToastAction::Show(entry))
            }
            ToastPhase::Showing => {
                if now_ms < self.phase_ends_at_ms {
                    return None;
                }
                self.phase = ToastPhase::TransitioningOut;
                self.phase_ends_at_ms = now_ms.saturating_add(self.config.transition_ms);
                Some(ToastAction::BeginExit)
            }
            ToastPhase::TransitioningOut => {
                if now_ms < self.phase_ends_at_ms {
                    return None;
                }
                match self.queue.pop_front() {
                    Some(entry) => {
                        self.current = Some(entry.clone());
                        self.phase = ToastPhase::Showing;
                        self.phase_ends_at_ms = now_ms.saturating_add(self.config.visible_ms);
                        Some(ToastAction::Show(entry))
                    }
                    None => {
                        self.current = None;
                        self.phase = ToastPhase::Idle;
                        self.phase_ends_at_ms = 0;
                        Some(ToastAction::Hidden)
                    }
                }
            }
        }
    }

    /// When the current phase lapses, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        if self.disposed || matches!(self.phase, ToastPhase::Idle) {
            return None;
        }
        Some(self.phase_ends_at_ms)
    }

    pub fn current(&self) -> Option<&ToastEntry> {
        self.current.as_ref()
    }

    pub fn phase(&self) -> ToastPhase {
        self.phase
    }

    /// Pending entries, excluding the one currently displayed.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Empty the queue and mark it permanently inert.
    ///
    /// Pending wake-ups become no-ops and later `enqueue` calls are
    /// ignored, so a toast can never resurrect after page teardown.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.drain();
    }

    /// Discard all pending entries and return to the hidden baseline.
    pub(crate) fn drain(&mut self) {
        self.queue.clear();
        self.current = None;
        self.phase = ToastPhase::Idle;
        self.phase_ends_at_ms = 0;
    }
}

/// A presentation surface the queue renders into.
///
/// `show` and `begin_exit` return `false` once the surface is detached
/// (e.g. the page navigated away); the driver then drains the queue rather
/// than retrying.
pub trait ToastSurface {
    fn show(&mut self, entry: &ToastEntry) -> bool;
    fn begin_exit(&mut self) -> bool;
    fn hide(&mut self);
}

/// Drive the queue against a surface until it drains or is disposed.
///
/// Cooperative and single-threaded: the driver sleeps until the next phase
/// deadline and re-checks disposal at every wake-up, so a timer firing
/// after teardown never mutates the surface.
pub async fn present<E: Clock, P: ToastSurface>(
    context: &E,
    queue: &mut ToastQueue,
    surface: &mut P,
) {
    loop {
        if queue.is_disposed() {
            return;
        }
        let now_ms = epoch_ms(context.current());
        match queue.poll(now_ms) {
            Some(ToastAction::Show(entry)) => {
                if !surface.show(&entry) {
                    debug!("toast surface detached; draining queue");
                    queue.drain();
                    surface.hide();
                    return;
                }
            }
            Some(ToastAction::BeginExit) => {
                if !surface.begin_exit() {
                    debug!("toast surface detached; draining queue");
                    queue.drain();
                    surface.hide();
                    return;
                }
            }
            Some(ToastAction::Hidden) => surface.hide(),
            None => match queue.next_deadline() {
                Some(deadline) if deadline > now_ms => {
                    context
                        .sleep(Duration::from_millis(deadline - now_ms))
                        .await;
                }
                Some(_) => {}
                None => return,
            },
        }
    }
}

fn epoch_ms(now: SystemTime) -> u64 {
    now.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
