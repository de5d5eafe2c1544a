//! Parlay progression engine.
//!
//! This crate contains the concurrency-safe progression/economy core of the
//! parlay casino application: the chip Balance Ledger, the daily Mission
//! Engine, the Achievement Rule Engine, and the toast Notification Queue.
//!
//! ## Concurrency requirements
//! - The backing store is the only shared resource; every operation must be
//!   safe under concurrent requests for the same user (double-submits,
//!   multiple browser tabs).
//! - Balance updates use optimistic concurrency: callers re-read and retry
//!   on conflict, with a capped attempt budget and jittered backoff.
//! - A repeated mission completion for the same (user, mission, day) is a
//!   benign `AlreadyCompleted` status, never a hard failure.
//!
//! ## Storage invariants
//! Multi-key writes (mission date-stamp plus reward credit) go through
//! [`State::apply_guarded`] so that either every change lands or none does.
//! A stale guard means another writer won the race; nothing is applied and
//! the caller decides whether to retry or absorb the outcome.
//!
//! The Notification Queue is presentation-side state: single-threaded,
//! timer-driven, and never persisted.

pub mod achievements;
pub mod ledger;
pub mod missions;
pub mod notifications;

mod backoff;
mod state;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod concurrency_tests;

pub use achievements::{AchievementContext, AchievementInfo, AchievementRegistry};
pub use ledger::{Receipt, MAX_ATTEMPTS};
pub use missions::{
    CompletionStatus, MissionCompletion, MissionEngine, MissionInfo, MissionRegistry,
    MissionStatus,
};
pub use notifications::{
    present, ToastAction, ToastConfig, ToastEntry, ToastPhase, ToastQueue, ToastSurface,
};
pub use state::{GuardOutcome, Overlay, State, Status};

#[cfg(any(test, feature = "mocks"))]
pub use state::Memory;
