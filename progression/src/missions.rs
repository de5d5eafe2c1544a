//! Daily mission engine.
//!
//! Missions are calendar-day scoped: each (user, mission) pair can be
//! rewarded once per UTC day. There is no stored "reset" transition; a
//! completion stamped with yesterday's day index simply stops counting the
//! moment the day ticks over.
//!
//! Completion is a single guarded batch: the date-stamp and the chip credit
//! land together or not at all. A concurrent duplicate attempt loses the
//! guard on the progress row and is absorbed as `AlreadyCompleted`; balance
//! contention retries under the ledger's backoff policy.

use crate::backoff::jittered_backoff;
use crate::ledger;
use crate::state::{GuardOutcome, Overlay, State};
use anyhow::anyhow;
use commonware_cryptography::ed25519::PublicKey;
use commonware_runtime::Clock;
use parlay_types::{
    day_index, Key, LedgerError, MissionError, MissionProgress, MissionType, Value,
};
use rand::RngCore;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Mission metadata for UI display and reward resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MissionInfo {
    pub mission_type: MissionType,
    pub title: &'static str,
    pub description: &'static str,
    /// Chips credited on the first completion each day.
    pub reward: u64,
}

struct MissionEntry {
    info: MissionInfo,
    active: bool,
}

/// Static catalog of daily missions.
///
/// Immutable reference data; the active flag exists so operators can pull a
/// mission without a schema change.
pub struct MissionRegistry {
    entries: Vec<MissionEntry>,
}

impl Default for MissionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register(
            MissionInfo {
                mission_type: MissionType::DailyLogin,
                title: "Daily Login",
                description: "Visit the casino floor once today",
                reward: 500,
            },
            true,
        );
        registry.register(
            MissionInfo {
                mission_type: MissionType::DailyHands,
                title: "Table Regular",
                description: "Play ten hands today",
                reward: 750,
            },
            true,
        );
        registry.register(
            MissionInfo {
                mission_type: MissionType::DailyWin,
                title: "Close the Night Up",
                description: "Win three rounds today",
                reward: 1_000,
            },
            true,
        );
        registry
    }
}

impl MissionRegistry {
    fn register(&mut self, info: MissionInfo, active: bool) {
        self.entries.push(MissionEntry { info, active });
    }

    pub fn get_info(&self, mission_type: MissionType) -> Option<&MissionInfo> {
        self.entries
            .iter()
            .find(|entry| entry.info.mission_type == mission_type)
            .map(|entry| &entry.info)
    }

    pub fn is_active(&self, mission_type: MissionType) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.info.mission_type == mission_type && entry.active)
    }

    /// All missions currently offered, in catalog order.
    pub fn list_active(&self) -> Vec<&MissionInfo> {
        self.entries
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| &entry.info)
            .collect()
    }

    /// Returns false if the mission is not in the catalog.
    pub fn set_active(&mut self, mission_type: MissionType, active: bool) -> bool {
        for entry in &mut self.entries {
            if entry.info.mission_type == mission_type {
                entry.active = active;
                return true;
            }
        }
        false
    }
}

/// Completion outcome for a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Granted,
    AlreadyCompleted,
}

/// Per-mission progress as seen by the caller.
#[derive(Clone, Debug, Serialize)]
pub struct MissionStatus {
    pub info: MissionInfo,
    pub completed_today: bool,
    pub completed_day: Option<u64>,
}

/// Result of a completion attempt, including the resulting balance.
#[derive(Clone, Debug, Serialize)]
pub struct MissionCompletion {
    pub status: CompletionStatus,
    pub progress: MissionStatus,
    pub chip_balance: u64,
}

#[derive(Default)]
pub struct MissionEngine {
    registry: MissionRegistry,
}

impl MissionEngine {
    pub fn new(registry: MissionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MissionRegistry {
        &self.registry
    }

    /// Pure read of a user's progress on one mission.
    pub async fn progress<S: State>(
        &self,
        state: &S,
        user: &PublicKey,
        mission_type: MissionType,
        now_secs: u64,
    ) -> Result<MissionStatus, MissionError> {
        let info = self
            .registry
            .get_info(mission_type)
            .ok_or(MissionError::Inactive(mission_type))?;
        let record = load_progress(state, user, mission_type).await?;
        Ok(status(*info, &record, day_index(now_secs)))
    }

    /// Complete a mission for today, crediting its reward exactly once per
    /// (user, mission, day).
    ///
    /// Calling this twice in one day is externally indistinguishable from
    /// calling it once: the second call returns `AlreadyCompleted` and
    /// leaves the ledger untouched, even when the two calls race.
    ///
    /// Stale guards retry under the ledger's policy: at most
    /// [`ledger::MAX_ATTEMPTS`] rounds, sleeping a jittered exponential
    /// backoff (floored at the retry-after hint) between them.
    pub async fn complete<S: State, E: Clock + RngCore>(
        &self,
        context: &mut E,
        state: &mut S,
        user: &PublicKey,
        mission_type: MissionType,
        now_secs: u64,
    ) -> Result<MissionCompletion, MissionError> {
        if !self.registry.is_active(mission_type) {
            return Err(MissionError::Inactive(mission_type));
        }
        let info = *self
            .registry
            .get_info(mission_type)
            .ok_or(MissionError::Inactive(mission_type))?;
        let reward = i64::try_from(info.reward)
            .map_err(|_| LedgerError::Storage(anyhow!("mission reward exceeds ledger range")))?;

        let today = day_index(now_secs);
        let progress_key = Key::MissionProgress(user.clone(), mission_type);
        let balance_key = Key::Balance(user.clone());

        let mut backoff = ledger::RETRY_BASE_BACKOFF;
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let prior_progress = state
                .get(&progress_key)
                .await
                .map_err(MissionError::Storage)?;
            let record = decode_progress(&prior_progress);
            if record.completed_on(today) {
                let chips = ledger::balance(state, user).await?;
                return Ok(already_completed(info, &record, today, chips));
            }

            let prior_balance = state
                .get(&balance_key)
                .await
                .map_err(MissionError::Storage)?;
            let observed = match &prior_balance {
                Some(Value::Balance(chips)) => *chips,
                _ => 0,
            };

            // Stage the date-stamp and the credit together; the reward
            // flows through the Balance Ledger against the overlay.
            let mut overlay = Overlay::new(&*state);
            overlay
                .insert(
                    progress_key.clone(),
                    Value::MissionProgress(MissionProgress::stamped(today)),
                )
                .await
                .map_err(MissionError::Storage)?;
            let receipt = ledger::apply_delta(&mut overlay, user, reward, observed).await?;
            let changes = overlay.commit();

            let guards = [
                (progress_key.clone(), prior_progress),
                (balance_key.clone(), prior_balance),
            ];
            match state
                .apply_guarded(&guards, changes)
                .await
                .map_err(MissionError::Storage)?
            {
                GuardOutcome::Applied => {
                    debug!(
                        user = ?user,
                        mission = mission_type.as_str(),
                        reward = info.reward,
                        "mission completed"
                    );
                    let record = MissionProgress::stamped(today);
                    return Ok(MissionCompletion {
                        status: CompletionStatus::Granted,
                        progress: status(info, &record, today),
                        chip_balance: receipt.new_balance,
                    });
                }
                GuardOutcome::Stale(index) => {
                    if index == 0 {
                        // Another tab stamped the progress row first.
                        debug!(
                            user = ?user,
                            mission = mission_type.as_str(),
                            "concurrent completion; absorbing as already completed"
                        );
                        let record = load_progress(state, user, mission_type).await?;
                        if record.completed_on(today) {
                            let chips = ledger::balance(state, user).await?;
                            return Ok(already_completed(info, &record, today, chips));
                        }
                        // The row changed but not to today's stamp; take
                        // another look.
                    } else {
                        debug!(
                            attempt,
                            mission = mission_type.as_str(),
                            "balance moved during completion; retrying"
                        );
                    }
                    if attempt >= ledger::MAX_ATTEMPTS {
                        let current = ledger::balance(state, user).await?;
                        return Err(LedgerError::Exhausted {
                            attempts: attempt,
                            current,
                        }
                        .into());
                    }
                    let delay = jittered_backoff(context, backoff)
                        .max(Duration::from_millis(ledger::RETRY_AFTER_HINT_MS));
                    context.sleep(delay).await;
                    backoff = backoff.saturating_mul(2).min(ledger::RETRY_MAX_BACKOFF);
                }
            }
        }
    }
}

async fn load_progress<S: State>(
    state: &S,
    user: &PublicKey,
    mission_type: MissionType,
) -> Result<MissionProgress, MissionError> {
    let row = state
        .get(&Key::MissionProgress(user.clone(), mission_type))
        .await
        .map_err(MissionError::Storage)?;
    Ok(decode_progress(&row))
}

fn decode_progress(row: &Option<Value>) -> MissionProgress {
    match row {
        Some(Value::MissionProgress(progress)) => progress.clone(),
        _ => MissionProgress::default(),
    }
}

fn status(info: MissionInfo, record: &MissionProgress, today: u64) -> MissionStatus {
    MissionStatus {
        info,
        completed_today: record.completed_on(today),
        completed_day: record.completed_day,
    }
}

fn already_completed(
    info: MissionInfo,
    record: &MissionProgress,
    today: u64,
    chip_balance: u64,
) -> MissionCompletion {
    MissionCompletion {
        status: CompletionStatus::AlreadyCompleted,
        progress: status(info, record, today),
        chip_balance,
    }
}
