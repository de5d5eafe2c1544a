//! Chip Balance Ledger.
//!
//! A single `u64` chip balance per user, mutated with optimistic
//! concurrency: every write carries the balance the caller last observed
//! and fails with [`LedgerError::Conflict`] if the stored balance moved in
//! the meantime. The conflict carries the authoritative current balance so
//! the caller can recompute and retry.
//!
//! Deltas that would drive the balance negative are rejected with
//! [`LedgerError::InsufficientFunds`] before any write is attempted; the
//! balance is never silently clamped.

use crate::backoff::jittered_backoff;
use crate::state::{GuardOutcome, State, Status};
use anyhow::{anyhow, Context as _};
use commonware_cryptography::ed25519::PublicKey;
use commonware_runtime::Clock;
use parlay_types::{Key, LedgerError, Value};
use rand::RngCore;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum optimistic-concurrency attempts before surfacing a hard failure.
pub const MAX_ATTEMPTS: u32 = 5;

/// Initial retry backoff, doubled (with equal jitter) per conflict.
pub const RETRY_BASE_BACKOFF: Duration = Duration::from_millis(10);

/// Ceiling for the exponential backoff.
pub const RETRY_MAX_BACKOFF: Duration = Duration::from_millis(250);

/// Retry-after hint attached to conflicts; retriers observe it as a floor.
pub const RETRY_AFTER_HINT_MS: u64 = 25;

/// Result of a successful balance mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub new_balance: u64,
}

/// Read the current chip balance. An absent row reads as zero.
pub async fn balance<S: State>(state: &S, user: &PublicKey) -> Result<u64, LedgerError> {
    Ok(load(state, user).await?.1)
}

async fn load<S: State>(
    state: &S,
    user: &PublicKey,
) -> Result<(Option<Value>, u64), LedgerError> {
    let row = state
        .get(&Key::Balance(user.clone()))
        .await
        .context("load balance")?;
    let chips = match &row {
        Some(Value::Balance(chips)) => *chips,
        _ => 0,
    };
    Ok((row, chips))
}

/// Apply `delta` to the user's balance iff it still equals
/// `expected_previous`.
///
/// The write itself is guarded on the balance row, so a writer that sneaks
/// in between our read and the apply is also reported as a conflict with
/// the then-authoritative balance.
pub async fn apply_delta<S: State>(
    state: &mut S,
    user: &PublicKey,
    delta: i64,
    expected_previous: u64,
) -> Result<Receipt, LedgerError> {
    let key = Key::Balance(user.clone());
    let (row, current) = load(state, user).await?;
    if current != expected_previous {
        return Err(LedgerError::Conflict {
            expected: expected_previous,
            current,
            retry_after_ms: RETRY_AFTER_HINT_MS,
        });
    }

    let next = current as i128 + delta as i128;
    if next < 0 {
        return Err(LedgerError::InsufficientFunds {
            balance: current,
            delta,
        });
    }
    let next =
        u64::try_from(next).map_err(|_| LedgerError::Storage(anyhow!("chip balance overflow")))?;

    let outcome = state
        .apply_guarded(
            &[(key.clone(), row)],
            vec![(key, Status::Update(Value::Balance(next)))],
        )
        .await
        .context("write balance")?;
    match outcome {
        GuardOutcome::Applied => Ok(Receipt { new_balance: next }),
        GuardOutcome::Stale(_) => {
            let current = balance(state, user).await?;
            debug!(current, expected_previous, "balance moved before write");
            Err(LedgerError::Conflict {
                expected: expected_previous,
                current,
                retry_after_ms: RETRY_AFTER_HINT_MS,
            })
        }
    }
}

/// Re-read/recompute retry loop around [`apply_delta`].
///
/// Conflicts are retried up to [`MAX_ATTEMPTS`] times with jittered
/// exponential backoff, honoring the conflict's `retry_after_ms` hint as a
/// floor. Past the cap the caller gets [`LedgerError::Exhausted`] with the
/// last observed balance.
pub async fn apply_delta_with_retry<S: State, E: Clock + RngCore>(
    context: &mut E,
    state: &mut S,
    user: &PublicKey,
    delta: i64,
) -> Result<Receipt, LedgerError> {
    let mut backoff = RETRY_BASE_BACKOFF;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let observed = balance(state, user).await?;
        match apply_delta(state, user, delta, observed).await {
            Ok(receipt) => return Ok(receipt),
            Err(LedgerError::Conflict {
                current,
                retry_after_ms,
                ..
            }) if attempt < MAX_ATTEMPTS => {
                warn!(attempt, current, delta, "balance conflict; retrying");
                let delay = jittered_backoff(context, backoff)
                    .max(Duration::from_millis(retry_after_ms));
                context.sleep(delay).await;
                backoff = backoff.saturating_mul(2).min(RETRY_MAX_BACKOFF);
            }
            Err(LedgerError::Conflict { current, .. }) => {
                warn!(attempt, current, delta, "balance conflict; giving up");
                return Err(LedgerError::Exhausted {
                    attempts: attempt,
                    current,
                });
            }
            Err(err) => return Err(err),
        }
    }
}
