//! Contention tests for the ledger and mission engine.
//!
//! A rival writer is interposed at the guarded-write boundary, which is
//! exactly where a second browser tab or a concurrent request would land:
//! after our read, before our write. The tests pin down the absorption and
//! give-up behavior those races must produce.

#[cfg(test)]
mod tests {
    use crate::ledger;
    use crate::missions::{CompletionStatus, MissionEngine};
    use crate::mocks::create_user;
    use crate::state::{GuardOutcome, Memory, State, Status};
    use anyhow::Result;
    use commonware_cryptography::ed25519::PublicKey;
    use commonware_runtime::{deterministic::Runner, Clock as _, Runner as _};
    use parlay_types::{
        Key, LedgerError, MissionError, MissionProgress, MissionType, Value,
    };
    use std::time::Duration;

    const NOON: u64 = 1_700_000_000;

    /// Completes the same mission for the same user right before our first
    /// guarded write lands, like a second tab winning the race.
    struct RivalCompletion {
        inner: Memory,
        user: PublicKey,
        mission: MissionType,
        day: u64,
        reward: u64,
        fired: bool,
    }

    impl State for RivalCompletion {
        async fn get(&self, key: &Key) -> Result<Option<Value>> {
            self.inner.get(key).await
        }

        async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
            self.inner.insert(key, value).await
        }

        async fn delete(&mut self, key: &Key) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn apply_guarded(
            &mut self,
            guards: &[(Key, Option<Value>)],
            changes: Vec<(Key, Status)>,
        ) -> Result<GuardOutcome> {
            if !self.fired {
                self.fired = true;
                self.inner
                    .insert(
                        Key::MissionProgress(self.user.clone(), self.mission),
                        Value::MissionProgress(MissionProgress::stamped(self.day)),
                    )
                    .await?;
                self.inner
                    .insert(Key::Balance(self.user.clone()), Value::Balance(self.reward))
                    .await?;
            }
            self.inner.apply_guarded(guards, changes).await
        }
    }

    /// Moves the balance row before each of the next `remaining` guarded
    /// writes, forcing the balance guard stale that many times.
    struct ContestedBalance {
        inner: Memory,
        key: Key,
        bump: u64,
        remaining: u32,
    }

    impl State for ContestedBalance {
        async fn get(&self, key: &Key) -> Result<Option<Value>> {
            self.inner.get(key).await
        }

        async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
            self.inner.insert(key, value).await
        }

        async fn delete(&mut self, key: &Key) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn apply_guarded(
            &mut self,
            guards: &[(Key, Option<Value>)],
            changes: Vec<(Key, Status)>,
        ) -> Result<GuardOutcome> {
            if self.remaining > 0 {
                self.remaining -= 1;
                let current = match self.inner.get(&self.key).await? {
                    Some(Value::Balance(chips)) => chips,
                    _ => 0,
                };
                self.inner
                    .insert(self.key.clone(), Value::Balance(current + self.bump))
                    .await?;
            }
            self.inner.apply_guarded(guards, changes).await
        }
    }

    #[test]
    fn test_racing_completion_absorbed_as_already_completed() {
        let executor = Runner::default();
        executor.start(|mut context| async move {
            let engine = MissionEngine::default();
            let user = create_user(1);
            let reward = engine
                .registry()
                .get_info(MissionType::DailyLogin)
                .unwrap()
                .reward;
            let mut state = RivalCompletion {
                inner: Memory::default(),
                user: user.clone(),
                mission: MissionType::DailyLogin,
                day: parlay_types::day_index(NOON),
                reward,
                fired: false,
            };

            let completion = engine
                .complete(&mut context, &mut state, &user, MissionType::DailyLogin, NOON)
                .await
                .unwrap();

            // The rival's credit stands; ours was never applied.
            assert_eq!(completion.status, CompletionStatus::AlreadyCompleted);
            assert_eq!(completion.chip_balance, reward);
            assert!(completion.progress.completed_today);
            assert_eq!(ledger::balance(&state, &user).await.unwrap(), reward);
        });
    }

    #[test]
    fn test_balance_contention_retries_until_guards_hold() {
        let executor = Runner::default();
        executor.start(|mut context| async move {
            let engine = MissionEngine::default();
            let user = create_user(1);
            let mut state = ContestedBalance {
                inner: Memory::default(),
                key: Key::Balance(user.clone()),
                bump: 111,
                remaining: 2,
            };

            let completion = engine
                .complete(&mut context, &mut state, &user, MissionType::DailyLogin, NOON)
                .await
                .unwrap();

            // Two lost rounds, then a clean read-recompute-apply.
            assert_eq!(completion.status, CompletionStatus::Granted);
            assert_eq!(completion.chip_balance, 2 * 111 + 500);
            assert_eq!(
                ledger::balance(&state, &user).await.unwrap(),
                2 * 111 + 500
            );
        });
    }

    #[test]
    fn test_unyielding_contention_leaves_no_orphan_stamp() {
        let executor = Runner::default();
        executor.start(|mut context| async move {
            let engine = MissionEngine::default();
            let user = create_user(1);
            let mut state = ContestedBalance {
                inner: Memory::default(),
                key: Key::Balance(user.clone()),
                bump: 7,
                remaining: u32::MAX,
            };

            let err = engine
                .complete(&mut context, &mut state, &user, MissionType::DailyLogin, NOON)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                MissionError::Ledger(LedgerError::Exhausted {
                    attempts: ledger::MAX_ATTEMPTS,
                    ..
                })
            ));

            // No half-applied completion: the stamp and the credit failed
            // together.
            let progress = state
                .get(&Key::MissionProgress(user.clone(), MissionType::DailyLogin))
                .await
                .unwrap();
            assert_eq!(progress, None);
            let status = engine
                .progress(&state, &user, MissionType::DailyLogin, NOON)
                .await
                .unwrap();
            assert!(!status.completed_today);
        });
    }

    #[test]
    fn test_ledger_retry_exhausts_with_backoff() {
        let executor = Runner::default();
        executor.start(|mut context| async move {
            let user = create_user(1);
            let mut state = ContestedBalance {
                inner: Memory::default(),
                key: Key::Balance(user.clone()),
                bump: 13,
                remaining: u32::MAX,
            };

            let start = context.current();
            let err = ledger::apply_delta_with_retry(&mut context, &mut state, &user, 100)
                .await
                .unwrap_err();
            match err {
                LedgerError::Exhausted { attempts, .. } => {
                    assert_eq!(attempts, ledger::MAX_ATTEMPTS);
                }
                other => panic!("expected exhaustion, got {other:?}"),
            }

            // Four conflicts were retried, each after at least the
            // retry-after floor of virtual time.
            let elapsed = context.current().duration_since(start).unwrap();
            assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
        });
    }

    #[test]
    fn test_ledger_retry_recovers_after_transient_conflicts() {
        let executor = Runner::default();
        executor.start(|mut context| async move {
            let user = create_user(1);
            let mut state = ContestedBalance {
                inner: Memory::default(),
                key: Key::Balance(user.clone()),
                bump: 40,
                remaining: 2,
            };

            let start = context.current();
            let receipt = ledger::apply_delta_with_retry(&mut context, &mut state, &user, 100)
                .await
                .unwrap();

            // Two lost rounds, then success over the moved balance.
            assert_eq!(receipt.new_balance, 2 * 40 + 100);
            assert_eq!(ledger::balance(&state, &user).await.unwrap(), 2 * 40 + 100);

            // Each retry slept at least the retry-after floor.
            let elapsed = context.current().duration_since(start).unwrap();
            assert!(elapsed >= Duration::from_millis(50), "elapsed {elapsed:?}");
        });
    }

    #[test]
    fn test_mission_conflict_retries_consume_backoff_time() {
        let executor = Runner::default();
        executor.start(|mut context| async move {
            let engine = MissionEngine::default();
            let user = create_user(1);
            let mut state = ContestedBalance {
                inner: Memory::default(),
                key: Key::Balance(user.clone()),
                bump: 111,
                remaining: 3,
            };

            let start = context.current();
            let completion = engine
                .complete(&mut context, &mut state, &user, MissionType::DailyLogin, NOON)
                .await
                .unwrap();
            assert_eq!(completion.status, CompletionStatus::Granted);
            assert_eq!(completion.chip_balance, 3 * 111 + 500);

            // Three stale-balance rounds each slept at least the
            // retry-after floor of virtual time; no hot-looping against
            // the store.
            let elapsed = context.current().duration_since(start).unwrap();
            assert!(elapsed >= Duration::from_millis(75), "elapsed {elapsed:?}");
        });
    }
}
