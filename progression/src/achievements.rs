//! Achievement rule engine.
//!
//! The registry binds each achievement id to its catalog metadata and one
//! pure predicate over an [`AchievementContext`] snapshot. Evaluation runs
//! every predicate and returns only the newly-qualifying ids: anything the
//! user already holds is skipped here regardless of the snapshot, as a
//! second line of defense behind the storage-layer uniqueness constraint.
//!
//! Thresholds are part of the contract with the frontend, not an
//! implementation detail.

use crate::notifications::ToastEntry;
use commonware_cryptography::ed25519::PublicKey;
use parlay_types::{AchievementCategory, AchievementId};
use serde::Serialize;
use std::collections::BTreeSet;

/// Highest leaderboard rank that still earns Rising Star.
pub const RISING_STAR_MAX_RANK: u32 = 50;

/// Highest leaderboard rank that still earns High Roller.
pub const HIGH_ROLLER_MAX_RANK: u32 = 10;

/// Total wins required for Consistent.
pub const CONSISTENT_MIN_WINS: u64 = 100;

/// A pre-win balance below this counts as "nearly broke" for Comeback.
pub const COMEBACK_FLOOR: u64 = 1_000;

/// Caller-assembled snapshot of a player's statistics.
///
/// Ephemeral: assembled fresh from the statistics source on every check and
/// never persisted.
#[derive(Clone, Debug)]
pub struct AchievementContext {
    pub user: PublicKey,
    pub overall_rank: Option<u32>,
    pub total_wins: u64,
    pub total_losses: u64,
    pub total_hands_played: u64,
    pub biggest_win: u64,
    pub total_net_profit: i64,
    pub current_chip_balance: u64,
    /// Present only immediately after a settled round.
    pub recent_win_amount: Option<u64>,
    /// Ids already granted to this user; never re-granted.
    pub existing: BTreeSet<AchievementId>,
}

/// Achievement catalog metadata for UI display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AchievementInfo {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub category: AchievementCategory,
    pub icon: &'static str,
}

type Predicate = fn(&AchievementContext) -> bool;

/// Static catalog plus predicate dispatch table.
pub struct AchievementRegistry {
    entries: Vec<(AchievementInfo, Predicate)>,
}

impl Default for AchievementRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                (
                    AchievementInfo {
                        id: AchievementId::RisingStar,
                        name: "Rising Star",
                        description: "Reach the leaderboard top 50",
                        category: AchievementCategory::Leaderboard,
                        icon: "🌟",
                    },
                    rising_star,
                ),
                (
                    AchievementInfo {
                        id: AchievementId::HighRoller,
                        name: "High Roller",
                        description: "Reach the leaderboard top 10",
                        category: AchievementCategory::Leaderboard,
                        icon: "🎩",
                    },
                    high_roller,
                ),
                (
                    AchievementInfo {
                        id: AchievementId::Champion,
                        name: "Champion",
                        description: "Claim the number one spot",
                        category: AchievementCategory::Leaderboard,
                        icon: "👑",
                    },
                    champion,
                ),
                (
                    AchievementInfo {
                        id: AchievementId::Consistent,
                        name: "Consistent",
                        description: "Win 100 rounds",
                        category: AchievementCategory::Milestone,
                        icon: "🏆",
                    },
                    consistent,
                ),
                (
                    AchievementInfo {
                        id: AchievementId::Comeback,
                        name: "Comeback",
                        description: "Win a round while nearly broke",
                        category: AchievementCategory::Milestone,
                        icon: "🔥",
                    },
                    comeback,
                ),
            ],
        }
    }
}

impl AchievementRegistry {
    pub fn get_info(&self, id: AchievementId) -> Option<&AchievementInfo> {
        self.entries
            .iter()
            .find(|(info, _)| info.id == id)
            .map(|(info, _)| info)
    }

    /// Catalog entries in the given category, in catalog order.
    ///
    /// A category with no entries yields an empty list, not an error.
    pub fn by_category(&self, category: AchievementCategory) -> Vec<&AchievementInfo> {
        self.entries
            .iter()
            .filter(|(info, _)| info.category == category)
            .map(|(info, _)| info)
            .collect()
    }

    /// Whether `id` would be newly granted for this snapshot.
    pub fn qualifies(&self, id: AchievementId, context: &AchievementContext) -> bool {
        if context.existing.contains(&id) {
            return false;
        }
        self.entries
            .iter()
            .find(|(info, _)| info.id == id)
            .map(|(_, predicate)| predicate(context))
            .unwrap_or(false)
    }

    /// Run every predicate and return the newly-qualifying ids, in catalog
    /// order. The caller persists the grants and forwards the toasts.
    pub fn evaluate(&self, context: &AchievementContext) -> Vec<AchievementId> {
        self.entries
            .iter()
            .filter(|(info, _)| !context.existing.contains(&info.id))
            .filter(|(_, predicate)| predicate(context))
            .map(|(info, _)| info.id)
            .collect()
    }

    /// Build the notification entry for a granted achievement.
    pub fn toast(&self, id: AchievementId) -> Option<ToastEntry> {
        self.get_info(id).map(|info| ToastEntry {
            id: info.id,
            name: info.name.to_string(),
            icon: info.icon.to_string(),
        })
    }
}

fn rising_star(context: &AchievementContext) -> bool {
    matches!(context.overall_rank, Some(rank) if rank <= RISING_STAR_MAX_RANK)
}

fn high_roller(context: &AchievementContext) -> bool {
    matches!(context.overall_rank, Some(rank) if rank <= HIGH_ROLLER_MAX_RANK)
}

fn champion(context: &AchievementContext) -> bool {
    context.overall_rank == Some(1)
}

fn consistent(context: &AchievementContext) -> bool {
    context.total_wins >= CONSISTENT_MIN_WINS
}

/// Rewards recovering from near-zero, not merely winning big: the pre-round
/// balance is reconstructed exactly as `current - recent_win` (integers, no
/// rounding) and must have been under [`COMEBACK_FLOOR`].
fn comeback(context: &AchievementContext) -> bool {
    match context.recent_win_amount {
        Some(win) if win > 0 => context.current_chip_balance.saturating_sub(win) < COMEBACK_FLOOR,
        _ => false,
    }
}
