//! Test fixtures shared across the crate and downstream consumers.

use crate::achievements::AchievementContext;
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    Signer as _,
};
use commonware_math::algebra::Random as _;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeSet;

/// Deterministic user keypair from a seed.
pub fn create_user_keypair(seed: u64) -> (PrivateKey, PublicKey) {
    let mut rng = StdRng::seed_from_u64(seed);
    let private = PrivateKey::random(&mut rng);
    let public = private.public_key();
    (private, public)
}

/// Deterministic user identity from a seed.
pub fn create_user(seed: u64) -> PublicKey {
    create_user_keypair(seed).1
}

/// A statistics snapshot with everything zeroed and no prior grants.
pub fn empty_context(user: PublicKey) -> AchievementContext {
    AchievementContext {
        user,
        overall_rank: None,
        total_wins: 0,
        total_losses: 0,
        total_hands_played: 0,
        biggest_win: 0,
        total_net_profit: 0,
        current_chip_balance: 0,
        recent_win_amount: None,
        existing: BTreeSet::new(),
    }
}
