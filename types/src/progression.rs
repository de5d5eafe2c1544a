//! Data model for the progression/economy core.
//!
//! Everything persisted by the progression engine is expressed as a
//! [`Key`]/[`Value`] pair with a stable `commonware-codec` encoding. The
//! identifier enums double as the catalog keys for the static mission and
//! achievement registries in `parlay-progression`.

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};
use commonware_cryptography::ed25519::PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds in a calendar day (UTC, no leap-second handling).
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Convert a Unix timestamp (seconds) to a UTC day index.
///
/// Mission completion is scoped by day index, not elapsed duration: a record
/// stamped late yesterday is stale one second after midnight.
#[inline]
pub fn day_index(now_secs: u64) -> u64 {
    now_secs / SECONDS_PER_DAY
}

/// Daily mission types matching the frontend mission catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MissionType {
    DailyLogin = 0,
    DailyHands = 1,
    DailyWin = 2,
}

impl MissionType {
    /// Stable string id used by the surrounding application.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLogin => "daily_login",
            Self::DailyHands => "daily_hands",
            Self::DailyWin => "daily_win",
        }
    }
}

impl Write for MissionType {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for MissionType {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::DailyLogin),
            1 => Ok(Self::DailyHands),
            2 => Ok(Self::DailyWin),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for MissionType {
    const SIZE: usize = 1;
}

/// One-time-ever achievement badges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AchievementId {
    RisingStar = 0,
    HighRoller = 1,
    Champion = 2,
    Consistent = 3,
    Comeback = 4,
}

impl AchievementId {
    /// Stable string id used by the surrounding application.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RisingStar => "rising_star",
            Self::HighRoller => "high_roller",
            Self::Champion => "champion",
            Self::Consistent => "consistent",
            Self::Comeback => "comeback",
        }
    }
}

impl Write for AchievementId {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for AchievementId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::RisingStar),
            1 => Ok(Self::HighRoller),
            2 => Ok(Self::Champion),
            3 => Ok(Self::Consistent),
            4 => Ok(Self::Comeback),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for AchievementId {
    const SIZE: usize = 1;
}

/// Achievement catalog categories.
///
/// `Seasonal` is reserved for limited-time badges; the current catalog
/// assigns none, so category queries for it return an empty list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AchievementCategory {
    Leaderboard = 0,
    Milestone = 1,
    Seasonal = 2,
}

impl Write for AchievementCategory {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for AchievementCategory {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Leaderboard),
            1 => Ok(Self::Milestone),
            2 => Ok(Self::Seasonal),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for AchievementCategory {
    const SIZE: usize = 1;
}

/// Per-(user, mission) completion record.
///
/// Absent row means "never completed"; `completed_day` is a UTC day index.
/// There is no explicit reset: staleness is recomputed on every read by
/// comparing the stored day to today's.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionProgress {
    pub completed_day: Option<u64>,
}

impl MissionProgress {
    /// A record stamped with the given day index.
    pub fn stamped(day: u64) -> Self {
        Self {
            completed_day: Some(day),
        }
    }

    /// Whether this record counts as completed for the given day.
    pub fn completed_on(&self, day: u64) -> bool {
        self.completed_day == Some(day)
    }
}

impl Write for MissionProgress {
    fn write(&self, writer: &mut impl BufMut) {
        self.completed_day.write(writer);
    }
}

impl Read for MissionProgress {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            completed_day: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for MissionProgress {
    fn encode_size(&self) -> usize {
        self.completed_day.encode_size()
    }
}

/// Storage keys for the progression core.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Chip balance row for a user.
    Balance(PublicKey),
    /// Completion record for a (user, mission) pair.
    MissionProgress(PublicKey, MissionType),
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Key::Balance(user) => {
                0u8.write(writer);
                user.write(writer);
            }
            Key::MissionProgress(user, mission) => {
                1u8.write(writer);
                user.write(writer);
                mission.write(writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Key::Balance(PublicKey::read(reader)?)),
            1 => Ok(Key::MissionProgress(
                PublicKey::read(reader)?,
                MissionType::read(reader)?,
            )),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        1 + match self {
            Key::Balance(user) => user.encode_size(),
            Key::MissionProgress(user, mission) => user.encode_size() + mission.encode_size(),
        }
    }
}

/// Storage values for the progression core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Chip balance (non-negative by construction).
    Balance(u64),
    /// Mission completion record.
    MissionProgress(MissionProgress),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Value::Balance(chips) => {
                0u8.write(writer);
                chips.write(writer);
            }
            Value::MissionProgress(progress) => {
                1u8.write(writer);
                progress.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Value::Balance(u64::read(reader)?)),
            1 => Ok(Value::MissionProgress(MissionProgress::read(reader)?)),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        1 + match self {
            Value::Balance(chips) => chips.encode_size(),
            Value::MissionProgress(progress) => progress.encode_size(),
        }
    }
}

/// Balance Ledger failures.
///
/// `Conflict` is recoverable: the caller re-reads the authoritative balance
/// (carried in the error) and retries with backoff. `InsufficientFunds` is
/// terminal for the requested delta and is rejected before any write.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient funds: balance {balance} cannot absorb delta {delta}")]
    InsufficientFunds { balance: u64, delta: i64 },
    #[error("balance conflict: expected {expected}, current {current}")]
    Conflict {
        expected: u64,
        current: u64,
        /// Minimum delay the caller should observe before retrying.
        retry_after_ms: u64,
    },
    #[error("balance conflict retries exhausted after {attempts} attempts")]
    Exhausted { attempts: u32, current: u64 },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Mission Engine failures.
///
/// A repeated same-day completion is not an error; it surfaces as an
/// `AlreadyCompleted` status on the success path.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("mission {} is not active", .0.as_str())]
    Inactive(MissionType),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("storage unavailable")]
    Storage(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};

    #[test]
    fn test_day_index_boundaries() {
        assert_eq!(day_index(0), 0);
        assert_eq!(day_index(SECONDS_PER_DAY - 1), 0);
        assert_eq!(day_index(SECONDS_PER_DAY), 1);
        assert_eq!(day_index(3 * SECONDS_PER_DAY + 7), 3);
    }

    #[test]
    fn test_mission_progress_staleness() {
        let progress = MissionProgress::stamped(100);
        assert!(progress.completed_on(100));
        // Yesterday's stamp is not today's completion.
        assert!(!progress.completed_on(101));
        assert!(!MissionProgress::default().completed_on(100));
    }

    #[test]
    fn test_value_round_trip() {
        let values = [
            Value::Balance(0),
            Value::Balance(u64::MAX),
            Value::MissionProgress(MissionProgress::default()),
            Value::MissionProgress(MissionProgress::stamped(19_700)),
        ];
        for value in values {
            let encoded = value.encode();
            assert_eq!(encoded.len(), value.encode_size());
            let decoded = Value::decode(encoded).expect("decode");
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_unknown_enum_tags_rejected() {
        assert!(MissionType::decode(&[9u8][..]).is_err());
        assert!(AchievementId::decode(&[9u8][..]).is_err());
        assert!(Value::decode(&[9u8][..]).is_err());
    }

    #[test]
    fn test_identifier_serde_ids() {
        assert_eq!(
            serde_json::to_string(&MissionType::DailyLogin).unwrap(),
            "\"daily_login\""
        );
        assert_eq!(
            serde_json::to_string(&AchievementId::RisingStar).unwrap(),
            "\"rising_star\""
        );
        assert_eq!(MissionType::DailyWin.as_str(), "daily_win");
        assert_eq!(AchievementId::Comeback.as_str(), "comeback");
    }
}
