pub mod progression;

pub use progression::{
    day_index, AchievementCategory, AchievementId, Key, LedgerError, MissionError,
    MissionProgress, MissionType, Value, SECONDS_PER_DAY,
};
