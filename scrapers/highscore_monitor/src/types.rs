use serde::{Deserialize, Serialize};

/// One player's row as scraped from the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub online: bool,
    pub vocation: String,
    pub experience: u64,
    pub level: u32,
    pub level_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerEntity {
    pub id: i64,
    pub name: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub timestamp: i64,
    pub player_id: i64,
    pub level_rank: u32,
    pub online: bool,
    pub level: u32,
    pub experience: u64,
}

impl NewSnapshot {
    pub fn from_record(record: &PlayerRecord, player_id: i64, timestamp: i64) -> Self {
        Self {
            timestamp,
            player_id,
            level_rank: record.level_rank,
            online: record.online,
            level: record.level,
            experience: record.experience,
        }
    }
}

/// A persisted row of the `experience` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub timestamp: i64,
    pub player_id: i64,
    pub level_rank: i64,
    pub online: bool,
    pub level: i64,
    pub experience: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub timestamp: i64,
    pub recorded: usize,
    pub new_players: usize,
}
