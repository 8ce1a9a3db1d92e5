use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};
use std::{path::Path, str::FromStr};
use tracing::{debug, info};

use crate::{
    error::MonitorError,
    types::{CycleReport, NewSnapshot, PlayerEntity, PlayerRecord, SnapshotRow},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    notes TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS experience (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    player_id INTEGER NOT NULL REFERENCES players (id),
    level_rank INTEGER NOT NULL,
    online INTEGER NOT NULL CHECK (online IN (0, 1)),
    level INTEGER NOT NULL,
    experience INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_experience_player_timestamp ON experience (player_id, timestamp);
"#;

/// What the poll loop needs from persistence.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Newest snapshot timestamp, 0 when nothing was recorded yet.
    async fn last_timestamp(&self) -> Result<i64, MonitorError>;

    /// Resolves and records every player of one cycle atomically.
    async fn record_cycle(
        &self,
        players: &[PlayerRecord],
        timestamp: i64,
    ) -> Result<CycleReport, MonitorError>;
}

/// Looks a player up by exact name, creating it with empty notes when
/// missing. Returns the id and whether the player already existed.
pub async fn resolve_player(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<(i64, bool), MonitorError> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM players WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok((id, true));
    }

    let id = sqlx::query("INSERT INTO players (name, notes) VALUES (?, '')")
        .bind(name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    debug!("Created player {:?} with id {}", name, id);
    Ok((id, false))
}

/// Appends one snapshot row. Rows are never updated afterwards.
pub async fn record_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &NewSnapshot,
) -> Result<i64, MonitorError> {
    let experience = i64::try_from(snapshot.experience)
        .map_err(|e| MonitorError::Store(sqlx::Error::Encode(Box::new(e))))?;

    let id = sqlx::query(
        r#"
        INSERT INTO experience (timestamp, player_id, level_rank, online, level, experience)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(snapshot.timestamp)
    .bind(snapshot.player_id)
    .bind(i64::from(snapshot.level_rank))
    .bind(i64::from(snapshot.online))
    .bind(i64::from(snapshot.level))
    .bind(experience)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `database_url` and makes
    /// sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, MonitorError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if let Some(parent) = Path::new(options.get_filename()).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // One connection: the monitor is the only writer, and in-memory
        // databases are private to their connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Opened snapshot store at {}", database_url);
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), MonitorError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn resolve(&self, name: &str) -> Result<(i64, bool), MonitorError> {
        let mut conn = self.pool.acquire().await?;
        resolve_player(&mut conn, name).await
    }

    pub async fn record(&self, snapshot: &NewSnapshot) -> Result<i64, MonitorError> {
        let mut conn = self.pool.acquire().await?;
        record_snapshot(&mut conn, snapshot).await
    }

    /// Lookup without the create-on-miss step of [`resolve_player`].
    pub async fn find_player(&self, name: &str) -> Result<Option<PlayerEntity>, MonitorError> {
        let player = sqlx::query_as::<_, PlayerEntity>(
            "SELECT id, name, notes FROM players WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(player)
    }

    /// Every snapshot recorded for `name`, oldest first.
    pub async fn history(&self, name: &str) -> Result<Vec<SnapshotRow>, MonitorError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT e.id, e.timestamp, e.player_id, e.level_rank, e.online, e.level, e.experience
            FROM experience e
            JOIN players p ON p.id = e.player_id
            WHERE p.name = ?
            ORDER BY e.timestamp, e.id
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn last_timestamp(&self) -> Result<i64, MonitorError> {
        let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(timestamp), 0) FROM experience")
            .fetch_one(&self.pool)
            .await?;
        Ok(last)
    }

    async fn record_cycle(
        &self,
        players: &[PlayerRecord],
        timestamp: i64,
    ) -> Result<CycleReport, MonitorError> {
        let mut tx = self.pool.begin().await?;
        let mut new_players = 0;

        for player in players {
            let (player_id, existed) = resolve_player(&mut tx, &player.name).await?;
            if !existed {
                new_players += 1;
            }
            record_snapshot(&mut tx, &NewSnapshot::from_record(player, player_id, timestamp)).await?;
        }

        tx.commit().await?;

        Ok(CycleReport {
            timestamp,
            recorded: players.len(),
            new_players,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn player(name: &str, level: u32, experience: u64) -> PlayerRecord {
        PlayerRecord {
            name: name.to_string(),
            online: false,
            vocation: "Sorcerer".to_string(),
            experience,
            level,
            level_rank: 100,
        }
    }

    async fn count(store: &SqliteStore, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let store = memory_store().await;

        let (first_id, first_existed) = store.resolve("Nassir Sorc").await.unwrap();
        let (second_id, second_existed) = store.resolve("Nassir Sorc").await.unwrap();

        assert_eq!(first_id, second_id);
        assert!(!first_existed);
        assert!(second_existed);
        assert_eq!(count(&store, "players").await, 1);

        let entity = store.find_player("Nassir Sorc").await.unwrap().unwrap();
        assert_eq!(entity.notes, "");
    }

    #[tokio::test]
    async fn test_resolve_distinguishes_exact_names() {
        let store = memory_store().await;
        let (a, _) = store.resolve("Knightly").await.unwrap();
        let (b, existed) = store.resolve("knightly").await.unwrap();
        assert_ne!(a, b);
        assert!(!existed);
    }

    #[tokio::test]
    async fn test_find_player_does_not_create() {
        let store = memory_store().await;
        assert!(store.find_player("Ghost").await.unwrap().is_none());
        assert_eq!(count(&store, "players").await, 0);
    }

    #[tokio::test]
    async fn test_recording_appends_rows() {
        let store = memory_store().await;
        let (player_id, _) = store.resolve("Knightly").await.unwrap();

        let mut ids = Vec::new();
        for (i, timestamp) in [1_000, 1_300, 1_600].into_iter().enumerate() {
            let snapshot = NewSnapshot {
                timestamp,
                player_id,
                level_rank: 10,
                online: i % 2 == 0,
                level: 50,
                experience: 10_000_000,
            };
            ids.push(store.record(&snapshot).await.unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 3);
        let history = store.history("Knightly").await.unwrap();
        assert_eq!(history.len(), 3);
        let timestamps: Vec<i64> = history.iter().map(|row| row.timestamp).collect();
        assert_eq!(timestamps, vec![1_000, 1_300, 1_600]);
        assert!(history[0].online);
        assert!(!history[1].online);
    }

    #[tokio::test]
    async fn test_out_of_range_experience_is_store_error() {
        let store = memory_store().await;
        let (player_id, _) = store.resolve("Knightly").await.unwrap();
        let snapshot = NewSnapshot {
            timestamp: 1_000,
            player_id,
            level_rank: 1,
            online: true,
            level: 1,
            experience: u64::MAX,
        };

        let result = store.record(&snapshot).await;

        assert!(matches!(result, Err(MonitorError::Store(sqlx::Error::Encode(_)))));
        assert_eq!(count(&store, "experience").await, 0);
    }

    #[tokio::test]
    async fn test_last_timestamp() {
        let store = memory_store().await;
        assert_eq!(store.last_timestamp().await.unwrap(), 0);

        store.record_cycle(&[player("A", 8, 4200)], 1_000).await.unwrap();
        store.record_cycle(&[player("A", 9, 5000)], 1_300).await.unwrap();
        assert_eq!(store.last_timestamp().await.unwrap(), 1_300);
    }

    #[tokio::test]
    async fn test_record_cycle_reports_new_players() {
        let store = memory_store().await;

        let first = store
            .record_cycle(&[player("A", 8, 4200), player("B", 20, 98_000)], 1_000)
            .await
            .unwrap();
        assert_eq!(first, CycleReport { timestamp: 1_000, recorded: 2, new_players: 2 });

        let second = store
            .record_cycle(&[player("A", 9, 5000), player("C", 1, 0)], 1_300)
            .await
            .unwrap();
        assert_eq!(second, CycleReport { timestamp: 1_300, recorded: 2, new_players: 1 });

        assert_eq!(count(&store, "players").await, 3);
        assert_eq!(count(&store, "experience").await, 4);

        let history = store.history("A").await.unwrap();
        let levels: Vec<i64> = history.iter().map(|row| row.level).collect();
        assert_eq!(levels, vec![8, 9]);
        assert_eq!(history[1].experience, 5000);
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_no_rows() {
        let store = memory_store().await;
        sqlx::raw_sql(
            r#"
            CREATE TRIGGER reject_cursed BEFORE INSERT ON players
            WHEN NEW.name = 'Cursed'
            BEGIN
                SELECT RAISE(ABORT, 'cursed player');
            END;
            "#,
        )
        .execute(store.pool())
        .await
        .unwrap();

        let result = store
            .record_cycle(&[player("A", 8, 4200), player("Cursed", 1, 0)], 1_000)
            .await;

        assert!(matches!(result, Err(MonitorError::Store(_))));
        assert_eq!(count(&store, "players").await, 0);
        assert_eq!(count(&store, "experience").await, 0);
        assert_eq!(store.last_timestamp().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database").join("database.db3");
        let url = format!("sqlite://{}", path.display());

        {
            let store = SqliteStore::connect(&url).await.unwrap();
            store.record_cycle(&[player("A", 8, 4200)], 1_000).await.unwrap();
            store.pool().close().await;
        }
        assert!(path.exists());

        let reopened = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(reopened.last_timestamp().await.unwrap(), 1_000);
        assert!(reopened.find_player("A").await.unwrap().is_some());
    }
}
