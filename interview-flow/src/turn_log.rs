use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::error::{InterviewError, Result};

/// Who a logged turn is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Interviewer,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Interviewer => "interviewer",
            Role::Patient => "patient",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "interviewer" => Some(Role::Interviewer),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }
}

/// One append-only log row. `visible` is decided at write time; the renderer
/// never re-inspects message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: i64,
    pub role: Role,
    pub message: String,
    pub visible: bool,
}

impl Turn {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let role_str: String = row.get("role");
        let role = Role::from_str(&role_str)
            .ok_or_else(|| InterviewError::UnknownRole(role_str.clone()))?;
        Ok(Turn {
            id: row.get("id"),
            role,
            message: row.get("message"),
            visible: row.get("visible"),
        })
    }
}

/// Append-only persistent record of every (role, message) pair, backed by a
/// single SQLite table keyed by a monotonic id.
#[derive(Clone)]
pub struct TurnLog {
    pool: SqlitePool,
}

impl TurnLog {
    /// Connect and create the table if it does not exist yet.
    ///
    /// The pool is capped at one connection: the exchange protocol is
    /// strictly sequential per session, and a single connection keeps
    /// `sqlite::memory:` databases coherent in tests.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                message TEXT NOT NULL,
                visible INTEGER NOT NULL DEFAULT 1
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Insert one row; the id is auto-assigned and monotonically increasing.
    /// Storage errors propagate, never silently dropped.
    pub async fn append(&self, role: Role, message: &str, visible: bool) -> Result<i64> {
        let result = sqlx::query("INSERT INTO chat_history (role, message, visible) VALUES (?, ?, ?)")
            .bind(role.as_str())
            .bind(message)
            .bind(visible)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// The highest-id row for the given role, if any.
    pub async fn latest(&self, role: Role) -> Result<Option<Turn>> {
        let row = sqlx::query(
            "SELECT id, role, message, visible FROM chat_history
             WHERE role = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Turn::from_row(&r)).transpose()
    }

    /// All rows in insertion order.
    pub async fn turns(&self) -> Result<Vec<Turn>> {
        let rows = sqlx::query("SELECT id, role, message, visible FROM chat_history ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Turn::from_row).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chat_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_log() -> TurnLog {
        TurnLog::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_ids() {
        let log = memory_log().await;

        let a = log.append(Role::Interviewer, "first", true).await.unwrap();
        let b = log.append(Role::Patient, "second", true).await.unwrap();
        let c = log.append(Role::Interviewer, "third", true).await.unwrap();

        assert!(a < b && b < c);
        assert_eq!(log.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_latest_per_role_ignores_interleaving() {
        let log = memory_log().await;

        log.append(Role::Interviewer, "q1", true).await.unwrap();
        log.append(Role::Patient, "a1", true).await.unwrap();
        log.append(Role::Interviewer, "q2", true).await.unwrap();
        log.append(Role::Patient, "a2", true).await.unwrap();
        log.append(Role::Interviewer, "q3", true).await.unwrap();

        let latest_q = log.latest(Role::Interviewer).await.unwrap().unwrap();
        let latest_a = log.latest(Role::Patient).await.unwrap().unwrap();
        assert_eq!(latest_q.message, "q3");
        assert_eq!(latest_a.message, "a2");
    }

    #[tokio::test]
    async fn test_latest_absent_on_empty_log() {
        let log = memory_log().await;
        assert!(log.latest(Role::Interviewer).await.unwrap().is_none());
        assert!(log.latest(Role::Patient).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_visibility_is_stored() {
        let log = memory_log().await;

        log.append(Role::Interviewer, "hidden", false).await.unwrap();
        let turn = log.latest(Role::Interviewer).await.unwrap().unwrap();
        assert!(!turn.visible);

        let turns = log.turns().await.unwrap();
        assert_eq!(turns.len(), 1);
    }
}
