//! Repository layer for the deal event journal.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::domain::{DealId, Timestamp};
use crate::engine::DealEvent;

/// A journaled event row, as served to clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EventRow {
    pub id: i64,
    pub deal_id: String,
    pub kind: String,
    pub actor: Option<String>,
    pub state: Option<String>,
    pub detail: serde_json::Value,
    pub at_secs: i64,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Append one event to the journal.
    pub async fn record_event(&self, event: &DealEvent, at: Timestamp) -> Result<(), sqlx::Error> {
        let (actor, state) = match event {
            DealEvent::StateChanged { actor, state, .. } => {
                (Some(actor.to_string()), Some(state.to_string()))
            }
            DealEvent::Message { sender, .. } => (Some(sender.to_string()), None),
            DealEvent::FeedbackGiven { .. } => (None, None),
            DealEvent::ClaimAsserted { asserter, .. } => (Some(asserter.to_string()), None),
            DealEvent::ClaimChallenged { challenger, .. } => (Some(challenger.to_string()), None),
        };
        let detail = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());

        sqlx::query(
            r#"
            INSERT INTO deal_events (deal_id, kind, actor, state, detail, at_secs)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.deal_id().to_string())
        .bind(event.kind())
        .bind(actor)
        .bind(state)
        .bind(detail)
        .bind(at.as_secs())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List all journaled events for a deal in insertion order.
    pub async fn list_events(&self, deal: DealId) -> Result<Vec<EventRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, deal_id, kind, actor, state, detail, at_secs
            FROM deal_events
            WHERE deal_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(deal.to_string())
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .iter()
            .map(|row| {
                let detail: String = row.get("detail");
                EventRow {
                    id: row.get("id"),
                    deal_id: row.get("deal_id"),
                    kind: row.get("kind"),
                    actor: row.get("actor"),
                    state: row.get("state"),
                    detail: serde_json::from_str(&detail)
                        .unwrap_or(serde_json::Value::Null),
                    at_secs: row.get("at_secs"),
                }
            })
            .collect();

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{AccountId, DealState};
    use tempfile::TempDir;

    async fn repo() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (temp_dir, Repository::new(pool))
    }

    #[tokio::test]
    async fn test_record_and_list_events() {
        let (_guard, repo) = repo().await;
        let deal = DealId::new();

        repo.record_event(
            &DealEvent::StateChanged {
                deal,
                state: DealState::Created,
                actor: AccountId::new("taker"),
            },
            Timestamp::new(100),
        )
        .await
        .unwrap();
        repo.record_event(
            &DealEvent::Message {
                deal,
                sender: AccountId::new("owner"),
                body: "hello".to_string(),
            },
            Timestamp::new(150),
        )
        .await
        .unwrap();

        let events = repo.list_events(deal).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, "state");
        assert_eq!(events[0].state.as_deref(), Some("created"));
        assert_eq!(events[1].kind, "message");
        assert_eq!(events[1].at_secs, 150);

        // Other deals see nothing.
        let other = repo.list_events(DealId::new()).await.unwrap();
        assert!(other.is_empty());
    }
}
