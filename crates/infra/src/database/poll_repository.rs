//! Poll repository backed by SQLite
//!
//! Each poll is a JSON document. Writes that touch one part of a poll
//! (a response, a remindee flag, the scheduled event) run as IMMEDIATE
//! transactions that re-read the document, so concurrent writers for
//! different participants serialize instead of overwriting each other.
//! `poll_participants` mirrors the response keys for "joined" lookups.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use schej_core::PollRepository;
use schej_domain::{Poll, Response, Result as DomainResult, ScheduledEvent, SchejError};
use tokio::task;
use tracing::debug;

use super::manager::{map_join_error, map_json_error, map_sql_error, DbManager};

/// SQLite-backed implementation of [`PollRepository`]
pub struct SqlitePollRepository {
    db: Arc<DbManager>,
}

impl SqlitePollRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Run `f` on the stored poll inside an IMMEDIATE transaction. The
    /// document is written back only when `f` returns `Some`.
    async fn modify<T, F>(&self, poll_id: &str, f: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Poll) -> DomainResult<(T, bool)> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let poll_id = poll_id.to_string();

        task::spawn_blocking(move || -> DomainResult<T> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let mut poll = load_poll(&tx, &poll_id)?
                .ok_or_else(|| SchejError::NotFound(format!("poll {poll_id}")))?;
            let (value, dirty) = f(&mut poll)?;

            if dirty {
                update_poll(&tx, &poll)?;
                tx.commit().map_err(map_sql_error)?;
            }
            Ok(value)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl PollRepository for SqlitePollRepository {
    async fn get_by_id(&self, id: &str) -> DomainResult<Option<Poll>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Poll>> {
            let conn = db.get_connection()?;
            load_poll(&conn, &id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn create(&self, poll: &Poll) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let poll = poll.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let document = serde_json::to_string(&poll).map_err(map_json_error)?;
            tx.execute(
                "INSERT INTO polls (id, owner_id, finalized, created_at, document)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    poll.id,
                    poll.owner_id,
                    poll.is_finalized(),
                    poll.created_at.timestamp_millis(),
                    document
                ],
            )
            .map_err(map_sql_error)?;
            sync_participants(&tx, &poll)?;

            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert_response(&self, poll_id: &str, response: &Response) -> DomainResult<()> {
        let response = response.clone();
        self.modify(poll_id, move |poll| {
            poll.responses.upsert(response);
            Ok(((), true))
        })
        .await
    }

    async fn mark_remindee_responded(&self, poll_id: &str, email: &str) -> DomainResult<bool> {
        let email = email.to_string();
        self.modify(poll_id, move |poll| {
            let matched = poll.mark_remindee_responded(&email);
            Ok((matched, matched))
        })
        .await
    }

    async fn record_scheduled_event(
        &self,
        poll_id: &str,
        event: &ScheduledEvent,
    ) -> DomainResult<bool> {
        let event = event.clone();
        let recorded = self
            .modify(poll_id, move |poll| {
                if poll.is_finalized() {
                    return Ok((false, false));
                }
                poll.scheduled_event = Some(event);
                Ok((true, true))
            })
            .await?;

        debug!(poll_id, recorded, "scheduled event compare-and-set");
        Ok(recorded)
    }

    async fn update_scheduled_event(
        &self,
        poll_id: &str,
        event: &ScheduledEvent,
    ) -> DomainResult<()> {
        let event = event.clone();
        self.modify(poll_id, move |poll| {
            if !poll.is_finalized() {
                return Err(SchejError::Conflict(format!(
                    "poll {} has no scheduled event to update",
                    poll.id
                )));
            }
            poll.scheduled_event = Some(event);
            Ok(((), true))
        })
        .await
    }

    async fn list_for_user(&self, user_id: &str) -> DomainResult<Vec<Poll>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<Poll>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT document FROM polls
                     WHERE owner_id = ?1
                        OR id IN (SELECT poll_id FROM poll_participants WHERE participant_id = ?1)
                     ORDER BY created_at DESC, id",
                )
                .map_err(map_sql_error)?;

            let documents = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(map_sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_sql_error)?;

            documents
                .iter()
                .map(|doc| serde_json::from_str(doc).map_err(map_json_error))
                .collect()
        })
        .await
        .map_err(map_join_error)?
    }
}

fn load_poll(conn: &Connection, id: &str) -> DomainResult<Option<Poll>> {
    let document: Option<String> = conn
        .query_row("SELECT document FROM polls WHERE id = ?1", params![id], |row| row.get(0))
        .optional()
        .map_err(map_sql_error)?;

    document.map(|doc| serde_json::from_str(&doc).map_err(map_json_error)).transpose()
}

fn update_poll(conn: &Connection, poll: &Poll) -> DomainResult<()> {
    let document = serde_json::to_string(poll).map_err(map_json_error)?;
    conn.execute(
        "UPDATE polls SET finalized = ?2, document = ?3 WHERE id = ?1",
        params![poll.id, poll.is_finalized(), document],
    )
    .map_err(map_sql_error)?;
    sync_participants(conn, poll)
}

fn sync_participants(conn: &Connection, poll: &Poll) -> DomainResult<()> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO poll_participants (poll_id, participant_id) VALUES (?1, ?2)",
        )
        .map_err(map_sql_error)?;
    for response in poll.responses.iter() {
        stmt.execute(params![poll.id, response.participant.as_str()]).map_err(map_sql_error)?;
    }
    Ok(())
}
