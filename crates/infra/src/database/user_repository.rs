//! User repository backed by SQLite
//!
//! Users are stored as one JSON document per row. The account-linking flow
//! that writes them lives outside the engine; here we read them and write
//! refreshed tokens back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use schej_core::UserRepository;
use schej_domain::{AccountCredentials, OAuthTokens, Result as DomainResult, SchejError, User};
use tokio::task;

use super::manager::{map_join_error, map_json_error, map_sql_error, DbManager};

/// SQLite-backed implementation of [`UserRepository`]
pub struct SqliteUserRepository {
    db: Arc<DbManager>,
}

impl SqliteUserRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn get_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<User>> {
            let conn = db.get_connection()?;
            load_user(&conn, &id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, user: &User) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user = user.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            store_user(&conn, &user)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_account_tokens(
        &self,
        user_id: &str,
        account_email: &str,
        tokens: &OAuthTokens,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let account_email = account_email.to_string();
        let tokens = tokens.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let mut user = load_user(&tx, &user_id)?
                .ok_or_else(|| SchejError::NotFound(format!("user {user_id}")))?;
            let account = user.account_mut(&account_email).ok_or_else(|| {
                SchejError::NotFound(format!("account {account_email} of user {user_id}"))
            })?;

            match &mut account.credentials {
                AccountCredentials::OAuth(existing) => *existing = tokens,
                AccountCredentials::Basic(_) => {
                    return Err(SchejError::InvalidInput(format!(
                        "account {account_email} does not use OAuth tokens"
                    )));
                }
            }

            store_user(&tx, &user)?;
            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn load_user(conn: &Connection, id: &str) -> DomainResult<Option<User>> {
    let document: Option<String> = conn
        .query_row("SELECT document FROM users WHERE id = ?1", params![id], |row| row.get(0))
        .optional()
        .map_err(map_sql_error)?;

    document.map(|doc| serde_json::from_str(&doc).map_err(map_json_error)).transpose()
}

fn store_user(conn: &Connection, user: &User) -> DomainResult<()> {
    let document = serde_json::to_string(user).map_err(map_json_error)?;
    conn.execute(
        "INSERT INTO users (id, email, document, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            document = excluded.document,
            updated_at = excluded.updated_at",
        params![user.id, user.email, document, Utc::now().timestamp_millis()],
    )
    .map_err(map_sql_error)?;
    Ok(())
}
