use async_trait::async_trait;
use chrono::Duration;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;

use murmur_crypto::hash_token;
use murmur_types::models::{NewUser, User, UserCredentials};

use crate::codec::{encode_time, now, time_at};
use crate::error::unique_violation;
use crate::store::UserStore;
use crate::{Database, StoreError};

const USER_COLUMNS: &str = "id, username, email, is_active, created_at";

pub struct SqliteUsers {
    db: Database,
}

impl SqliteUsers {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SqliteUsers {
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_digest: String,
        ttl: Duration,
    ) -> Result<User, StoreError> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let created_at = now();

                tx.execute(
                    "INSERT INTO users (username, email, password_hash, is_active, created_at)
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    params![user.username, user.email, user.password_hash, encode_time(created_at)],
                )
                .map_err(map_insert_error)?;
                let id = tx.last_insert_rowid();

                tx.execute(
                    "INSERT INTO user_invitations (token_hash, user_id, expiry) VALUES (?1, ?2, ?3)",
                    params![token_digest, id, encode_time(created_at + ttl)],
                )?;

                tx.commit()?;
                debug!(user_id = id, "created pending user with invitation");

                Ok(User {
                    id,
                    username: user.username,
                    email: user.email,
                    is_active: false,
                    created_at,
                })
            })
            .await
    }

    async fn activate(&self, plaintext_token: &str) -> Result<(), StoreError> {
        let digest = hash_token(plaintext_token);

        self.db
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let user_id: i64 = tx
                    .query_row(
                        "SELECT u.id
                         FROM user_invitations ui
                         JOIN users u ON u.id = ui.user_id
                         WHERE ui.token_hash = ?1 AND ui.expiry > ?2",
                        params![digest, encode_time(now())],
                        |row| row.get(0),
                    )
                    .optional()?
                    .ok_or(StoreError::NotFound)?;

                tx.execute("UPDATE users SET is_active = 1 WHERE id = ?1", [user_id])?;
                tx.execute("DELETE FROM user_invitations WHERE user_id = ?1", [user_id])?;

                tx.commit()?;
                debug!(user_id, "user activated");
                Ok(())
            })
            .await
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.db
            .run(move |conn| {
                conn.query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    [id],
                    user_from_row,
                )
                .optional()?
                .ok_or(StoreError::NotFound)
            })
            .await
    }

    async fn get_credentials_by_email(&self, email: &str) -> Result<UserCredentials, StoreError> {
        let email = email.to_owned();

        self.db
            .run(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {USER_COLUMNS}, password_hash FROM users
                         WHERE email = ?1 AND is_active = 1"
                    ),
                    [email],
                    |row| {
                        Ok(UserCredentials {
                            user: user_from_row(row)?,
                            password_hash: row.get(5)?,
                        })
                    },
                )
                .optional()?
                .ok_or(StoreError::NotFound)
            })
            .await
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get(3)?,
        created_at: time_at(row, 4)?,
    })
}

/// Tell the caller which unique field collided.
fn map_insert_error(err: rusqlite::Error) -> StoreError {
    match unique_violation(&err) {
        Some(detail) if detail.contains("users.email") => StoreError::DuplicateEmail,
        Some(detail) if detail.contains("users.username") => StoreError::DuplicateUsername,
        _ => StoreError::Sqlite(err),
    }
}
