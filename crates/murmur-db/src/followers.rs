use async_trait::async_trait;
use rusqlite::params;
use tracing::debug;

use crate::codec::{encode_time, now};
use crate::error::{is_foreign_key_violation, unique_violation};
use crate::store::FollowerStore;
use crate::{Database, StoreError};

pub struct SqliteFollowers {
    db: Database,
}

impl SqliteFollowers {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FollowerStore for SqliteFollowers {
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO followers (user_id, follower_id, created_at) VALUES (?1, ?2, ?3)",
                    params![user_id, follower_id, encode_time(now())],
                )
                .map_err(|e| {
                    if unique_violation(&e).is_some() {
                        StoreError::Conflict
                    } else if is_foreign_key_violation(&e) {
                        StoreError::NotFound
                    } else {
                        StoreError::Sqlite(e)
                    }
                })?;

                debug!(follower_id, user_id, "follow edge created");
                Ok(())
            })
            .await
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.db
            .run(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM followers WHERE user_id = ?1 AND follower_id = ?2",
                    params![user_id, follower_id],
                )?;

                debug!(follower_id, user_id, removed, "unfollow");
                Ok(())
            })
            .await
    }
}
