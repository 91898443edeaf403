use async_trait::async_trait;
use rusqlite::params;

use murmur_types::models::{Comment, CommentAuthor, NewComment};

use crate::codec::{encode_time, now, time_at};
use crate::error::is_foreign_key_violation;
use crate::store::CommentStore;
use crate::{Database, StoreError};

pub struct SqliteComments {
    db: Database,
}

impl SqliteComments {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentStore for SqliteComments {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        self.db
            .run(move |conn| {
                let created_at = now();

                conn.execute(
                    "INSERT INTO comments (post_id, user_id, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![comment.post_id, comment.user_id, comment.content, encode_time(created_at)],
                )
                .map_err(|e| {
                    if is_foreign_key_violation(&e) {
                        StoreError::NotFound
                    } else {
                        StoreError::Sqlite(e)
                    }
                })?;
                let id = conn.last_insert_rowid();

                let username: String = conn.query_row(
                    "SELECT username FROM users WHERE id = ?1",
                    [comment.user_id],
                    |row| row.get(0),
                )?;

                Ok(Comment {
                    id,
                    post_id: comment.post_id,
                    user_id: comment.user_id,
                    content: comment.content,
                    created_at,
                    user: CommentAuthor {
                        id: comment.user_id,
                        username,
                    },
                })
            })
            .await
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        self.db
            .run(move |conn| {
                // JOIN users to fetch the author in the same query (no N+1)
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, u.username
                     FROM comments c
                     JOIN users u ON u.id = c.user_id
                     WHERE c.post_id = ?1
                     ORDER BY c.created_at DESC, c.id DESC",
                )?;

                let comments = stmt
                    .query_map([post_id], |row| {
                        let user_id: i64 = row.get(2)?;
                        Ok(Comment {
                            id: row.get(0)?,
                            post_id: row.get(1)?,
                            user_id,
                            content: row.get(3)?,
                            created_at: time_at(row, 4)?,
                            user: CommentAuthor {
                                id: user_id,
                                username: row.get(5)?,
                            },
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(comments)
            })
            .await
    }
}
