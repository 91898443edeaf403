use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use murmur_types::models::{FeedFilter, FeedItem, NewPost, Post};

use crate::codec::{encode_tags, encode_time, now, tags_at, time_at};
use crate::error::is_foreign_key_violation;
use crate::feed;
use crate::store::PostStore;
use crate::{Database, StoreError};

pub(crate) const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.user_id, p.tags, p.version, p.created_at, p.updated_at";

pub struct SqlitePosts {
    db: Database,
}

impl SqlitePosts {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostStore for SqlitePosts {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        self.db
            .run(move |conn| {
                let created_at = now();
                let tags = encode_tags(&post.tags)?;

                conn.execute(
                    "INSERT INTO posts (title, content, user_id, tags, version, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                    params![post.title, post.content, post.user_id, tags, encode_time(created_at)],
                )
                .map_err(|e| {
                    if is_foreign_key_violation(&e) {
                        StoreError::NotFound
                    } else {
                        StoreError::Sqlite(e)
                    }
                })?;

                Ok(Post {
                    id: conn.last_insert_rowid(),
                    title: post.title,
                    content: post.content,
                    user_id: post.user_id,
                    tags: post.tags,
                    version: 0,
                    created_at,
                    updated_at: created_at,
                })
            })
            .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        self.db
            .run(move |conn| {
                conn.query_row(
                    &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
                    [id],
                    post_from_row,
                )
                .optional()?
                .ok_or(StoreError::NotFound)
            })
            .await
    }

    async fn update(&self, post: &mut Post, expected_version: i64) -> Result<(), StoreError> {
        let id = post.id;
        let title = post.title.clone();
        let content = post.content.clone();
        let tags = encode_tags(&post.tags)?;

        let (version, updated_at) = self
            .db
            .run(move |conn| {
                let updated_at = now();

                // Compare-and-swap on the version column; no lock outlives the statement
                let version: Option<i64> = conn
                    .query_row(
                        "UPDATE posts
                         SET title = ?1, content = ?2, tags = ?3,
                             version = version + 1, updated_at = ?4
                         WHERE id = ?5 AND version = ?6
                         RETURNING version",
                        params![title, content, tags, encode_time(updated_at), id, expected_version],
                        |row| row.get(0),
                    )
                    .optional()?;

                match version {
                    Some(version) => Ok((version, updated_at)),
                    None => {
                        // Zero rows: tell a stale version apart from a missing post
                        let exists = conn
                            .query_row("SELECT 1 FROM posts WHERE id = ?1", [id], |_| Ok(()))
                            .optional()?
                            .is_some();
                        debug!(post_id = id, expected_version, exists, "post update matched no row");
                        Err(if exists { StoreError::Conflict } else { StoreError::NotFound })
                    }
                }
            })
            .await?;

        post.version = version;
        post.updated_at = updated_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.db
            .run(move |conn| match conn.execute("DELETE FROM posts WHERE id = ?1", [id])? {
                0 => Err(StoreError::NotFound),
                _ => Ok(()),
            })
            .await
    }

    async fn feed(&self, user_id: i64, filter: &FeedFilter) -> Result<Vec<FeedItem>, StoreError> {
        let filter = filter.clone();
        self.db
            .run(move |conn| feed::query(conn, user_id, &filter))
            .await
    }
}

/// Maps the eight `POST_COLUMNS`, starting at column 0.
pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        tags: tags_at(row, 4)?,
        version: row.get(5)?,
        created_at: time_at(row, 6)?,
        updated_at: time_at(row, 7)?,
    })
}
