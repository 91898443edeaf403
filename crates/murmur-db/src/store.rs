use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use murmur_types::models::{
    Comment, FeedFilter, FeedItem, NewComment, NewPost, NewUser, Post, User, UserCredentials,
};

use crate::comments::SqliteComments;
use crate::followers::SqliteFollowers;
use crate::memory::MemoryStore;
use crate::posts::SqlitePosts;
use crate::users::SqliteUsers;
use crate::{Database, StoreError};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a pending user and its invitation in one transaction.
    /// `token_digest` is the hash of the plaintext token the caller keeps.
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_digest: String,
        ttl: Duration,
    ) -> Result<User, StoreError>;

    /// Redeem an invitation: mark its user active and delete it.
    /// Unknown and expired tokens are both `NotFound`.
    async fn activate(&self, plaintext_token: &str) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError>;

    /// Active users only.
    async fn get_credentials_by_email(&self, email: &str) -> Result<UserCredentials, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError>;

    /// Write `post`'s title, content and tags if the stored version is still
    /// `expected_version`. On success `post.version` and `post.updated_at`
    /// are refreshed. A stale version is `Conflict`, a missing post `NotFound`.
    async fn update(&self, post: &mut Post, expected_version: i64) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Posts by `user_id` and everyone they follow.
    async fn feed(&self, user_id: i64, filter: &FeedFilter) -> Result<Vec<FeedItem>, StoreError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError>;

    /// Newest first.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, StoreError>;
}

#[async_trait]
pub trait FollowerStore: Send + Sync {
    /// `follower_id` starts following `user_id`. An existing edge is `Conflict`.
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;

    /// Removing an edge that does not exist is not an error.
    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;
}

/// Every entity store the HTTP layer needs, behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub comments: Arc<dyn CommentStore>,
    pub followers: Arc<dyn FollowerStore>,
}

impl Storage {
    pub fn sqlite(db: Database) -> Self {
        Self {
            users: Arc::new(SqliteUsers::new(db.clone())),
            posts: Arc::new(SqlitePosts::new(db.clone())),
            comments: Arc::new(SqliteComments::new(db.clone())),
            followers: Arc::new(SqliteFollowers::new(db)),
        }
    }

    /// Process-local store with the same semantics, for tests.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            users: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            followers: store,
        }
    }
}
