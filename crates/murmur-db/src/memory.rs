//! In-process store. Mirrors the SQLite stores' observable behavior so the
//! HTTP layer can be tested without a database file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use murmur_crypto::hash_token;
use murmur_types::models::{
    Comment, CommentAuthor, FeedFilter, FeedItem, NewComment, NewPost, NewUser, Post, SortOrder,
    User, UserCredentials,
};

use crate::StoreError;
use crate::codec::now;
use crate::store::{CommentStore, FollowerStore, PostStore, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_user: i64,
    next_post: i64,
    next_comment: i64,
    users: BTreeMap<i64, UserCredentials>,
    /// token digest -> (user id, expiry)
    invitations: HashMap<String, (i64, DateTime<Utc>)>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    /// (user_id, follower_id)
    followers: HashSet<(i64, i64)>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn username(&self, user_id: i64) -> Result<String, StoreError> {
        self.users
            .get(&user_id)
            .map(|c| c.user.username.clone())
            .ok_or(StoreError::NotFound)
    }

    fn sees(&self, viewer: i64, author: i64) -> bool {
        viewer == author || self.followers.contains(&(author, viewer))
    }
}

fn matches_filter(post: &Post, filter: &FeedFilter) -> bool {
    if !filter.tags.iter().all(|t| post.tags.contains(t)) {
        return false;
    }
    if !filter.search.is_empty() {
        // LIKE folds ASCII letters only
        let needle = filter.search.to_ascii_lowercase();
        if !post.title.to_ascii_lowercase().contains(&needle)
            && !post.content.to_ascii_lowercase().contains(&needle)
        {
            return false;
        }
    }
    if filter.since.is_some_and(|since| post.created_at < since) {
        return false;
    }
    if filter.until.is_some_and(|until| post.created_at > until) {
        return false;
    }
    true
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_digest: String,
        ttl: Duration,
    ) -> Result<User, StoreError> {
        let mut state = self.lock();

        // The username index is checked before the email one in SQLite
        let existing = || state.users.values().map(|c| &c.user);
        if existing().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        if existing().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::DuplicateEmail);
        }

        state.next_user += 1;
        let created = User {
            id: state.next_user,
            username: user.username,
            email: user.email,
            is_active: false,
            created_at: now(),
        };

        state
            .invitations
            .insert(token_digest, (created.id, created.created_at + ttl));
        state.users.insert(
            created.id,
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );

        Ok(created)
    }

    async fn activate(&self, plaintext_token: &str) -> Result<(), StoreError> {
        let digest = hash_token(plaintext_token);
        let mut state = self.lock();

        let user_id = match state.invitations.get(&digest) {
            Some(&(user_id, expiry)) if expiry > now() => user_id,
            _ => return Err(StoreError::NotFound),
        };

        let creds = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        creds.user.is_active = true;
        state.invitations.retain(|_, (id, _)| *id != user_id);
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.lock()
            .users
            .get(&id)
            .map(|c| c.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_credentials_by_email(&self, email: &str) -> Result<UserCredentials, StoreError> {
        self.lock()
            .users
            .values()
            .find(|c| c.user.is_active && c.user.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut state = self.lock();
        if !state.users.contains_key(&post.user_id) {
            return Err(StoreError::NotFound);
        }

        state.next_post += 1;
        let created_at = now();
        let created = Post {
            id: state.next_post,
            title: post.title,
            content: post.content,
            user_id: post.user_id,
            tags: post.tags,
            version: 0,
            created_at,
            updated_at: created_at,
        };
        state.posts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        self.lock().posts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, post: &mut Post, expected_version: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let stored = state.posts.get_mut(&post.id).ok_or(StoreError::NotFound)?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict);
        }

        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.tags = post.tags.clone();
        stored.version += 1;
        stored.updated_at = now();

        post.version = stored.version;
        post.updated_at = stored.updated_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.posts.remove(&id).ok_or(StoreError::NotFound)?;
        state.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }

    async fn feed(&self, user_id: i64, filter: &FeedFilter) -> Result<Vec<FeedItem>, StoreError> {
        let state = self.lock();

        let mut posts: Vec<&Post> = state
            .posts
            .values()
            .filter(|p| state.sees(user_id, p.user_id) && matches_filter(p, filter))
            .collect();

        posts.sort_by_key(|p| (p.created_at, p.id));
        if filter.sort == SortOrder::Desc {
            posts.reverse();
        }

        posts
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .map(|p| {
                let comments_count =
                    state.comments.values().filter(|c| c.post_id == p.id).count() as i64;
                Ok(FeedItem {
                    post: p.clone(),
                    username: state.username(p.user_id)?,
                    comments_count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let mut state = self.lock();
        if !state.posts.contains_key(&comment.post_id) {
            return Err(StoreError::NotFound);
        }
        let username = state.username(comment.user_id)?;

        state.next_comment += 1;
        let created = Comment {
            id: state.next_comment,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: now(),
            user: CommentAuthor {
                id: comment.user_id,
                username,
            },
        };
        state.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        let state = self.lock();
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(comments)
    }
}

#[async_trait]
impl FollowerStore for MemoryStore {
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.users.contains_key(&follower_id) || !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        if !state.followers.insert((user_id, follower_id)) {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.lock().followers.remove(&(user_id, follower_id));
        Ok(())
    }
}
