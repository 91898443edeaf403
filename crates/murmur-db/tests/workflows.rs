use chrono::Duration;
use murmur_crypto::InvitationToken;
use murmur_db::{Database, DbConfig, Storage, StoreError};
use murmur_types::models::{NewComment, NewPost, NewUser, User};

struct Harness {
    _dir: tempfile::TempDir,
    db: Database,
    storage: Storage,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DbConfig::new(dir.path().join("test.db"));
    config.max_open_conns = 4;
    config.max_idle_conns = 1;
    let db = Database::open(&config).await.unwrap();
    let storage = Storage::sqlite(db.clone());
    Harness { _dir: dir, db, storage }
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.into(),
        email: format!("{name}@example.com"),
        password_hash: "not-a-real-hash".into(),
    }
}

async fn active_user(storage: &Storage, name: &str) -> User {
    let token = InvitationToken::generate();
    let user = storage
        .users
        .create_and_invite(new_user(name), token.digest, Duration::hours(1))
        .await
        .unwrap();
    storage.users.activate(&token.plaintext).await.unwrap();
    user
}

async fn count(db: &Database, table: &'static str) -> i64 {
    db.run(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn register_stores_user_and_hashed_invitation() {
    let h = harness().await;
    let token = InvitationToken::generate();
    let digest = token.digest.clone();

    let user = h
        .storage
        .users
        .create_and_invite(new_user("alice"), token.digest, Duration::hours(72))
        .await
        .unwrap();
    assert!(!user.is_active);
    assert_eq!(count(&h.db, "users").await, 1);
    assert_eq!(count(&h.db, "user_invitations").await, 1);

    let stored: String = h
        .db
        .run(|conn| {
            Ok(conn.query_row("SELECT token_hash FROM user_invitations", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
    assert_eq!(stored, digest);
    assert_ne!(stored, token.plaintext);

    // Inactive users cannot log in
    assert!(matches!(
        h.storage.users.get_credentials_by_email("alice@example.com").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn duplicate_registration_rolls_back_completely() {
    let h = harness().await;
    active_user(&h.storage, "alice").await;

    let mut dup_email = new_user("alice2");
    dup_email.email = "ALICE@example.com".into();
    let err = h
        .storage
        .users
        .create_and_invite(dup_email, "d1".into(), Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEmail));

    let mut dup_name = new_user("alice");
    dup_name.email = "other@example.com".into();
    let err = h
        .storage
        .users
        .create_and_invite(dup_name, "d2".into(), Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUsername));

    assert_eq!(count(&h.db, "users").await, 1);
    assert_eq!(count(&h.db, "user_invitations").await, 0);
}

#[tokio::test]
async fn invitation_is_single_use_and_expires() {
    let h = harness().await;
    let token = InvitationToken::generate();
    h.storage
        .users
        .create_and_invite(new_user("bob"), token.digest, Duration::hours(1))
        .await
        .unwrap();

    h.storage.users.activate(&token.plaintext).await.unwrap();
    assert!(matches!(
        h.storage.users.activate(&token.plaintext).await,
        Err(StoreError::NotFound)
    ));

    let creds = h
        .storage
        .users
        .get_credentials_by_email("bob@example.com")
        .await
        .unwrap();
    assert!(creds.user.is_active);
    assert_eq!(creds.password_hash, "not-a-real-hash");

    let late = InvitationToken::generate();
    h.storage
        .users
        .create_and_invite(new_user("carol"), late.digest, Duration::hours(-1))
        .await
        .unwrap();
    assert!(matches!(
        h.storage.users.activate(&late.plaintext).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(count(&h.db, "user_invitations").await, 1);

    let carol_active: bool = h
        .db
        .run(|conn| {
            Ok(conn.query_row(
                "SELECT is_active FROM users WHERE username = 'carol'",
                [],
                |row| row.get(0),
            )?)
        })
        .await
        .unwrap();
    assert!(!carol_active);
    assert!(matches!(
        h.storage.users.get_credentials_by_email("carol@example.com").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn username_clash_is_reported_before_email_clash() {
    let h = harness().await;
    active_user(&h.storage, "alice").await;
    active_user(&h.storage, "bob").await;

    let err = h
        .storage
        .users
        .create_and_invite(
            NewUser {
                username: "bob".into(),
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
            },
            InvitationToken::generate().digest,
            Duration::hours(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUsername));
}

#[tokio::test]
async fn concurrent_updates_from_same_version_have_one_winner() {
    let h = harness().await;
    let user = active_user(&h.storage, "dave").await;
    let post = h
        .storage
        .posts
        .create(NewPost {
            title: "draft".into(),
            content: "body".into(),
            user_id: user.id,
            tags: vec!["b".into(), "a".into()],
        })
        .await
        .unwrap();
    assert_eq!(post.version, 0);

    let mut first = post.clone();
    first.title = "first".into();
    let mut second = post.clone();
    second.title = "second".into();

    let posts = h.storage.posts.clone();
    let other = h.storage.posts.clone();
    let (a, b) = tokio::join!(
        async move { posts.update(&mut first, 0).await.map(|_| first) },
        async move { other.update(&mut second, 0).await.map(|_| second) },
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(StoreError::Conflict)));

    let stored = h.storage.posts.get_by_id(post.id).await.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.tags, ["b", "a"]);
}

#[tokio::test]
async fn update_and_delete_of_missing_post_are_not_found() {
    let h = harness().await;
    let user = active_user(&h.storage, "erin").await;
    let mut post = h
        .storage
        .posts
        .create(NewPost {
            title: "gone".into(),
            content: "soon".into(),
            user_id: user.id,
            tags: vec![],
        })
        .await
        .unwrap();

    h.storage
        .comments
        .create(NewComment {
            post_id: post.id,
            user_id: user.id,
            content: "first".into(),
        })
        .await
        .unwrap();

    h.storage.posts.delete(post.id).await.unwrap();
    assert_eq!(count(&h.db, "comments").await, 0);

    assert!(matches!(h.storage.posts.delete(post.id).await, Err(StoreError::NotFound)));
    assert!(matches!(
        h.storage.posts.update(&mut post, 0).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn comments_carry_their_author_newest_first() {
    let h = harness().await;
    let author = active_user(&h.storage, "frank").await;
    let reader = active_user(&h.storage, "grace").await;
    let post = h
        .storage
        .posts
        .create(NewPost {
            title: "t".into(),
            content: "c".into(),
            user_id: author.id,
            tags: vec![],
        })
        .await
        .unwrap();

    for (user, text) in [(&author, "one"), (&reader, "two")] {
        h.storage
            .comments
            .create(NewComment {
                post_id: post.id,
                user_id: user.id,
                content: text.into(),
            })
            .await
            .unwrap();
    }

    let comments = h.storage.comments.list_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].content, "two");
    assert_eq!(comments[0].user.username, "grace");
    assert_eq!(comments[1].user.username, "frank");

    let missing = h
        .storage
        .comments
        .create(NewComment {
            post_id: post.id + 100,
            user_id: author.id,
            content: "orphan".into(),
        })
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn follow_edges() {
    let h = harness().await;
    let a = active_user(&h.storage, "a").await;
    let b = active_user(&h.storage, "b").await;

    h.storage.followers.follow(a.id, b.id).await.unwrap();
    assert!(matches!(
        h.storage.followers.follow(a.id, b.id).await,
        Err(StoreError::Conflict)
    ));
    assert!(matches!(
        h.storage.followers.follow(a.id, 999).await,
        Err(StoreError::NotFound)
    ));

    h.storage.followers.unfollow(a.id, b.id).await.unwrap();
    h.storage.followers.unfollow(a.id, b.id).await.unwrap();
    assert_eq!(count(&h.db, "followers").await, 0);
}

#[test]
fn registration_queued_past_deadline_leaves_no_rows() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DbConfig::new(dir.path().join("test.db"));
        config.query_timeout = std::time::Duration::from_millis(50);
        let db = Database::open(&config).await.unwrap();
        let storage = Storage::sqlite(db.clone());

        // Hold the only blocking thread past the deadline
        let busy = tokio::task::spawn_blocking(|| {
            std::thread::sleep(std::time::Duration::from_millis(300))
        });
        let result = storage
            .users
            .create_and_invite(new_user("frank"), InvitationToken::generate().digest, Duration::hours(1))
            .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));

        busy.await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(count(&db, "users").await, 0);
        assert_eq!(count(&db, "user_invitations").await, 0);

        // Nothing was left behind, so a retry goes through
        storage
            .users
            .create_and_invite(new_user("frank"), InvitationToken::generate().digest, Duration::hours(1))
            .await
            .unwrap();
    });
}
