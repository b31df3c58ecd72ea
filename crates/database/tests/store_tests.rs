//! Store-level tests: repositories, conditional writes and the change feed.

use groupting_config::DatabaseConfig;
use groupting_database::{
    initialize_database, ChangeFeed, Chatroom, CreateGroupRequest, CreateUserRequest,
    DatabaseError, GroupStatus, MatchStore,
};
use tempfile::TempDir;

async fn create_test_store() -> (MatchStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("store.db").display()),
        max_connections: 4,
        busy_timeout_ms: 2_000,
    };
    let pool = initialize_database(&config).await.unwrap();
    (MatchStore::new(pool, ChangeFeed::new(64)), temp_dir)
}

fn group_request(id: &str, members: &[&str]) -> CreateGroupRequest {
    CreateGroupRequest {
        id: Some(id.to_string()),
        name: None,
        member_ids: members.iter().map(|m| m.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_group_lifecycle_through_repository() {
    let (store, _temp_dir) = create_test_store().await;
    let groups = store.groups();

    let created = groups.create(&group_request("g1", &["a", "b"])).await.unwrap();
    assert_eq!(created.status, GroupStatus::Idle);

    let seeking = groups.start_seeking("g1").await.unwrap();
    assert_eq!(seeking.status, GroupStatus::Seeking);
    assert_eq!(seeking.version, created.version + 1);

    let stored = groups.find_by_id("g1").await.unwrap().unwrap();
    assert_eq!(stored, seeking);

    let idle = groups.stop_seeking("g1").await.unwrap();
    assert_eq!(idle.status, GroupStatus::Idle);
    assert!(groups.find_by_status(GroupStatus::Seeking).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_seeking_rejects_missing_and_empty_groups() {
    let (store, _temp_dir) = create_test_store().await;
    let groups = store.groups();

    let missing = groups.start_seeking("nope").await.unwrap_err();
    assert!(matches!(missing, DatabaseError::NotFound(_)));

    groups.create(&group_request("empty", &[])).await.unwrap();
    let empty = groups.start_seeking("empty").await.unwrap_err();
    assert!(matches!(empty, DatabaseError::ValidationError(_)));
}

#[tokio::test]
async fn test_create_rejects_ids_containing_pair_separator() {
    let (store, _temp_dir) = create_test_store().await;
    let groups = store.groups();

    let err = groups.create(&group_request("a_b", &["x"])).await.unwrap_err();
    assert!(matches!(err, DatabaseError::ValidationError(_)));
    assert!(groups.find_by_id("a_b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_seeking_except_excludes_self_and_non_seeking() {
    let (store, _temp_dir) = create_test_store().await;
    let groups = store.groups();

    for id in ["g1", "g2", "g3", "g4"] {
        groups.create(&group_request(id, &["x"])).await.unwrap();
    }
    groups.start_seeking("g1").await.unwrap();
    groups.start_seeking("g2").await.unwrap();
    groups.start_seeking("g3").await.unwrap();

    let others: Vec<String> = groups
        .find_seeking_except("g1")
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(others, vec!["g2".to_string(), "g3".to_string()]);
}

#[tokio::test]
async fn test_committed_writes_publish_changes() {
    let (store, _temp_dir) = create_test_store().await;
    let mut rx = store.feed().subscribe();

    store.groups().create(&group_request("g1", &["a"])).await.unwrap();
    store.groups().start_seeking("g1").await.unwrap();

    let created = rx.recv().await.unwrap();
    assert!(created.before.is_none());
    assert_eq!(created.status_after(), Some(GroupStatus::Idle));

    let seeking = rx.recv().await.unwrap();
    assert!(seeking.entered(GroupStatus::Seeking));
}

#[tokio::test]
async fn test_rolled_back_transaction_publishes_nothing() {
    let (store, _temp_dir) = create_test_store().await;
    store.groups().create(&group_request("g1", &["a"])).await.unwrap();
    let mut rx = store.feed().subscribe();

    let mut tx = store.begin().await.unwrap();
    let current = tx.read_group("g1").await.unwrap().unwrap();
    tx.update_group(&current, current.with_status(GroupStatus::Seeking))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let stored = store.groups().find_by_id("g1").await.unwrap().unwrap();
    assert_eq!(stored.status, GroupStatus::Idle);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_stale_write_is_a_conflict() {
    let (store, _temp_dir) = create_test_store().await;
    store.groups().create(&group_request("g1", &["a"])).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let stale = tx.read_group("g1").await.unwrap().unwrap();

    // Another writer commits first.
    store.groups().start_seeking("g1").await.unwrap();

    let err = tx
        .update_group(&stale, stale.with_status(GroupStatus::Seeking))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got {err:?}");
    drop(tx);

    let stored = store.groups().find_by_id("g1").await.unwrap().unwrap();
    assert_eq!(stored.version, stale.version + 1);
}

#[tokio::test]
async fn test_update_with_outdated_version_is_a_conflict() {
    let (store, _temp_dir) = create_test_store().await;
    let created = store.groups().create(&group_request("g1", &["a"])).await.unwrap();
    store.groups().start_seeking("g1").await.unwrap();

    // `created` carries version 0 while the stored row is at 1.
    let mut tx = store.begin().await.unwrap();
    let err = tx
        .update_group(&created, created.with_status(GroupStatus::Seeking))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_duplicate_chatroom_insert_is_a_conflict() {
    let (store, _temp_dir) = create_test_store().await;
    let room = Chatroom::new("g1_g2", vec!["a".into(), "b".into()], vec!["g1".into(), "g2".into()]);

    let mut tx = store.begin().await.unwrap();
    tx.insert_chatroom(&room).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_chatroom(&room).await.unwrap_err();
    assert!(err.is_conflict());

    let stored = store.chatrooms().find_by_id("g1_g2").await.unwrap().unwrap();
    assert_eq!(stored.participants, room.participants);
    assert!(stored.has_participant("b"));
    assert_eq!(store.chatrooms().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_user_pointer_update_bumps_version() {
    let (store, _temp_dir) = create_test_store().await;
    let user = store
        .users()
        .create(&CreateUserRequest {
            id: "a".to_string(),
            nickname: Some("Alice".to_string()),
            current_group_id: Some("g1".to_string()),
        })
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let current = tx.read_user("a").await.unwrap().unwrap();
    let updated = tx.set_current_group(&current, "g1_g2").await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(updated.version, user.version + 1);
    let stored = store.users().find_by_id("a").await.unwrap().unwrap();
    assert_eq!(stored.current_group_id.as_deref(), Some("g1_g2"));
    assert_eq!(stored.display_name(), "Alice");
}
