//! Integration tests for the Mind-Chat history store
//!
//! These tests drive the store through the mode registry against real files
//! in a temporary directory.

use mindchat_history::{ConversationMode, HistoryError, ModeRegistry, Settings, Turn};
use std::collections::HashSet;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn settings_in(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.history.data_dir = dir.to_path_buf();
    settings
}

fn registry_in(dir: &TempDir) -> ModeRegistry {
    ModeRegistry::from_settings(&settings_in(dir.path())).unwrap()
}

#[tokio::test]
async fn test_sixty_one_conversations_keep_sixty() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Counseling).await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..61 {
        let id = store.start_new("こんにちは").await.unwrap();
        assert!(store.get(&id).await.is_ok());
        ids.push(id);
    }

    assert_eq!(store.len().await, 60);
    assert!(store.get(&ids[0]).await.unwrap_err().is_not_found());

    // Same picture after a restart
    let reopened = registry_in(&dir);
    let store = reopened.store_for(ConversationMode::Counseling).await.unwrap();
    assert_eq!(store.len().await, 60);
    assert!(store.get(&ids[0]).await.unwrap_err().is_not_found());
    assert!(store.get(&ids[60]).await.is_ok());
}

#[tokio::test]
async fn test_fifty_first_favorite_is_rejected() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Counseling).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..51 {
        ids.push(store.start_new(format!("悩み {i}")).await.unwrap());
    }
    for id in &ids[..50] {
        assert!(store.toggle_favorite(id).await.unwrap());
    }

    let err = store.toggle_favorite(&ids[50]).await.unwrap_err();
    assert!(matches!(err, HistoryError::FavoriteLimitReached { limit: 50 }));
    assert!(err.is_user_facing());
    assert_eq!(store.favorite_count().await, 50);

    let reopened = registry_in(&dir);
    let store = reopened.store_for(ConversationMode::Counseling).await.unwrap();
    assert_eq!(store.favorite_count().await, 50);
    assert!(!store.get(&ids[50]).await.unwrap().is_favorite());
}

#[tokio::test]
async fn test_favorites_survive_heavy_churn() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Plain).await.unwrap();

    let mut favorites = HashSet::new();
    let mut everyone = Vec::new();
    for i in 0..200 {
        let id = store.start_new(format!("conversation {i}")).await.unwrap();
        if i % 4 == 0 && favorites.len() < 50 {
            store.toggle_favorite(&id).await.unwrap();
            favorites.insert(id.clone());
        }
        everyone.push(id);

        assert!(store.len().await <= 60);
        for favorite in &favorites {
            assert!(store.get(favorite).await.unwrap().is_favorite());
        }
    }

    let listed = store.list_all().await;
    let survivors: HashSet<&str> = listed.iter().map(|r| r.id()).collect();
    assert_eq!(listed.len(), 60);
    assert_eq!(store.favorite_count().await, favorites.len());

    // Every missing conversation was a non-favorite
    for id in &everyone {
        if !survivors.contains(id.as_str()) {
            assert!(!favorites.contains(id));
        }
    }

    // The non-favorites kept are the most recently created ones
    let kept_plain: Vec<&String> = everyone
        .iter()
        .filter(|id| !favorites.contains(*id) && survivors.contains(id.as_str()))
        .collect();
    let newest_plain: Vec<&String> = everyone
        .iter()
        .filter(|id| !favorites.contains(*id))
        .rev()
        .take(kept_plain.len())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    assert_eq!(kept_plain, newest_plain);
}

#[tokio::test]
async fn test_round_trip_through_disk() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Counseling).await.unwrap();

    let a = store.start_new("最近眠れません").await.unwrap();
    store.append(&a, Turn::assistant("それはつらいですね。")).await.unwrap();
    store.append(&a, Turn::user("仕事のことが気になって")).await.unwrap();
    let b = store.start_new("second").await.unwrap();
    store.toggle_favorite(&b).await.unwrap();
    let before = store.list_all().await;

    let reopened = registry_in(&dir);
    let after = reopened
        .store_for(ConversationMode::Counseling)
        .await
        .unwrap()
        .list_all()
        .await;

    assert_eq!(before, after);
    assert_eq!(after.iter().find(|r| r.id() == a).unwrap().messages().len(), 3);
}

#[tokio::test]
async fn test_modes_are_independent() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let counseling = registry.store_for(ConversationMode::Counseling).await.unwrap();
    let plain = registry.store_for(ConversationMode::Plain).await.unwrap();

    let p = plain.start_new("plain first").await.unwrap();
    plain.toggle_favorite(&p).await.unwrap();
    let plain_path = registry.history_path(ConversationMode::Plain).unwrap().unwrap();
    let plain_bytes = std::fs::read(&plain_path).unwrap();

    for i in 0..70 {
        let id = counseling.start_new(format!("counseling {i}")).await.unwrap();
        if i < 5 {
            counseling.toggle_favorite(&id).await.unwrap();
        }
    }
    let victim = counseling.list_all().await[0].id().to_string();
    counseling.delete(&victim).await.unwrap();

    assert_eq!(plain.len().await, 1);
    assert_eq!(plain.favorite_count().await, 1);
    assert_eq!(std::fs::read(&plain_path).unwrap(), plain_bytes);
    assert!(counseling.get(&p).await.unwrap_err().is_not_found());
    assert_eq!(counseling.len().await, 59);
}

#[tokio::test]
async fn test_interrupted_save_keeps_previous_content() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Plain).await.unwrap();
    store.start_new("before the crash").await.unwrap();
    let expected = store.list_all().await;

    // A save that died after writing half of its temp file
    let path = registry.history_path(ConversationMode::Plain).unwrap().unwrap();
    let tmp = path.with_file_name(format!(
        ".{}.tmp",
        path.file_name().unwrap().to_string_lossy()
    ));
    std::fs::write(&tmp, "[{\"id\": \"half-writ").unwrap();

    let reopened = registry_in(&dir);
    let store = reopened.store_for(ConversationMode::Plain).await.unwrap();
    assert_eq!(store.list_all().await, expected);
}

#[tokio::test]
async fn test_corrupt_file_is_preserved_then_replaced() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history_mindchat.json");
    std::fs::write(&path, "this is not json").unwrap();

    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Counseling).await.unwrap();
    assert!(store.is_empty().await);
    // Opening alone never rewrites the broken file
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "this is not json");

    store.start_new("starting over").await.unwrap();

    let backup = dir.path().join("history_mindchat.json.corrupt");
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "this is not json");

    let reopened = registry_in(&dir);
    let store = reopened.store_for(ConversationMode::Counseling).await.unwrap();
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_unconfigured_mode_is_unknown() {
    let dir = tempdir().unwrap();
    let mut settings = settings_in(dir.path());
    settings.modes.retain(|d| d.mode == ConversationMode::Counseling);
    let registry = ModeRegistry::from_settings(&settings).unwrap();

    let err = registry.store_for(ConversationMode::Plain).await.err().unwrap();
    assert!(matches!(err, HistoryError::UnknownMode(_)));
    let err = registry.store_for_key("astrology").await.err().unwrap();
    assert!(matches!(err, HistoryError::UnknownMode(_)));
}

#[tokio::test]
async fn test_all_favorites_at_capacity_rejects_new_conversation() {
    let dir = tempdir().unwrap();
    let mut settings = settings_in(dir.path());
    settings.history.max_conversations = 3;
    settings.history.max_favorites = 3;
    let registry = ModeRegistry::from_settings(&settings).unwrap();
    let store = registry.store_for(ConversationMode::Plain).await.unwrap();

    let mut kept = Vec::new();
    for i in 0..3 {
        let id = store.start_new(format!("keep {i}")).await.unwrap();
        store.toggle_favorite(&id).await.unwrap();
        kept.push(id);
    }
    let path = registry.history_path(ConversationMode::Plain).unwrap().unwrap();
    let on_disk = std::fs::read(&path).unwrap();

    let err = store.start_new("one too many").await.unwrap_err();
    assert!(matches!(err, HistoryError::CapacityExhausted { limit: 3 }));
    assert_eq!(store.len().await, 3);
    assert_eq!(std::fs::read(&path).unwrap(), on_disk);

    // Freeing a favorite makes room, and the new id is really stored
    store.toggle_favorite(&kept[1]).await.unwrap();
    let id = store.start_new("now it fits").await.unwrap();
    assert!(store.get(&id).await.is_ok());
    assert!(store.get(&kept[1]).await.unwrap_err().is_not_found());
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn test_hand_edited_file_over_favorite_limit_is_capped() {
    let dir = tempdir().unwrap();
    let records: Vec<serde_json::Value> = (0..55)
        .map(|i| {
            let at = format!("2024-01-01T00:{:02}:00Z", i);
            serde_json::json!({
                "id": format!("fav-{i}"),
                "mode": "plain",
                "messages": [{"role": "user", "text": "hi", "timestamp": at}],
                "created_at": at,
                "updated_at": at,
                "is_favorite": true
            })
        })
        .collect();
    std::fs::write(
        dir.path().join("history_plain.json"),
        serde_json::to_string(&records).unwrap(),
    )
    .unwrap();

    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Plain).await.unwrap();

    assert_eq!(store.len().await, 55);
    assert_eq!(store.favorite_count().await, 50);
    // The oldest five lost their flag
    for i in 0..5 {
        assert!(!store.get(&format!("fav-{i}")).await.unwrap().is_favorite());
    }
    assert!(store.get("fav-54").await.unwrap().is_favorite());
    assert!(matches!(
        store.toggle_favorite("fav-0").await,
        Err(HistoryError::FavoriteLimitReached { limit: 50 })
    ));
}

#[tokio::test]
async fn test_second_corruption_keeps_first_backup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history_plain.json");

    std::fs::write(&path, "first garbage").unwrap();
    let store = registry_in(&dir).store_for(ConversationMode::Plain).await.unwrap();
    store.start_new("one").await.unwrap();

    std::fs::write(&path, "second garbage").unwrap();
    let store = registry_in(&dir).store_for(ConversationMode::Plain).await.unwrap();
    store.start_new("two").await.unwrap();

    let first = dir.path().join("history_plain.json.corrupt");
    let second = dir.path().join("history_plain.json.corrupt.1");
    assert_eq!(std::fs::read_to_string(first).unwrap(), "first garbage");
    assert_eq!(std::fs::read_to_string(second).unwrap(), "second garbage");
}

#[tokio::test]
async fn test_generation_failure_rollback_flow() {
    let dir = tempdir().unwrap();
    let registry = registry_in(&dir);
    let store = registry.store_for(ConversationMode::Counseling).await.unwrap();

    let id = store.start_new("相談があります").await.unwrap();
    store.append(&id, Turn::assistant("どうしましたか？")).await.unwrap();
    store.append(&id, Turn::user("実は…")).await.unwrap();

    // Generation failed: the unanswered user turn is dropped
    let record = store.remove_trailing_user_turn(&id).await.unwrap();
    assert_eq!(record.messages().len(), 2);

    let reopened = registry_in(&dir);
    let store = reopened.store_for(ConversationMode::Counseling).await.unwrap();
    assert_eq!(store.get(&id).await.unwrap().messages().len(), 2);
}
