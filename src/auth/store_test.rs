use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

/// Unique path under the system temp dir; parallel tests never share one.
fn scratch_path(name: &str) -> PathBuf {
    let n = NEXT_FILE.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir()
        .join(format!("household-client-test-{}-{n}", std::process::id()))
        .join(name)
}

fn full_session() -> StoredSession {
    StoredSession {
        access_token: Some("tok1".into()),
        refresh_token: Some("r1".into()),
        user_id: Some("7".into()),
    }
}

#[test]
fn is_complete_requires_all_fields() {
    assert!(full_session().is_complete());
    assert!(!StoredSession { user_id: None, ..full_session() }.is_complete());
    assert!(!StoredSession::default().is_complete());
}

#[tokio::test]
async fn memory_store_round_trip_and_clear() {
    let store = MemoryTokenStore::new();
    assert_eq!(store.load().await.unwrap(), StoredSession::default());

    store.save(&full_session()).await.unwrap();
    assert_eq!(store.load().await.unwrap(), full_session());

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), StoredSession::default());
}

#[tokio::test]
async fn file_store_missing_file_loads_default() {
    let store = FileTokenStore::new(scratch_path("absent.json"));
    assert_eq!(store.load().await.unwrap(), StoredSession::default());
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let path = scratch_path("session.json");
    FileTokenStore::new(&path).save(&full_session()).await.unwrap();

    let reopened = FileTokenStore::new(&path);
    assert_eq!(reopened.load().await.unwrap(), full_session());

    reopened.clear().await.unwrap();
    assert!(!path.exists());
    reopened.clear().await.unwrap();
}

#[tokio::test]
async fn file_store_rejects_corrupt_json() {
    let path = scratch_path("corrupt.json");
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(&path, b"{not json").await.unwrap();

    let err = FileTokenStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, TokenStoreError::Json(_)));
}

#[tokio::test]
async fn file_store_omits_missing_fields() {
    let path = scratch_path("partial.json");
    let store = FileTokenStore::new(&path);
    store.save(&StoredSession { access_token: Some("tok1".into()), ..StoredSession::default() }).await.unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
    assert_eq!(raw, serde_json::json!({ "access_token": "tok1" }));
}
