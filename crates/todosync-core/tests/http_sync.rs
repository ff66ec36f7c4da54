use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use todosync_core::auth::{AccountRef, StaticCredentials};
use todosync_core::models::{EntryFields, EntryFilter, EntrySort, PendingUpdate, RemoteId};
use todosync_core::remote::HttpEntryClient;
use todosync_core::sync::{SyncCursor, SyncPhase};
use todosync_core::{EntryStore, SyncEngine};

fn entry_json(id: i64, title: &str, complete: bool, modified: f64) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "notes": "",
        "complete": complete,
        "created": 100.0,
        "modified": modified
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_round_trip_against_http_service() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/todolist/entries")
                .header("authorization", "Bearer alice-token");
            then.status(201)
                .json_body(entry_json(42, "Buy milk", false, 100.5));
        })
        .await;
    let full_list = server
        .mock_async(|when, then| {
            when.method(GET).path("/todolist/entries");
            then.status(200).json_body(json!({
                "timestamp": 200.0,
                "entries": [
                    entry_json(42, "Buy milk", false, 100.5),
                    {"id": 43, "title": "From web", "notes": null, "complete": 1,
                     "created": 150.0, "modified": 150.0}
                ]
            }));
        })
        .await;

    let store = EntryStore::open_in_memory().await.unwrap();
    let id = store.insert(EntryFields::titled("Buy milk")).await.unwrap();
    let engine = SyncEngine::new(store, HttpEntryClient::new(server.base_url()).unwrap())
        .with_credentials(StaticCredentials::new().with_token("alice", "alice-token"));
    let alice = AccountRef::new("alice");

    let report = engine.run(Some(&alice), false).await;

    create.assert_async().await;
    full_list.assert_async().await;
    assert!(!report.has_errors(), "{}", report.summary());
    assert_eq!(report.phase, SyncPhase::Done);
    assert_eq!(report.num_upstream_inserts, 1);
    assert_eq!(report.num_inserts, 1);

    let store = engine.store();
    let pushed = store.get(id).await.unwrap().unwrap();
    assert_eq!(pushed.remote_id, Some(RemoteId::new(42)));
    assert_eq!(pushed.pending_update, PendingUpdate::Clean);
    let from_web = store
        .query(&EntryFilter::by_remote_id(RemoteId::new(43)), EntrySort::default())
        .await
        .unwrap();
    assert_eq!(from_web.len(), 1);
    assert_eq!(from_web[0].title, "From web");
    assert_eq!(from_web[0].notes, "");
    assert!(from_web[0].complete);
    assert_eq!(store.last_sync_time().await.unwrap(), SyncCursor::new(200.0));

    full_list.delete_async().await;
    let stale = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/todolist/entries")
                .query_param("modified", "200.000000");
            then.status(400)
                .json_body(json!({"message": "modification window expired"}));
        })
        .await;

    let report = engine.run(Some(&alice), false).await;

    stale.assert_async().await;
    assert!(report.full_sync_requested);
    assert!(!report.has_errors());

    stale.delete_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/todolist/entries");
            then.status(200).json_body(json!({
                "timestamp": 300.0,
                "entries": [entry_json(43, "From web", true, 150.0)]
            }));
        })
        .await;

    let report = engine.run(Some(&alice), true).await;

    assert!(!report.has_errors());
    let visible = store
        .query(&EntryFilter::all(), EntrySort::default())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].remote_id, Some(RemoteId::new(43)));
    assert_eq!(store.last_sync_time().await.unwrap(), SyncCursor::new(300.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_service_leaves_rows_dirty() {
    let store = EntryStore::open_in_memory().await.unwrap();
    let id = store.insert(EntryFields::titled("offline")).await.unwrap();
    let engine = SyncEngine::new(store, HttpEntryClient::new("http://127.0.0.1:9").unwrap());

    let report = engine.run(None, false).await;

    assert_eq!(report.network_errors, 1);
    assert_eq!(report.phase, SyncPhase::Pushed);
    let entry = engine.store().get(id).await.unwrap().unwrap();
    assert!(entry.remote_id.is_none());
    assert!(entry.is_dirty());
    assert!(!entry.pending_tx);
    assert!(engine.store().last_sync_time().await.unwrap().is_initial());
}
