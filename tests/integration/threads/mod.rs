//! Thread management integration tests

use std::sync::Arc;

use parley_conversations::{
    ConversationManager, MessageRole, MockConversationStore, StoreOp, DEFAULT_THREAD_TITLE,
};
use parley_gateway::MockGateway;

use crate::common::TestApp;

#[tokio::test]
async fn test_threads_listed_newest_first() {
    let app = TestApp::new();
    let first = app.manager.create_thread(Some("first")).await.unwrap();
    let second = app.manager.create_thread(Some("second")).await.unwrap();
    let third = app.manager.create_thread(None).await.unwrap();

    let ids: Vec<_> = app.manager.list_threads().await.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
    assert_eq!(third.title.as_deref(), Some(DEFAULT_THREAD_TITLE));
}

#[tokio::test]
async fn test_threads_scoped_to_user() {
    let app = TestApp::new();
    app.store.seed_thread(uuid::Uuid::new_v4(), "someone else's");
    let mine = app.store.seed_thread(app.user_id, "mine");

    let threads = app.manager.list_threads().await;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, mine.id);
}

#[tokio::test]
async fn test_create_selects_empty_thread() {
    let app = TestApp::new();
    let old = app.store.seed_thread(app.user_id, "old");
    app.store.seed_message(old.id, MessageRole::User, "old message");
    app.manager.select_thread(Some(old)).await;

    let created = app.manager.create_thread(Some("fresh")).await.unwrap();

    let session = app.manager.snapshot();
    assert_eq!(session.selected_thread_id(), Some(created.id));
    assert!(session.messages.is_empty());
}

#[tokio::test]
async fn test_create_failure_keeps_selection() {
    let app = TestApp::new();
    let current = app.store.seed_thread(app.user_id, "current");
    app.manager.select_thread(Some(current.clone())).await;
    app.store.fail_next(StoreOp::CreateThread);

    assert!(app.manager.create_thread(None).await.is_err());
    assert_eq!(app.manager.snapshot().selected_thread_id(), Some(current.id));
}

#[tokio::test]
async fn test_rename_reflected_in_list() {
    let app = TestApp::new();
    let thread = app.store.seed_thread(app.user_id, "Draft");

    app.manager.rename_thread(&thread, "Final").await.unwrap();

    let threads = app.manager.list_threads().await;
    assert_eq!(threads[0].display_title(), "Final");
}

#[tokio::test]
async fn test_rename_rejects_overlong_title() {
    let app = TestApp::new();
    let thread = app.store.seed_thread(app.user_id, "Draft");

    let err = app
        .manager
        .rename_thread(&thread, &"x".repeat(201))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(app.store.call_count(StoreOp::RenameThread), 0);
}

#[tokio::test]
async fn test_delete_removes_thread_and_messages() {
    let app = TestApp::new();
    let thread = app.manager.create_thread(Some("doomed")).await.unwrap();
    app.manager.send_message("hello").await.unwrap();
    assert_eq!(app.store.stored_messages(thread.id).len(), 2);

    assert!(app.manager.delete_thread(thread.id).await.unwrap());

    assert!(app.manager.list_threads().await.is_empty());
    assert!(app.store.stored_messages(thread.id).is_empty());
    assert!(app.manager.snapshot().selected_thread.is_none());
}

#[tokio::test]
async fn test_delete_unknown_thread_returns_false() {
    let app = TestApp::new();
    assert!(!app.manager.delete_thread(uuid::Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_signed_out_manager() {
    let store = MockConversationStore::new();
    let manager = ConversationManager::new(Arc::new(store), Arc::new(MockGateway::new()), None);

    assert!(manager.list_threads().await.is_empty());
    let err = manager.create_thread(None).await.unwrap_err();
    assert_eq!(err.error_code(), "AUTHENTICATION_ERROR");
}
