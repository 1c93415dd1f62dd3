//! Send/reply turn integration tests

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use parley_conversations::{
    AnswerView, MessageRole, StoreOp, TurnFailure, TurnOutcome, TurnState,
};
use parley_gateway::GatewayError;

use crate::common::{HttpTestApp, SessionRecorder, TestApp};

async fn mount_reply(app: &HttpTestApp, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&app.server)
        .await;
}

async fn gateway_bodies(app: &HttpTestApp) -> Vec<Value> {
    app.server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

mod test_http_turns {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_hello_round_trip_over_http() {
        let app = HttpTestApp::new().await;
        mount_reply(&app, 200, json!({"final_answer": "hi there", "plot_images": []})).await;
        let thread = app.store.seed_thread(app.user_id, "T1");

        app.manager.select_thread(Some(thread.clone())).await;
        let outcome = app.manager.send_message("hello").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));

        let session = app.manager.snapshot();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[0].content.as_deref(), Some("hello"));
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
        assert_eq!(session.messages[1].content.as_deref(), Some("hi there"));
        assert!(session.messages[1].images.is_empty());
        assert!(!session.is_loading);
        assert!(!session.is_error);

        let bodies = gateway_bodies(&app).await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["thread_id"], json!(thread.id));
        assert_eq!(bodies[0]["user_id"], json!(app.user_id));
        assert_eq!(
            bodies[0]["messages"],
            json!([{"role": "user", "content": "hello"}])
        );
    }

    #[tokio::test]
    async fn test_history_resent_in_order_each_turn() {
        let app = HttpTestApp::new().await;
        mount_reply(&app, 200, json!({"final_answer": "ok"})).await;
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread)).await;

        app.manager.send_message("first").await.unwrap();
        app.manager.send_message("second").await.unwrap();

        let bodies = gateway_bodies(&app).await;
        assert_eq!(bodies.len(), 2);
        assert_eq!(
            bodies[1]["messages"],
            json!([
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "ok"},
                {"role": "user", "content": "second"},
            ])
        );
    }

    #[tokio::test]
    async fn test_plot_images_attached_to_reply() {
        let app = HttpTestApp::new().await;
        mount_reply(
            &app,
            200,
            json!({"final_answer": "see chart", "plot_images": ["data:image/png;base64,AAAA"]}),
        )
        .await;
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread.clone())).await;

        app.manager.send_message("chart please").await.unwrap();

        let session = app.manager.snapshot();
        assert_eq!(session.messages[1].images, vec!["data:image/png;base64,AAAA"]);

        // Images live in the session only; a reload drops them.
        app.manager.reload_messages().await;
        let reloaded = app.manager.snapshot();
        assert_eq!(reloaded.messages.len(), 2);
        assert!(reloaded.messages[1].images.is_empty());
    }

    #[tokio::test]
    async fn test_sectioned_answer_renders_as_sections() {
        let app = HttpTestApp::new().await;
        let answer = "=== FINAL ANSWER ===\nRevenue grew 12%.\n=== ANALYSIS ===\nQ3 vs Q2.\n=== CODE ===\nSELECT 1;";
        mount_reply(&app, 200, json!({"final_answer": answer})).await;
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread)).await;

        let outcome = app.manager.send_message("how did revenue do?").await.unwrap();
        let TurnOutcome::Completed { assistant, .. } = outcome else {
            panic!("expected a completed turn");
        };

        match AnswerView::from_content(assistant.content.as_deref()) {
            AnswerView::Sections(sections) => {
                assert_eq!(sections.final_answer.as_deref(), Some("Revenue grew 12%."));
                assert_eq!(sections.analysis.as_deref(), Some("Q3 vs Q2."));
                assert_eq!(sections.code.as_deref(), Some("SELECT 1;"));
            }
            other => panic!("expected sections, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_reply_stored_as_no_response() {
        let app = HttpTestApp::new().await;
        mount_reply(&app, 200, json!({})).await;
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread.clone())).await;

        app.manager.send_message("hello").await.unwrap();

        let stored = app.store.stored_messages(thread.id);
        assert_eq!(stored[1].content.as_deref(), Some("[No response]"));
    }

    #[test_log::test(tokio::test)]
    async fn test_gateway_500_sets_error() {
        let app = HttpTestApp::new().await;
        mount_reply(&app, 500, json!({"detail": "model crashed"})).await;
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread.clone())).await;

        let outcome = app.manager.send_message("hello").await.unwrap();
        match outcome {
            TurnOutcome::Failed {
                reason: TurnFailure::Gateway(GatewayError::Response(detail)),
                user,
            } => {
                assert!(detail.contains("500"));
                assert_eq!(user.content.as_deref(), Some("hello"));
            }
            other => panic!("expected gateway failure, got {:?}", other),
        }

        let session = app.manager.snapshot();
        assert_eq!(session.messages.len(), 1);
        assert!(session.is_error);
        assert!(!session.is_loading);
        assert_eq!(app.store.stored_messages(thread.id).len(), 1);
    }
}

mod test_turn_invariants {
    use super::*;

    #[tokio::test]
    async fn test_loading_and_error_never_both_set() {
        let app = TestApp::paused();
        let thread = app.store.seed_thread(app.user_id, "T1");
        let recorder = SessionRecorder::start(&app.manager);
        app.manager.select_thread(Some(thread)).await;

        // Successful turn
        let turn = app.spawn_send("ok turn");
        app.gateway.wait_for_requests(1).await;
        let pending = recorder.latest().await;
        assert!(pending.is_loading && !pending.is_error);
        app.gateway.release(1);
        assert!(matches!(
            turn.await.unwrap().unwrap(),
            TurnOutcome::Completed { .. }
        ));
        let done = recorder.latest().await;
        assert!(!done.is_loading && !done.is_error);

        // Gateway failure
        app.gateway
            .push_failure(GatewayError::Request("timed out".to_string()));
        let turn = app.spawn_send("failing turn");
        app.gateway.wait_for_requests(2).await;
        let pending = recorder.latest().await;
        assert!(pending.is_loading && !pending.is_error);
        app.gateway.release(1);
        assert!(matches!(
            turn.await.unwrap().unwrap(),
            TurnOutcome::Failed {
                reason: TurnFailure::Gateway(_),
                ..
            }
        ));
        let failed = recorder.latest().await;
        assert!(!failed.is_loading && failed.is_error);

        // Reply write failure; the new send clears the previous error first
        app.store.fail_on_call(StoreOp::InsertMessage, 2);
        let turn = app.spawn_send("unsaved reply");
        app.gateway.wait_for_requests(3).await;
        let pending = recorder.latest().await;
        assert!(pending.is_loading && !pending.is_error);
        app.gateway.release(1);
        assert!(matches!(
            turn.await.unwrap().unwrap(),
            TurnOutcome::Failed {
                reason: TurnFailure::AssistantPersist(_),
                ..
            }
        ));
        let failed = recorder.latest().await;
        assert!(!failed.is_loading && failed.is_error);

        // Recovery
        let turn = app.spawn_send("recovered");
        app.gateway.wait_for_requests(4).await;
        app.gateway.release(1);
        turn.await.unwrap().unwrap();

        let observed = recorder.observed().await;
        assert!(observed.iter().any(|s| s.is_loading));
        assert!(observed.iter().any(|s| s.is_error));
        for session in &observed {
            assert!(
                !(session.is_loading && session.is_error),
                "loading and error both set: {:?}",
                session
            );
        }

        let last = app.manager.snapshot();
        assert!(!last.is_loading);
        assert!(!last.is_error);
        assert_eq!(last.turn, TurnState::Idle);
    }

    #[tokio::test]
    async fn test_session_history_matches_store() {
        let app = TestApp::new();
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread.clone())).await;

        for text in ["one", "two", "three"] {
            app.manager.send_message(text).await.unwrap();
        }

        let session_ids: Vec<_> = app.manager.snapshot().messages.iter().map(|m| m.id).collect();
        let stored_ids: Vec<_> = app
            .store
            .stored_messages(thread.id)
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(session_ids, stored_ids);

        let session = app.manager.snapshot();
        assert!(session
            .messages
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_user_write_failure_skips_gateway() {
        let app = TestApp::new();
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread)).await;
        app.store.fail_next(StoreOp::InsertMessage);

        assert!(app.manager.send_message("hello").await.is_err());
        assert!(app.gateway.recorded_requests().is_empty());
        assert!(app.manager.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn test_busy_manager_rejects_second_send() {
        let app = TestApp::paused();
        let thread = app.store.seed_thread(app.user_id, "T1");
        app.manager.select_thread(Some(thread.clone())).await;

        let first = app.spawn_send("first");
        app.gateway.wait_for_requests(1).await;
        assert!(app.manager.snapshot().is_loading);

        let err = app.manager.send_message("second").await.unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");

        app.gateway.release(1);
        assert!(matches!(
            first.await.unwrap().unwrap(),
            TurnOutcome::Completed { .. }
        ));
        assert_eq!(app.store.stored_messages(thread.id).len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_reply_lands_in_its_own_thread_after_switch() {
        let app = TestApp::paused();
        let t1 = app.store.seed_thread(app.user_id, "T1");
        let t2 = app.store.seed_thread(app.user_id, "T2");
        app.manager.select_thread(Some(t1.clone())).await;

        let turn = app.spawn_send("question for t1");
        app.gateway.wait_for_requests(1).await;

        app.manager.select_thread(Some(t2.clone())).await;
        app.gateway.release(1);

        assert!(matches!(
            turn.await.unwrap().unwrap(),
            TurnOutcome::Superseded { .. }
        ));

        let session = app.manager.snapshot();
        assert_eq!(session.selected_thread_id(), Some(t2.id));
        assert!(session.messages.is_empty());
        assert!(!session.is_loading);

        // Switching back shows the finished exchange.
        app.manager.select_thread(Some(t1.clone())).await;
        let back = app.manager.snapshot();
        assert_eq!(back.messages.len(), 2);
        assert_eq!(back.messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_send_during_history_load_keeps_both() {
        let app = TestApp::new();
        let thread = app.store.seed_thread(app.user_id, "T1");
        let earlier = app.store.seed_message(thread.id, MessageRole::User, "earlier");
        app.store.hold(StoreOp::ListMessages);

        let selecting = tokio::spawn({
            let manager = app.manager.clone();
            let thread = thread.clone();
            async move { manager.select_thread(Some(thread)).await }
        });
        app.store.wait_for_calls(StoreOp::ListMessages, 1).await;

        app.manager.send_message("while loading").await.unwrap();
        app.store.release(StoreOp::ListMessages, 1);
        selecting.await.unwrap();

        let session = app.manager.snapshot();
        let contents: Vec<_> = session
            .messages
            .iter()
            .map(|m| m.content.clone().unwrap_or_default())
            .collect();
        assert_eq!(session.messages[0].id, earlier.id);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1], "while loading");
    }
}
