mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use diesel::{sql_query, RunQueryDsl};
use serde_json::{json, Value};

use common::{email_item, TestApp, API_KEY};
use email_assistant::handlers::integration_handlers::MAX_EMAILS_PER_SYNC;

const MAILBOX: &str = "inbox@example.com";

#[tokio::test]
async fn sync_requires_a_valid_api_key() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;
    let body = json!({"agentEmail": MAILBOX, "emails": [email_item("m1", 3)]});

    let (status, missing) = app.sync_with_key(None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing["error"], "Missing API key");

    let (status, _) = app.sync_with_key(Some("wrong-key"), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    assert_eq!(app.state.email_repository.counts(agent.id).unwrap().total, 0);
}

#[tokio::test]
async fn resyncing_the_same_message_updates_one_row() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;

    let (status, first) = app
        .sync(json!({"agentEmail": MAILBOX, "emails": [email_item("m1", 3)]}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["success"], true);
    assert_eq!(first["created"], 1);
    assert_eq!(first["updated"], 0);

    let mut changed = email_item("m1", 2);
    changed["draftResponse"] = json!("Sure, Thursday works.");
    let (status, second) = app.sync(json!({"agentEmail": MAILBOX, "emails": [changed]})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], 0);
    assert_eq!(second["updated"], 1);
    assert_eq!(second["processed"], 1);

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    let counts = app.state.email_repository.counts(agent.id).unwrap();
    assert_eq!(counts.total, 1);
    assert_eq!(counts.pending_approval, 1);

    let stored = app.state.email_repository.find_by_gmail_id(agent.id, "m1").unwrap().unwrap();
    assert_eq!(stored.tier, 2);
    assert_eq!(stored.draft_response.as_deref(), Some("Sure, Thursday works."));
    assert!(agent.last_run_at.is_some());
}

#[tokio::test]
async fn agent_lookup_ignores_case() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;

    let (status, body) = app
        .sync(json!({"agentEmail": "INBOX@Example.com", "emails": []}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["processed"], 0);
}

#[tokio::test]
async fn unknown_agent_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .sync(json!({"agentEmail": "nobody@example.com", "emails": [email_item("m1", 3)]}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Agent not found");
}

#[tokio::test]
async fn malformed_payload_lists_the_problems() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;

    let mut bad_tier = email_item("m1", 7);
    bad_tier["confidence"] = json!(2.0);
    let (status, body) = app.sync(json!({"agentEmail": MAILBOX, "emails": [bad_tier]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let paths: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["emails[0].tier", "emails[0].confidence"]);

    let (status, body) = app.sync(json!({"agentEmail": MAILBOX})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["path"], "body");
}

#[tokio::test]
async fn supplied_actions_replace_pending_ones() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;

    let mut item = email_item("m1", 2);
    item["actions"] = json!([
        {"type": "send_draft", "payload": {"to": "client@example.org"}, "requiresApproval": true},
        {"type": "label", "payload": {"label": "clients"}}
    ]);
    let (_, first) = app.sync(json!({"agentEmail": MAILBOX, "emails": [item.clone()]})).await;
    assert_eq!(first["actionsCreated"], 2);

    item["actions"] = json!([{"type": "send_draft", "requiresApproval": true}]);
    let (_, second) = app.sync(json!({"agentEmail": MAILBOX, "emails": [item]})).await;
    assert_eq!(second["actionsCreated"], 1);

    // omitting actions leaves them alone
    let (_, third) = app.sync(json!({"agentEmail": MAILBOX, "emails": [email_item("m1", 2)]})).await;
    assert_eq!(third["actionsCreated"], 0);

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    let email = app.state.email_repository.find_by_gmail_id(agent.id, "m1").unwrap().unwrap();
    let actions = app.state.email_repository.actions_for(&[email]).unwrap();
    assert_eq!(actions[0].len(), 1);
    assert_eq!(actions[0][0].action_type, "send_draft");
    assert!(actions[0][0].requires_approval);
}

#[tokio::test]
async fn status_endpoint_reports_config_and_counts() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;
    let emails = vec![email_item("a", 1), email_item("b", 2), email_item("c", 2), email_item("d", 4)];
    app.sync(json!({"agentEmail": MAILBOX, "emails": emails})).await;

    let request = Request::builder()
        .uri(format!("/api/integration/sync?agentEmail={}", MAILBOX))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["agent"]["email"], MAILBOX);
    assert_eq!(body["agent"]["timezone"], "Europe/Helsinki");
    assert_eq!(body["counts"]["total"], 4);
    assert_eq!(body["counts"]["pendingApproval"], 2);
    assert_eq!(body["counts"]["escalated"], 1);
    assert_eq!(body["counts"]["byTier"]["2"], 2);
    assert_eq!(body["counts"]["byTier"]["3"], 0);

    let missing = Request::builder()
        .uri("/api/integration/sync")
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(missing).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resending_a_sync_keeps_the_owner_decision() {
    let app = TestApp::new();
    let (token, _) = app.owner_with_agent(MAILBOX).await;
    let mut item = email_item("d1", 2);
    item["draftResponse"] = json!("Happy to help.");
    item["actions"] = json!([{"type": "send_draft", "payload": {"to": "client@example.org"}}]);
    let body = json!({"agentEmail": MAILBOX, "emails": [item]});
    app.sync(body.clone()).await;

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    let email = app.state.email_repository.find_by_gmail_id(agent.id, "d1").unwrap().unwrap();
    let (status, approved) = app
        .json(
            "POST",
            &format!("/api/emails/{}/approve", email.id),
            Some(&token),
            json!({"draftResponse": "Happy to help, see you Thursday."}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", approved);

    let (status, resent) = app.sync(body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resent["updated"], 1);
    assert_eq!(resent["actionsCreated"], 0);

    let stored = app.state.email_repository.find_by_gmail_id(agent.id, "d1").unwrap().unwrap();
    assert_eq!(stored.status, "processed");
    assert_eq!(stored.draft_response.as_deref(), Some("Happy to help, see you Thursday."));
    assert_eq!(stored.reviewed_at, approved["reviewedAt"].as_i64().map(|t| t as i32));
    assert!(app.state.email_repository.approval_queue(agent.id).unwrap().is_empty());

    let actions = app.state.email_repository.actions_for(&[stored]).unwrap();
    let statuses: Vec<&str> = actions[0].iter().map(|a| a.status.as_str()).collect();
    assert_eq!(statuses, vec!["approved"]);
}

#[tokio::test]
async fn failure_mid_batch_keeps_earlier_items() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;
    {
        let mut conn = app.state.db_pool.get().unwrap();
        sql_query(
            "CREATE TRIGGER refuse_broken BEFORE INSERT ON emails \
             WHEN NEW.gmail_id = 'broken' \
             BEGIN SELECT RAISE(ABORT, 'refused'); END",
        )
        .execute(&mut conn)
        .unwrap();
    }

    let emails = vec![email_item("a", 3), email_item("b", 2), email_item("broken", 3), email_item("c", 3)];
    let (status, body) = app.sync(json!({"agentEmail": MAILBOX, "emails": emails})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    let repo = &app.state.email_repository;
    assert!(repo.find_by_gmail_id(agent.id, "a").unwrap().is_some());
    assert!(repo.find_by_gmail_id(agent.id, "b").unwrap().is_some());
    assert!(repo.find_by_gmail_id(agent.id, "broken").unwrap().is_none());
    assert!(repo.find_by_gmail_id(agent.id, "c").unwrap().is_none());
    assert!(agent.last_run_at.is_none());
}

#[tokio::test]
async fn oversized_batch_is_refused() {
    let app = TestApp::new();
    app.owner_with_agent(MAILBOX).await;
    let emails: Vec<Value> = (0..=MAX_EMAILS_PER_SYNC)
        .map(|i| email_item(&format!("m{}", i), 4))
        .collect();

    let (status, body) = app.sync(json!({"agentEmail": MAILBOX, "emails": emails})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["path"], "emails");

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    assert_eq!(app.state.email_repository.counts(agent.id).unwrap().total, 0);
    assert!(agent.last_run_at.is_none());
}

#[tokio::test]
async fn action_without_payload_stores_an_empty_object() {
    let app = TestApp::new();
    let (token, _) = app.owner_with_agent(MAILBOX).await;
    let mut item = email_item("m1", 2);
    item["actions"] = json!([{"type": "archive"}]);
    app.sync(json!({"agentEmail": MAILBOX, "emails": [item]})).await;

    let agent = app.state.agent_repository.find_live_by_email(MAILBOX).unwrap().unwrap();
    let email = app.state.email_repository.find_by_gmail_id(agent.id, "m1").unwrap().unwrap();
    let (_, detail) = app.get(&format!("/api/emails/{}", email.id), &token).await;
    assert_eq!(detail["actions"][0]["payload"], json!({}));
}
