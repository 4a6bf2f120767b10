use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rewrite::catalog::evaluation_tasks;
use rewrite::config::EditorConfig;
use rewrite::engine::batch::BatchEngine;
use rewrite::provider::mock::{MockProvider, MockReply};
use rewrite::server::{AppState, router};
use rewrite::store::ChangeLog;
use rewrite::store::sqlite::SqliteStore;

fn reply_for(task: &str) -> MockReply {
    MockReply::json(json!({
        format!("{task}_context"): [format!("{task} phrase")],
        format!("{task}_reasoning"): [format!("{task} reason")],
        format!("{task}_suggestion"): [format!("{task} fix")],
    }))
}

fn app_with(provider: MockProvider) -> (Router, Arc<SqliteStore>) {
    let engine = Arc::new(BatchEngine::new(Arc::new(provider), &EditorConfig::default()));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    (router(AppState::new(engine, Arc::clone(&store))), store)
}

fn app() -> (Router, Arc<SqliteStore>) {
    let provider = evaluation_tasks()
        .iter()
        .fold(MockProvider::new(), |p, task| p.reply(task.name, reply_for(task.name)))
        .reply("rewrite", MockReply::json(json!({"final_answer": "Essay text."})));
    app_with(provider)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn edit(edit_type: &str, start: i64, end: i64) -> Value {
    json!({
        "type": edit_type,
        "phrase": "utilize",
        "suggestion": "use",
        "reasoning": "plainer",
        "startIndex": start,
        "endIndex": end
    })
}

#[tokio::test]
async fn index_reports_running() {
    let (app, _) = app();
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Running!");
}

#[tokio::test]
async fn evaluate_returns_ordered_envelopes() {
    let (app, _) = app();
    let response = app
        .oneshot(post("/evaluate", json!({"essay": "My essay.", "source_text": "Book."})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let types: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, ["simplify", "exemplify", "factcheck", "clarify", "assert"]);
    assert_eq!(body[0]["edits"]["suggestion"], json!(["simplify fix"]));
}

#[tokio::test]
async fn evaluate_defaults_missing_fields() {
    let (app, _) = app();
    let response = app.oneshot(post("/evaluate", json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn evaluate_with_empty_catalog_is_server_error() {
    let engine = Arc::new(
        BatchEngine::new(Arc::new(MockProvider::new()), &EditorConfig::default()).with_tasks(vec![]),
    );
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let app = router(AppState::new(engine, store));

    let response = app
        .oneshot(post("/evaluate", json!({"essay": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Evaluation failed");
}

#[tokio::test]
async fn generate_wraps_response() {
    let (app, _) = app();
    let response = app
        .oneshot(post(
            "/generate",
            json!({"source_text": "Book.", "essay_prompt": "Discuss."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"response": "Essay text."}));
}

#[tokio::test]
async fn generate_failure_is_still_ok() {
    let (app, _) = app_with(MockProvider::new().reply("rewrite", MockReply::error("quota exceeded")));
    let response = app
        .oneshot(post("/generate", json!({"source_text": "", "essay_prompt": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["response"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn store_then_get_edits() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(post(
            "/store-edits",
            json!({"edits": [edit("simplify", 0, 7), edit("clarify", 10, 20)]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Edits stored successfully", "edits_count": 2})
    );

    let response = app.oneshot(get("/get-edits")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let edits = body["edits"].as_array().unwrap();
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0]["id"], 1);
    assert_eq!(edits[0]["type"], "simplify");
    assert_eq!(edits[0]["startIndex"], 0);
    assert_eq!(edits[0]["completed"], false);
    assert_eq!(edits[1]["type"], "clarify");
}

#[tokio::test]
async fn store_edits_without_edits_key_is_bad_request() {
    let (app, _) = app();
    let response = app
        .oneshot(post("/store-edits", json!({"something": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Invalid request, 'edits' key missing");
}

#[tokio::test]
async fn update_completion_flags_edit() {
    let (app, _) = app();
    app.clone()
        .oneshot(post("/store-edits", json!({"edits": [edit("assert", 3, 9)]})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post("/update-completion", json!({"highlightId": 1, "completed": true})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Completion status updated successfully"
    );

    let body = body_json(app.oneshot(get("/get-edits")).await.unwrap()).await;
    assert_eq!(body["edits"][0]["completed"], true);
}

#[tokio::test]
async fn update_completion_validates_input() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(post("/update-completion", json!({"highlightId": 1})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post("/update-completion", json!({"highlightId": 99, "completed": true})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn track_edits_logs_only_changes() {
    let (app, store) = app();

    for text in ["First draft.", "First draft.", "First good draft."] {
        let response = app
            .clone()
            .oneshot(post("/track-edits", json!({"responseBoxText": text})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let changes = store.list_changes().await.unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].change.edit_content, "Added: First draft.; Deleted: ");
    assert_eq!(changes[1].change.edit_content, "Added: good ; Deleted: ");
    assert_eq!(changes[1].change.start_index, 6);
    assert_eq!(changes[1].change.end_index, 11);
}

#[tokio::test]
async fn track_edits_keeps_sessions_apart() {
    let (app, store) = app();

    for (session, text) in [("a", "Alpha."), ("b", "Beta."), ("a", "Alpha!")] {
        app.clone()
            .oneshot(post(
                "/track-edits",
                json!({"responseBoxText": text, "sessionId": session}),
            ))
            .await
            .unwrap();
    }

    let changes = store.list_changes().await.unwrap();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[2].change.edit_content, "Added: !; Deleted: .");
}

#[tokio::test]
async fn track_edits_requires_text() {
    let (app, _) = app();
    let response = app
        .oneshot(post("/track-edits", json!({"sessionId": "a"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clear_tables_empties_everything() {
    let (app, store) = app();
    app.clone()
        .oneshot(post("/store-edits", json!({"edits": [edit("simplify", 0, 1)]})))
        .await
        .unwrap();
    app.clone()
        .oneshot(post("/track-edits", json!({"responseBoxText": "Draft."})))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/clear-tables")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Success!");

    let body = body_json(app.clone().oneshot(get("/get-edits")).await.unwrap()).await;
    assert_eq!(body["edits"], json!([]));
    assert!(store.list_changes().await.unwrap().is_empty());

    // Baselines were reset too, so the same text counts as a fresh change.
    app.oneshot(post("/track-edits", json!({"responseBoxText": "Draft."})))
        .await
        .unwrap();
    assert_eq!(store.list_changes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let (app, _) = app();
    let request = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

/// Fails the first write, then delegates to a real store.
struct FailsOnce {
    inner: SqliteStore,
    failed: std::sync::atomic::AtomicBool,
}

#[async_trait::async_trait]
impl ChangeLog for FailsOnce {
    async fn record_change(&self, change: &rewrite::tracker::TextChange) -> anyhow::Result<i64> {
        if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.inner.record_change(change).await
    }

    async fn list_changes(&self) -> anyhow::Result<Vec<rewrite::store::LoggedChange>> {
        self.inner.list_changes().await
    }
}

#[tokio::test]
async fn track_edits_retry_after_failed_write_is_logged() {
    let engine = Arc::new(BatchEngine::new(
        Arc::new(MockProvider::new()),
        &EditorConfig::default(),
    ));
    let changes = Arc::new(FailsOnce {
        inner: SqliteStore::in_memory().unwrap(),
        failed: std::sync::atomic::AtomicBool::new(false),
    });
    let mut state = AppState::new(engine, Arc::new(SqliteStore::in_memory().unwrap()));
    state.changes = Arc::clone(&changes) as Arc<dyn ChangeLog>;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(post("/track-edits", json!({"responseBoxText": "Draft."})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app
        .oneshot(post("/track-edits", json!({"responseBoxText": "Draft."})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logged = changes.list_changes().await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].change.edit_content, "Added: Draft.; Deleted: ");
}
