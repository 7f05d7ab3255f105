//! Integration tests for the REST adapter against an in-process stub backend.
//!
//! The stub mimics the backend's routes closely enough to check headers,
//! query strings and the error mapping, without a real server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use learning_plan_core::domain::{
    ApplicationForm, ApplicationId, ApplicationQuery, ApplicationStatus, FormMode, Member,
    PhoneAgreement, PlanItem, Reference, ReviewRequest, SubmittedBefore, UserRole,
    PRESENTATION_STATIC,
};
use learning_plan_core::draft::DraftPersistence;
use learning_plan_core::payload::ApplicationPayload;
use learning_plan_core::ports::{ApplicationService, PortError, SessionStore};
use learning_plan_core::review::ReviewBoard;
use learning_plan_core::session::{self, MemorySessionStore};
use learning_plan_core::submission::{SubmissionController, SubmissionState};
use portal_lib::adapters::HttpBackend;

// ---------------------------------------------------------------------------
// Stub backend
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Stub {
    seen: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Stub {
    fn note(&self, entry: String) {
        self.seen.lock().unwrap().push(entry);
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn keep_body(&self, body: Value) {
        self.bodies.lock().unwrap().push(body);
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

fn stored_application(id: &str, status: &str, comment: Value) -> Value {
    json!({
        "id": id,
        "title": "Rust 自學",
        "apply_date_start": "2025-02-01",
        "apply_date_end": "2025-06-30",
        "status": status,
        "comment": comment,
        "submitter_student_id": "11430001"
    })
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({
            "access_token": "tok-1",
            "token_type": "bearer",
            "user": { "id": "u1", "username": body["username"], "role": "student" }
        }))
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "帳號或密碼錯誤" }))).into_response()
    }
}

async fn create_application(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.note(format!("POST /applications/ {}", bearer(&headers)));
    if body["title"] == "" {
        let detail = json!([{ "loc": ["body", "title"], "msg": "field required" }]);
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response();
    }
    Json(json!({
        "id": "app-1",
        "title": body["title"],
        "apply_date_start": body["apply_date_start"],
        "apply_date_end": body["apply_date_end"],
        "status": "審核中",
        "comment": null
    }))
    .into_response()
}

async fn list_applications(State(stub): State<Stub>, RawQuery(query): RawQuery) -> Json<Value> {
    stub.note(format!("GET /applications/?{}", query.unwrap_or_default()));
    Json(json!([{
        "id": "app-1",
        "title": "Test",
        "apply_date_start": "2025-02-01",
        "apply_date_end": "2025-06-30",
        "status": "透過"
    }]))
}

async fn get_application(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "expired" => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response(),
        "app-150" => Json(stored_application("app-150", "審核中", Value::Null)).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Application not found" }))).into_response(),
    }
}

async fn update_application(
    State(stub): State<Stub>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.note(format!("PUT /applications/{}", id));
    let status = body["status"].clone();
    stub.keep_body(body);
    Json(stored_application(&id, status.as_str().unwrap_or("審核中"), Value::Null))
}

async fn review_application(
    State(stub): State<Stub>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.note(format!("PATCH /applications/{}/review", id));
    let status = body["status"].as_str().unwrap_or("審核中").to_string();
    let comment = body.get("comment").cloned().unwrap_or(Value::Null);
    stub.keep_body(body);
    Json(stored_application(&id, &status, comment))
}

async fn export_pdf(Path(id): Path<String>) -> Response {
    let disposition = format!("attachment; filename*=UTF-8''%E8%87%AA%E4%B8%BB-{}.pdf", id);
    (
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        b"%PDF-1.4".to_vec(),
    )
        .into_response()
}

async fn fetch_draft() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Draft not found" }))).into_response()
}

async fn delete_draft(State(stub): State<Stub>) -> Json<Value> {
    stub.note("DELETE /drafts/".to_string());
    Json(json!({ "message": "Draft deleted" }))
}

async fn broken_settings() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream down").into_response()
}

/// Serves the stub on an ephemeral port and returns its base URL.
async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/applications/", post(create_application).get(list_applications))
        .route("/applications/{id}", get(get_application).put(update_application))
        .route("/applications/{id}/review", patch(review_application))
        .route("/applications/{id}/export-pdf", get(export_pdf))
        .route("/drafts/", get(fetch_draft).delete(delete_draft))
        .route("/settings/gmail", get(broken_settings))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

async fn backend() -> (Stub, Arc<MemorySessionStore>, Arc<HttpBackend>) {
    let stub = Stub::default();
    let url = spawn_stub(stub.clone()).await;
    let store = Arc::new(MemorySessionStore::default());
    let backend = HttpBackend::new(url, Duration::from_secs(5), store.clone()).unwrap();
    (stub, store, Arc::new(backend))
}

fn complete_form() -> ApplicationForm {
    let mut form = ApplicationForm {
        title: "Rust 自學".into(),
        apply_date_start: "2025-02-01".into(),
        apply_date_end: "2025-06-30".into(),
        motivation: "想學系統程式".into(),
        references: vec![Reference {
            title: "The Rust Programming Language".into(),
            author: "Klabnik".into(),
            publisher: "No Starch".into(),
            ..Reference::empty()
        }],
        expected_outcome: "完成一個小專案".into(),
        equipment_needs: "筆電".into(),
        plan_items: (0..9)
            .map(|_| PlanItem {
                date: "2025-03-01".into(),
                content: "閱讀一章".into(),
                hours: "2".into(),
                metric: "完成練習".into(),
                ..PlanItem::empty()
            })
            .collect(),
        midterm_goal: "完成基礎語法".into(),
        final_goal: "完成專題".into(),
        phone_agreement: PhoneAgreement::Agree,
        ..ApplicationForm::default()
    };
    form.members[0] = Member {
        student_id: "11430001".into(),
        student_class: "101".into(),
        student_seat: "1".into(),
        student_name: "張三".into(),
        has_submitted: SubmittedBefore::No,
    };
    form.learning_categories.checked.insert("閱讀計畫".into(), true);
    form.env_needs.checked.insert("自習室".into(), true);
    form.presentation_formats
        .checked
        .insert(PRESENTATION_STATIC.into(), true);
    form
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_stores_the_token_and_later_requests_carry_it() {
    let (stub, store, backend) = backend().await;

    let user = session::login(backend.as_ref(), store.as_ref(), "11430001", "secret")
        .await
        .unwrap();
    assert_eq!(user.username, "11430001");
    assert_eq!(store.load().unwrap().access_token, "tok-1");

    backend.list_applications(&ApplicationQuery::default()).await.unwrap();
    let payload = ApplicationPayload {
        title: "x".into(),
        ..ApplicationPayload::default()
    };
    backend.create_application(&payload).await.unwrap();
    assert!(stub.seen().contains(&"POST /applications/ Bearer tok-1".to_string()));
}

#[tokio::test]
async fn bad_credentials_are_rejected_with_the_backend_detail() {
    let (_, store, backend) = backend().await;
    let result = session::login(backend.as_ref(), store.as_ref(), "11430001", "nope").await;
    assert_eq!(result, Err(PortError::Rejected("帳號或密碼錯誤".into())));
    assert!(store.load().is_none());
}

#[tokio::test]
async fn expired_session_is_cleared_on_401() {
    let (_, store, backend) = backend().await;
    session::login(backend.as_ref(), store.as_ref(), "11430001", "secret")
        .await
        .unwrap();

    let result = backend.get_application(&ApplicationId::new("expired")).await;
    assert_eq!(result, Err(PortError::Unauthorized));
    assert!(store.load().is_none());
}

#[tokio::test]
async fn missing_records_map_to_not_found() {
    let (_, _, backend) = backend().await;
    let result = backend.get_application(&ApplicationId::new("app-9")).await;
    assert_eq!(result, Err(PortError::NotFound("Application not found".into())));
}

#[tokio::test]
async fn list_sends_paging_and_status_filters() {
    let (stub, _, backend) = backend().await;
    let query = ApplicationQuery {
        status: Some(ApplicationStatus::Passed),
        skip: Some(0),
        limit: Some(20),
    };
    let summaries = backend.list_applications(&query).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].status, ApplicationStatus::Passed);
    assert_eq!(
        stub.seen(),
        vec!["GET /applications/?skip=0&limit=20&status=%E9%80%8F%E9%81%8E".to_string()]
    );
}

#[tokio::test]
async fn field_validation_failures_are_listed_per_field() {
    let (_, _, backend) = backend().await;
    let result = backend.create_application(&ApplicationPayload::default()).await;
    assert_eq!(
        result.unwrap_err(),
        PortError::Rejected("資料驗證失敗:\nbody.title: field required".into())
    );
}

#[tokio::test]
async fn non_json_errors_report_the_status() {
    let (_, _, backend) = backend().await;
    let result = learning_plan_core::ports::SettingsService::gmail_settings(backend.as_ref()).await;
    assert_eq!(
        result,
        Err(PortError::Rejected("伺服器錯誤 (502): 返回了非 JSON 響應".into()))
    );
}

#[tokio::test]
async fn pdf_export_needs_a_session_and_uses_the_suggested_name() {
    let (_, store, backend) = backend().await;
    let id = ApplicationId::new("app-1");
    assert_matches!(backend.export_pdf(&id).await, Err(PortError::Unauthorized));

    session::login(backend.as_ref(), store.as_ref(), "11430001", "secret")
        .await
        .unwrap();
    let export = backend.export_pdf(&id).await.unwrap();
    assert_eq!(export.filename, "自主-app-1.pdf");
    assert_eq!(export.bytes, b"%PDF-1.4");
}

#[tokio::test]
async fn missing_draft_loads_as_none() {
    let (_, _, backend) = backend().await;
    let drafts = DraftPersistence::new(backend.clone());
    assert_eq!(drafts.load_draft().await.unwrap(), None);
}

#[tokio::test]
async fn first_submission_creates_the_record_and_discards_the_draft() {
    let (stub, _, backend) = backend().await;
    let mut controller = SubmissionController::new(
        backend.clone(),
        DraftPersistence::new(backend.clone()),
        FormMode::New,
    );

    let mut completed = None;
    let record = controller
        .submit(&complete_form(), |record| completed = Some(record.id.clone()))
        .await
        .unwrap();

    assert_eq!(record.id, ApplicationId::new("app-1"));
    assert_eq!(record.status, ApplicationStatus::Pending);
    assert_eq!(completed, Some(ApplicationId::new("app-1")));
    assert_eq!(controller.state(), &SubmissionState::Succeeded);
    assert_eq!(controller.mode(), &FormMode::Edit(ApplicationId::new("app-1")));
    assert_eq!(
        stub.seen(),
        vec!["POST /applications/ none".to_string(), "DELETE /drafts/".to_string()]
    );
}

#[tokio::test]
async fn edits_send_the_flattened_form_with_status_reset_to_pending() {
    let (stub, _, backend) = backend().await;
    let mut controller = SubmissionController::new(
        backend.clone(),
        DraftPersistence::new(backend.clone()),
        FormMode::Edit(ApplicationId::new("app-7")),
    );

    let record = controller.submit(&complete_form(), |_| {}).await.unwrap();
    assert_eq!(record.id, ApplicationId::new("app-7"));

    assert_eq!(stub.seen(), vec!["PUT /applications/app-7".to_string()]);
    let body = &stub.bodies()[0];
    assert_eq!(body["status"], "審核中");
    assert_eq!(body["title"], "Rust 自學");
    assert_eq!(body["plan_items"].as_array().unwrap().len(), 9);
    assert_eq!(body["members"][0]["student_id"], "11430001");
    assert!(body.get("fields").is_none());
}

#[tokio::test]
async fn status_only_review_omits_the_comment() {
    let (stub, _, backend) = backend().await;
    let request = ReviewRequest {
        status: ApplicationStatus::Passed,
        comment: None,
    };
    let record = backend
        .review_application(&ApplicationId::new("app-3"), &request)
        .await
        .unwrap();

    assert_eq!(record.status, ApplicationStatus::Passed);
    assert_eq!(stub.bodies(), vec![json!({ "status": "透過" })]);
}

#[tokio::test]
async fn teacher_reviews_an_application_beyond_the_first_page() {
    let (stub, _, backend) = backend().await;
    let id = ApplicationId::new("app-150");
    let mut board = ReviewBoard::new(backend.clone(), UserRole::Teacher);

    board.load(&id).await.unwrap();
    board.set_status(&id, ApplicationStatus::NotPassed).await.unwrap();
    board.open_comment(&id).unwrap();
    board.edit_comment("請補充參考資料").unwrap();
    board.save_comment().await.unwrap();

    assert_eq!(board.entries()[0].status, ApplicationStatus::NotPassed);
    assert_eq!(board.entries()[0].comment, "請補充參考資料");
    assert_eq!(
        stub.bodies(),
        vec![
            json!({ "status": "未透過" }),
            json!({ "status": "未透過", "comment": "請補充參考資料" }),
        ]
    );
}
