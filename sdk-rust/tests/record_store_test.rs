mod common;

use axum::http::{Method, StatusCode};
use common::{admin_session, FakeBackend};
use folio_sdk::{
    FolioError, HttpRecordStore, RecordId, RecordStore, ResourceKind, Session, SessionListener,
    SessionUser,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

fn store(backend: &FakeBackend, session: Arc<Session>) -> HttpRecordStore {
    HttpRecordStore::new(&backend.config(), session).expect("record store")
}

#[tokio::test]
async fn list_returns_records_from_data() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::GET,
        "/api/blogs/get-all",
        StatusCode::OK,
        json!({
            "success": true,
            "data": [
                { "_id": "b1", "title": "Hello", "imageUrl": "https://res.cloudinary.com/acct/image/upload/v1/b1.png" },
                { "_id": "b2", "title": "Again" },
            ],
        }),
    );

    let records = store(&backend, Arc::new(Session::new()))
        .list(ResourceKind::Blog)
        .await
        .expect("list succeeds");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, RecordId::from("b1"));
    assert_eq!(records[0].field_str("title"), Some("Hello"));
    assert!(records[1].image_url.is_none());

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].authorization.is_none());
}

#[tokio::test]
async fn list_without_a_data_list_is_empty() {
    let backend = FakeBackend::start().await;
    backend
        .respond(
            Method::GET,
            "/api/slides/get-all",
            StatusCode::OK,
            json!({ "success": true }),
        )
        .respond(
            Method::GET,
            "/api/testimonials/get-all",
            StatusCode::OK,
            json!({ "success": true, "data": "nothing here" }),
        );
    let store = store(&backend, Arc::new(Session::new()));

    assert!(store.list(ResourceKind::Slide).await.unwrap().is_empty());
    assert!(store.list(ResourceKind::Testimonial).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_surfaces_rate_limiting() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::GET,
        "/api/contacts/get-all",
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "message": "Too many requests, please try again later." }),
    );

    let error = store(&backend, Arc::new(Session::new()))
        .list(ResourceKind::Contact)
        .await
        .expect_err("list should fail");
    assert!(error.is_rate_limited());
}

#[tokio::test]
async fn create_sends_bearer_token_and_json_body() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::POST,
        "/api/testimonials/new",
        StatusCode::CREATED,
        json!({
            "success": true,
            "data": { "_id": "t1", "clientName": "Ada", "imageUrl": "https://res.cloudinary.com/acct/image/upload/v1/t1.png" },
        }),
    );

    let record = store(&backend, admin_session("tok-1"))
        .create(
            ResourceKind::Testimonial,
            json!({ "clientName": "Ada", "imageUrl": "https://res.cloudinary.com/acct/image/upload/v1/t1.png" }),
        )
        .await
        .expect("create succeeds");

    assert_eq!(record.id, RecordId::from("t1"));
    let request = &backend.requests_to("/api/testimonials/new")[0];
    assert_eq!(request.authorization.as_deref(), Some("Bearer tok-1"));
    assert_eq!(request.json()["clientName"], "Ada");
}

#[tokio::test]
async fn create_accepted_without_a_record_is_unconfirmed() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::POST,
        "/api/blogs/new",
        StatusCode::CREATED,
        json!({ "success": true, "message": "Blog created successfully" }),
    );

    let error = store(&backend, admin_session("tok"))
        .create(ResourceKind::Blog, json!({ "title": "Launch" }))
        .await
        .expect_err("the reply has no record");

    assert!(matches!(error, FolioError::Unconfirmed(_)));
    assert!(!error.is_rejection());
    assert_eq!(backend.requests_to("/api/blogs/new").len(), 1);
}

#[tokio::test]
async fn create_surfaces_backend_message_verbatim() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::POST,
        "/api/blogs/new",
        StatusCode::BAD_REQUEST,
        json!({ "success": false, "error": "A blog with this title already exists" }),
    );

    let error = store(&backend, admin_session("tok"))
        .create(ResourceKind::Blog, json!({ "title": "Dup" }))
        .await
        .expect_err("create should fail");
    match error {
        FolioError::Validation(message) => {
            assert_eq!(message, "A blog with this title already exists");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    let backend = FakeBackend::start().await;
    let store = store(&backend, Arc::new(Session::new()));

    let error = store
        .delete(ResourceKind::Slide, &RecordId::from("s1"))
        .await
        .expect_err("delete should fail");
    assert!(matches!(error, FolioError::AuthRequired));

    let error = store
        .create(ResourceKind::Slide, json!({}))
        .await
        .expect_err("create should fail");
    assert!(matches!(error, FolioError::AuthRequired));

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn delete_maps_not_found_and_rejections() {
    let backend = FakeBackend::start().await;
    backend
        .respond(
            Method::DELETE,
            "/api/slides/delete/missing",
            StatusCode::NOT_FOUND,
            json!({ "message": "Slide not found" }),
        )
        .respond(
            Method::DELETE,
            "/api/slides/delete/locked",
            StatusCode::OK,
            json!({ "success": false, "message": "Slide is in use" }),
        )
        .respond(
            Method::DELETE,
            "/api/slides/delete/7",
            StatusCode::OK,
            json!({ "success": true }),
        );
    let store = store(&backend, admin_session("tok"));

    assert!(matches!(
        store.delete(ResourceKind::Slide, &RecordId::from("missing")).await,
        Err(FolioError::NotFound(message)) if message == "Slide not found"
    ));
    assert!(matches!(
        store.delete(ResourceKind::Slide, &RecordId::from("locked")).await,
        Err(FolioError::Rejected(message)) if message == "Slide is in use"
    ));
    store
        .delete(ResourceKind::Slide, &RecordId::Number(7))
        .await
        .expect("numeric id deletes");
}

#[derive(Default)]
struct RedirectCounter(AtomicUsize);

impl SessionListener for RedirectCounter {
    fn on_session_expired(&self, _user: &SessionUser) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn concurrent_unauthorized_replies_end_the_session_once() {
    let backend = FakeBackend::start().await;
    for id in ["a", "b", "c"] {
        backend.respond(
            Method::DELETE,
            &format!("/api/blogs/delete/{id}"),
            StatusCode::UNAUTHORIZED,
            json!({ "message": "jwt expired" }),
        );
    }
    let session = admin_session("stale");
    let redirects = Arc::new(RedirectCounter::default());
    session.subscribe(redirects.clone());
    let store = store(&backend, session.clone());
    let ids = [
        RecordId::from("a"),
        RecordId::from("b"),
        RecordId::from("c"),
    ];

    let (a, b, c) = tokio::join!(
        store.delete(ResourceKind::Blog, &ids[0]),
        store.delete(ResourceKind::Blog, &ids[1]),
        store.delete(ResourceKind::Blog, &ids[2]),
    );

    for result in [a, b, c] {
        assert!(matches!(result, Err(FolioError::Unauthorized(message)) if message == "jwt expired"));
    }
    assert_eq!(redirects.0.load(Ordering::SeqCst), 1);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn mark_read_puts_to_contact_route() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::PUT,
        "/api/contacts/c9/mark-read",
        StatusCode::OK,
        json!({ "success": true }),
    );
    let store = store(&backend, admin_session("tok"));

    store
        .mark_read(ResourceKind::Contact, &RecordId::from("c9"))
        .await
        .expect("mark read succeeds");
    assert!(matches!(
        store.mark_read(ResourceKind::Blog, &RecordId::from("b1")).await,
        Err(FolioError::Unsupported(ResourceKind::Blog, _))
    ));

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok"));
}

#[tokio::test]
async fn get_by_id_posts_for_blog_detail() {
    let backend = FakeBackend::start().await;
    backend.respond(
        Method::POST,
        "/api/blogs/get-by-id/b1",
        StatusCode::OK,
        json!({ "success": true, "data": { "_id": "b1", "title": "Hello", "content": "<p>World</p>" } }),
    );
    let store = store(&backend, Arc::new(Session::new()));

    let record = store
        .get_by_id(ResourceKind::Blog, &RecordId::from("b1"))
        .await
        .expect("detail succeeds");
    assert_eq!(record.field_str("content"), Some("<p>World</p>"));

    assert!(matches!(
        store
            .get_by_id(ResourceKind::Slide, &RecordId::from("s1"))
            .await,
        Err(FolioError::Unsupported(ResourceKind::Slide, _))
    ));
}
