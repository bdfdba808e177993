use axum::http::{self, Request, StatusCode};
use axum::response::Response;
use axum::routing::RouterIntoService;
use http_body_util::BodyExt;
use mock_couchdb::{app, app_with, MockOptions};
use serde_json::{json, Value};
use tower::{Service, ServiceExt};

// base64("admin:password"), the default mock credentials.
const ADMIN: &str = "Basic YWRtaW46cGFzc3dvcmQ=";

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

fn admin_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, ADMIN)
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

async fn call(app: &mut RouterIntoService<String>, req: Request<String>) -> Response {
    ServiceExt::ready(app).await.unwrap().call(req).await.unwrap()
}

// --- server endpoints ---

#[tokio::test]
async fn all_dbs_empty() {
    let resp = app().oneshot(request("GET", "/_all_dbs")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!([]));
}

#[tokio::test]
async fn uuids_returns_one_hex_id() {
    let resp = app().oneshot(request("GET", "/_uuids")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let uuids = body["uuids"].as_array().unwrap();
    assert_eq!(uuids.len(), 1);
    let id = uuids[0].as_str().unwrap();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

// --- databases ---

#[tokio::test]
async fn create_db_requires_admin() {
    let resp = app().oneshot(request("PUT", "/books")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "unauthorized");
}

#[tokio::test]
async fn create_db_rejects_illegal_name() {
    let resp = app().oneshot(admin_request("PUT", "/Books")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "illegal_database_name");
}

#[tokio::test]
async fn create_db_twice_returns_412() {
    let mut app = app().into_service();

    let resp = call(&mut app, admin_request("PUT", "/books")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await, json!({"ok": true}));

    let resp = call(&mut app, admin_request("PUT", "/books")).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(body_json(resp).await["error"], "file_exists");
}

#[tokio::test]
async fn quirk_creates_database_but_answers_500() {
    let options = MockOptions {
        quirk_500_on_create: true,
        ..MockOptions::default()
    };
    let mut app = app_with(options).into_service();

    let resp = call(&mut app, admin_request("PUT", "/books")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = call(&mut app, request("GET", "/books")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn db_info_not_found() {
    let resp = app().oneshot(request("GET", "/books")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(resp).await,
        json!({"error": "not_found", "reason": "Database does not exist."})
    );
}

#[tokio::test]
async fn delete_db_not_found() {
    let resp = app().oneshot(admin_request("DELETE", "/books")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_db_requires_admin() {
    let mut app = app().into_service();
    call(&mut app, admin_request("PUT", "/books")).await;

    let resp = call(&mut app, request("DELETE", "/books")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = call(&mut app, request("GET", "/_all_dbs")).await;
    assert_eq!(body_json(resp).await, json!(["books"]));
}

// --- documents ---

#[tokio::test]
async fn put_doc_into_missing_db_returns_404() {
    let resp = app()
        .oneshot(json_request("PUT", "/books/dune", r#"{"a":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_doc_rejects_non_object_body() {
    let mut app = app().into_service();
    call(&mut app, admin_request("PUT", "/books")).await;

    let resp = call(&mut app, json_request("PUT", "/books/dune", "[1,2]")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_without_current_rev_conflicts() {
    let mut app = app().into_service();
    call(&mut app, admin_request("PUT", "/books")).await;

    let resp = call(&mut app, json_request("PUT", "/books/dune", r#"{"a":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let rev = body_json(resp).await["rev"].as_str().unwrap().to_string();
    assert!(rev.starts_with("1-"));

    let resp = call(&mut app, json_request("PUT", "/books/dune", r#"{"a":2}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body = format!(r#"{{"a":2,"_rev":"{rev}"}}"#);
    let resp = call(&mut app, json_request("PUT", "/books/dune", &body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(body_json(resp).await["rev"].as_str().unwrap().starts_with("2-"));
}

#[tokio::test]
async fn delete_doc_with_stale_rev_conflicts() {
    let mut app = app().into_service();
    call(&mut app, admin_request("PUT", "/books")).await;
    call(&mut app, json_request("PUT", "/books/dune", r#"{"a":1}"#)).await;

    let resp = call(&mut app, request("DELETE", "/books/dune?rev=1-deadbeef")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = call(&mut app, request("DELETE", "/books/dune")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = call(&mut app, request("GET", "/books/dune")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- full document lifecycle ---

#[tokio::test]
async fn document_lifecycle() {
    let mut app = app().into_service();

    let resp = call(&mut app, admin_request("PUT", "/books")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // create
    let resp = call(&mut app, json_request("PUT", "/books/dune", r#"{"title":"Dune"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["id"], "dune");
    let rev = created["rev"].as_str().unwrap().to_string();

    // get carries metadata
    let resp = call(&mut app, request("GET", "/books/dune")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"_id": "dune", "_rev": rev, "title": "Dune"})
    );

    // db info counts it
    let resp = call(&mut app, request("GET", "/books")).await;
    assert_eq!(body_json(resp).await["doc_count"], 1);

    // delete with the current rev
    let resp = call(&mut app, request("DELETE", &format!("/books/dune?rev={rev}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let deleted = body_json(resp).await;
    assert!(deleted["rev"].as_str().unwrap().starts_with("2-"));

    // tombstone answers 404 "deleted"
    let resp = call(&mut app, request("GET", "/books/dune")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["reason"], "deleted");

    let resp = call(&mut app, request("GET", "/books")).await;
    let info = body_json(resp).await;
    assert_eq!(info["doc_count"], 0);
    assert_eq!(info["doc_del_count"], 1);

    // recreating over the tombstone continues the history
    let resp = call(&mut app, json_request("PUT", "/books/dune", r#"{"title":"Dune"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(body_json(resp).await["rev"].as_str().unwrap().starts_with("3-"));

    // drop the database
    let resp = call(&mut app, admin_request("DELETE", "/books")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = call(&mut app, request("GET", "/_all_dbs")).await;
    assert_eq!(body_json(resp).await, json!([]));
}
