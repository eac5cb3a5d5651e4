//! JSON HTTP API for idlink.
//!
//! Exposes an axum [`Router`] backed by any
//! [`idlink_core::store::IdentityStore`]. TLS and transport concerns are the
//! caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/` | Liveness message |
//! | `POST` | `/identify` | Body: `{"email":..,"phoneNumber":..}`; 400 if both absent |
//! | `GET`  | `/contacts/{id}` | Raw stored contact; 404 if not found |

pub mod contacts;
pub mod error;
pub mod identify;

use std::sync::Arc;

use axum::{
  Json,
  Router,
  routing::{get, post},
};
use idlink_core::store::IdentityStore;
use serde_json::{Value, json};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: IdentityStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/", get(root))
    .route("/identify", post(identify::handler::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .with_state(store)
}

/// `GET /`
async fn root() -> Json<Value> {
  Json(json!({ "message": "idlink identity service is running" }))
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use idlink_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.unwrap())
  }

  async fn post_identify(store: Arc<SqliteStore>, body: &str) -> Response {
    let req = Request::builder()
      .method("POST")
      .uri("/identify")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    api_router(store).oneshot(req).await.unwrap()
  }

  async fn get_uri(store: Arc<SqliteStore>, uri: &str) -> Response {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    api_router(store).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── POST /identify ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn identify_new_contact_returns_consolidated_view() {
    let store = make_store().await;
    let resp = post_identify(store, r#"{"email":"a@x.com","phoneNumber":"1"}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    let contact = &body["contact"];
    assert!(contact["primaryContactId"].is_i64());
    assert_eq!(contact["emails"], json!(["a@x.com"]));
    assert_eq!(contact["phoneNumbers"], json!(["1"]));
    assert_eq!(contact["secondaryContactIds"], json!([]));
  }

  #[tokio::test]
  async fn identify_merges_two_groups() {
    let store = make_store().await;
    let a = json_body(post_identify(store.clone(), r#"{"email":"a@x.com"}"#).await).await;
    let b = json_body(post_identify(store.clone(), r#"{"phoneNumber":2}"#).await).await;
    let a_id = a["contact"]["primaryContactId"].clone();
    let b_id = b["contact"]["primaryContactId"].clone();

    let merged = json_body(
      post_identify(store, r#"{"email":"a@x.com","phoneNumber":"2"}"#).await,
    )
    .await;
    assert_eq!(merged["contact"]["primaryContactId"], a_id);
    assert_eq!(merged["contact"]["emails"], json!(["a@x.com"]));
    assert_eq!(merged["contact"]["phoneNumbers"], json!(["2"]));
    assert_eq!(merged["contact"]["secondaryContactIds"], json!([b_id]));
  }

  #[tokio::test]
  async fn identify_without_fields_returns_400() {
    let store = make_store().await;
    for body in [r#"{}"#, r#"{"email":null,"phoneNumber":null}"#, r#"{"email":""}"#] {
      let resp = post_identify(store.clone(), body).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
      let json = json_body(resp).await;
      assert!(json["error"].is_string());
    }
    assert!(store.list_contacts().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn identify_with_malformed_json_is_rejected() {
    let store = make_store().await;
    let resp = post_identify(store, "{not json").await;
    assert!(resp.status().is_client_error());
  }

  // ── GET /contacts/{id} ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn get_contact_returns_stored_row() {
    let store = make_store().await;
    let created =
      json_body(post_identify(store.clone(), r#"{"email":"a@x.com"}"#).await).await;
    let id = created["contact"]["primaryContactId"].as_i64().unwrap();

    let resp = get_uri(store, &format!("/contacts/{id}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let row = json_body(resp).await;
    assert_eq!(row["id"], id);
    assert_eq!(row["email"], "a@x.com");
    assert_eq!(row["linkPrecedence"], "primary");
    assert!(row["linkedId"].is_null());
  }

  #[tokio::test]
  async fn get_missing_contact_returns_404() {
    let store = make_store().await;
    let resp = get_uri(store, "/contacts/99").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── GET / ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn root_reports_liveness() {
    let store = make_store().await;
    let resp = get_uri(store, "/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(json_body(resp).await["message"].is_string());
  }
}
