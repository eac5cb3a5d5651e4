//! Handler for `POST /identify`.
//!
//! Body: `{"email": "...", "phoneNumber": "..."}`, either field may be null
//! or missing but not both. `phoneNumber` is also accepted as a JSON number.

use std::sync::Arc;

use axum::{Json, extract::State};
use idlink_core::{
  identity::{ConsolidatedIdentity, Lookup},
  store::IdentityStore,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default, deserialize_with = "string_or_number")]
  pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentifyResponse {
  pub contact: ConsolidatedIdentity,
}

/// Accept `"123"` and `123` alike. Only integral numbers are taken, written
/// in decimal; `1.5` or `1e3` is rejected.
fn string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Text(String),
    Signed(i64),
    Unsigned(u64),
  }

  Ok(Option::<Raw>::deserialize(de)?.map(|raw| match raw {
    Raw::Text(s) => s,
    Raw::Signed(n) => n.to_string(),
    Raw::Unsigned(n) => n.to_string(),
  }))
}

// ─── Handler ──────────────────────────────────────────────────────────────────

/// `POST /identify`: returns the consolidated identity for the request.
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<IdentifyRequest>,
) -> Result<Json<IdentifyResponse>, ApiError>
where
  S: IdentityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let lookup = Lookup::new(body.email, body.phone_number)?;

  let span = tracing::info_span!("identify", request_id = %Uuid::new_v4());
  let resolution = store
    .identify(lookup)
    .instrument(span.clone())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  span.in_scope(|| {
    tracing::info!(
      primary = resolution.identity.primary_contact_id,
      created = ?resolution.created.as_ref().map(|c| c.id),
      relinked = ?resolution.relinked,
      "identity resolved"
    );
  });

  Ok(Json(IdentifyResponse { contact: resolution.identity }))
}
