//! Handler for `GET /contacts/{id}`: the raw stored row, for inspection.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use idlink_core::{contact::Contact, store::IdentityStore};

use crate::error::ApiError;

/// `GET /contacts/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError>
where
  S: IdentityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contact = store
    .get_contact(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(contact))
}
