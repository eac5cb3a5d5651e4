//! Storage abstractions used by the resolver and the HTTP layer.
//!
//! [`ContactTx`] is the minimal query interface the resolver needs inside one
//! transaction. [`IdentityStore`] is what backends (e.g.
//! `idlink-store-sqlite`) expose to higher layers: the whole identify
//! operation, run atomically, plus a couple of reads.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  contact::{Contact, LinkPrecedence, NewContact},
  identity::{Lookup, Resolution},
};

// ─── Transaction interface ───────────────────────────────────────────────────

/// Reads and writes available to the resolver within a single transaction.
///
/// Implementations must not commit; the caller owns the transaction and
/// commits only once [`crate::resolver::resolve`] returns `Ok`.
pub trait ContactTx {
  type Error;

  /// Every contact whose email equals `email` or whose phone number equals
  /// `phone_number`. An absent argument matches nothing.
  fn find_direct_matches(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>, Self::Error>;

  /// Every contact connected to `roots`: at minimum the roots themselves and
  /// every contact whose `linked_id` is a root. Backends may follow links
  /// further (transitively, in both directions); doing so lets a corrupted
  /// chain be flattened on the next run.
  fn find_group(&mut self, roots: &[i64]) -> Result<Vec<Contact>, Self::Error>;

  /// Persist `input` with a generated id and `created_at = updated_at = now`.
  fn insert_contact(
    &mut self,
    input: NewContact,
    now: DateTime<Utc>,
  ) -> Result<Contact, Self::Error>;

  /// Rewrite a contact's precedence and link, bumping `updated_at`.
  fn update_link(
    &mut self,
    id: i64,
    precedence: LinkPrecedence,
    linked_id: Option<i64>,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;
}

// ─── Store trait ─────────────────────────────────────────────────────────────

/// Abstraction over an idlink storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve `lookup` against the stored contacts, merging and inserting as
  /// needed. All writes happen atomically with respect to other `identify`
  /// calls; on error nothing is persisted.
  fn identify(
    &self,
    lookup: Lookup,
  ) -> impl Future<Output = Result<Resolution, Self::Error>> + Send + '_;

  /// Retrieve a contact by id. Returns `None` if not found.
  fn get_contact(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// All contacts, ordered by id.
  fn list_contacts(
    &self,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;
}
