//! The SQLite implementation of [`IdentityStore`]: [`SqliteStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use idlink_core::{
  contact::{Contact, LinkPrecedence, NewContact},
  identity::{Lookup, Resolution},
  resolver,
  store::{ContactTx, IdentityStore},
};

use crate::{
  Result,
  encode::{CONTACT_COLUMNS, RawContact, encode_dt, encode_precedence},
  schema::SCHEMA,
};

/// How long a connection waits for another writer's lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// An idlink contact store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted, and every
/// clone funnels its calls through the same connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    store.set_busy_timeout(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Change how long a transaction waits for the write lock held by another
  /// connection (e.g. a second process sharing the file).
  pub async fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run arbitrary SQL outside the resolver, for seeding corrupted states.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// [`ContactTx`] over an open SQLite transaction. Borrowing the connection
/// (rather than owning the transaction) leaves commit to the caller.
struct SqliteTx<'a> {
  conn: &'a rusqlite::Connection,
}

impl SqliteTx<'_> {
  fn query_contacts(
    &self,
    sql: &str,
    params: impl rusqlite::Params,
  ) -> Result<Vec<Contact>> {
    let mut stmt = self.conn.prepare(sql)?;
    let raws = stmt
      .query_map(params, RawContact::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawContact::into_contact).collect()
  }
}

impl ContactTx for SqliteTx<'_> {
  type Error = crate::Error;

  fn find_direct_matches(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>> {
    // `column = NULL` is never true, so an absent argument matches nothing.
    let sql = format!(
      "SELECT {CONTACT_COLUMNS} FROM contacts
       WHERE email = ?1 OR phone_number = ?2
       ORDER BY id"
    );
    self.query_contacts(&sql, rusqlite::params![email, phone_number])
  }

  fn find_group(&mut self, roots: &[i64]) -> Result<Vec<Contact>> {
    if roots.is_empty() {
      return Ok(Vec::new());
    }

    // Walk `linked_id` edges in both directions until the set stops growing,
    // so a stale secondary -> secondary chain still reaches its primary.
    let placeholders = (1..=roots.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "WITH RECURSIVE grp(id) AS (
         SELECT id FROM contacts
          WHERE id IN ({placeholders}) OR linked_id IN ({placeholders})
         UNION
         SELECT c.id FROM contacts c JOIN grp g ON c.linked_id = g.id
         UNION
         SELECT c.linked_id FROM contacts c JOIN grp g ON c.id = g.id
          WHERE c.linked_id IS NOT NULL
       )
       SELECT {CONTACT_COLUMNS} FROM contacts
        WHERE id IN (SELECT id FROM grp)
        ORDER BY id"
    );
    self.query_contacts(&sql, rusqlite::params_from_iter(roots.iter()))
  }

  fn insert_contact(&mut self, input: NewContact, now: DateTime<Utc>) -> Result<Contact> {
    let at_str = encode_dt(now);
    self.conn.execute(
      "INSERT INTO contacts (
         phone_number, email, linked_id, link_precedence, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      rusqlite::params![
        input.phone_number,
        input.email,
        input.linked_id,
        encode_precedence(&input.link_precedence),
        at_str,
      ],
    )?;
    let id = self.conn.last_insert_rowid();
    Ok(input.into_contact(id, now))
  }

  fn update_link(
    &mut self,
    id: i64,
    precedence: LinkPrecedence,
    linked_id: Option<i64>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    self.conn.execute(
      "UPDATE contacts
          SET link_precedence = ?2, linked_id = ?3, updated_at = ?4
        WHERE id = ?1",
      rusqlite::params![id, encode_precedence(&precedence), linked_id, encode_dt(now)],
    )?;
    Ok(())
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = crate::Error;

  async fn identify(&self, lookup: Lookup) -> Result<Resolution> {
    // IMMEDIATE takes the write lock before the first read, so concurrent
    // identify calls cannot both decide to insert or disagree on the primary.
    // The clock is read only once the lock is held: a timestamp taken while
    // waiting on another connection would predate rows that connection
    // commits. Dropping the transaction without commit rolls it back.
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();
        let outcome = resolver::resolve(&mut SqliteTx { conn: &tx }, &lookup, now);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let resolution = outcome?;
    tracing::debug!(
      primary = resolution.identity.primary_contact_id,
      created = ?resolution.created.as_ref().map(|c| c.id),
      relinked = ?resolution.relinked,
      "identify committed"
    );
    Ok(resolution)
  }

  async fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
            rusqlite::params![id],
            RawContact::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn list_contacts(&self) -> Result<Vec<Contact>> {
    let raws: Vec<RawContact> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }
}
