//! Request and result types for an identify call.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, contact::Contact};

// ─── Lookup ──────────────────────────────────────────────────────────────────

/// A validated identify request: at least one of `email` and
/// `phone_number` is present and non-empty.
///
/// Values are otherwise kept exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
  email:        Option<String>,
  phone_number: Option<String>,
}

impl Lookup {
  /// Build a lookup, treating empty strings as absent.
  pub fn new(email: Option<String>, phone_number: Option<String>) -> Result<Self> {
    let email = email.filter(|e| !e.is_empty());
    let phone_number = phone_number.filter(|p| !p.is_empty());
    if email.is_none() && phone_number.is_none() {
      return Err(Error::EmptyLookup);
    }
    Ok(Self { email, phone_number })
  }

  pub fn email(&self) -> Option<&str> { self.email.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }
}

// ─── Consolidated view ───────────────────────────────────────────────────────

/// The merged view of one real-world identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedIdentity {
  pub primary_contact_id:    i64,
  /// Primary's own email first (when it has one), then the rest ascending.
  pub emails:                Vec<String>,
  /// Primary's own phone number first (when it has one), then the rest
  /// ascending.
  pub phone_numbers:         Vec<String>,
  /// Ascending, de-duplicated.
  pub secondary_contact_ids: Vec<i64>,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Outcome of one resolver run: the identity plus the writes it performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
  pub identity: ConsolidatedIdentity,
  /// The contact inserted by this run, if any (a new primary or a new
  /// secondary carrying novel information).
  pub created:  Option<Contact>,
  /// Ids whose precedence or link was rewritten, ascending.
  pub relinked: Vec<i64>,
}

impl Resolution {
  /// `true` if the run wrote nothing.
  pub fn is_noop(&self) -> bool { self.created.is_none() && self.relinked.is_empty() }
}
