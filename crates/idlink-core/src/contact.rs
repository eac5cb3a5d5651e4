//! Contact, the single stored entity.
//!
//! A contact records one sighting of an email and/or phone number. Contacts
//! that belong to the same real-world person form a group with exactly one
//! primary; every other member is a secondary pointing at it.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Precedence ──────────────────────────────────────────────────────────────

/// Whether a contact is the canonical member of its group.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkPrecedence {
  Primary,
  Secondary,
}

impl LinkPrecedence {
  /// Parse the value stored in the `link_precedence` column.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownPrecedence(s.to_owned()))
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A persisted contact row.
///
/// The precedence and link are kept as two separate fields, exactly as
/// stored, so that a corrupted row (a secondary with no link, a primary with
/// one) can still be loaded and repaired by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  pub id:              i64,
  pub phone_number:    Option<String>,
  pub email:           Option<String>,
  pub linked_id:       Option<i64>,
  pub link_precedence: LinkPrecedence,
  /// Server-assigned; never changes. Oldest contact in a group is primary.
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  /// Soft-delete marker. Stored and returned, but not consulted when
  /// matching or merging.
  pub deleted_at:      Option<DateTime<Utc>>,
}

impl Contact {
  pub fn is_primary(&self) -> bool {
    self.link_precedence == LinkPrecedence::Primary
  }

  /// The id this contact's group hangs off: its primary's id for a linked
  /// secondary, its own id otherwise.
  pub fn group_root(&self) -> i64 { self.linked_id.unwrap_or(self.id) }

  /// `true` if the contact is already a secondary pointing directly at
  /// `primary_id`.
  pub fn is_linked_to(&self, primary_id: i64) -> bool {
    self.link_precedence == LinkPrecedence::Secondary
      && self.linked_id == Some(primary_id)
  }

  /// Key used for primary election: earliest `created_at`, then lowest id.
  pub fn seniority(&self) -> (DateTime<Utc>, i64) { (self.created_at, self.id) }
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactTx::insert_contact`]. The id and
/// timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
  pub phone_number:    Option<String>,
  pub email:           Option<String>,
  pub linked_id:       Option<i64>,
  pub link_precedence: LinkPrecedence,
}

impl NewContact {
  /// A brand-new primary with no link.
  pub fn primary(email: Option<String>, phone_number: Option<String>) -> Self {
    Self {
      phone_number,
      email,
      linked_id: None,
      link_precedence: LinkPrecedence::Primary,
    }
  }

  /// A secondary attached to `primary_id`.
  pub fn secondary(
    email: Option<String>,
    phone_number: Option<String>,
    primary_id: i64,
  ) -> Self {
    Self {
      phone_number,
      email,
      linked_id: Some(primary_id),
      link_precedence: LinkPrecedence::Secondary,
    }
  }

  /// Materialise the row the store just wrote.
  pub fn into_contact(self, id: i64, now: DateTime<Utc>) -> Contact {
    Contact {
      id,
      phone_number: self.phone_number,
      email: self.email,
      linked_id: self.linked_id,
      link_precedence: self.link_precedence,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn precedence_round_trips_through_column_text() {
    assert_eq!(LinkPrecedence::Primary.as_ref(), "primary");
    assert_eq!(LinkPrecedence::Secondary.to_string(), "secondary");
    assert_eq!(
      LinkPrecedence::parse("secondary").unwrap(),
      LinkPrecedence::Secondary
    );
    assert!(matches!(
      LinkPrecedence::parse("tertiary"),
      Err(Error::UnknownPrecedence(s)) if s == "tertiary"
    ));
  }

  #[test]
  fn contact_serialises_with_camel_case_fields() {
    let now = Utc::now();
    let contact = NewContact::secondary(Some("a@x.com".into()), None, 7)
      .into_contact(9, now);
    let json = serde_json::to_value(&contact).unwrap();
    assert_eq!(json["linkedId"], 7);
    assert_eq!(json["linkPrecedence"], "secondary");
    assert!(json["phoneNumber"].is_null());
    assert!(json.get("deletedAt").is_some());
  }

  #[test]
  fn group_root_follows_link() {
    let now = Utc::now();
    let primary = NewContact::primary(Some("a@x.com".into()), None)
      .into_contact(1, now);
    let secondary = NewContact::secondary(None, Some("1".into()), 1)
      .into_contact(2, now);
    assert_eq!(primary.group_root(), 1);
    assert_eq!(secondary.group_root(), 1);
    assert!(secondary.is_linked_to(1));
    assert!(!primary.is_linked_to(1));
  }
}
