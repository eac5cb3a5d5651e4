//! The contact consolidation algorithm.
//!
//! [`resolve`] runs against any [`ContactTx`] and performs, in order:
//!
//! 1. direct match lookup on email / phone number;
//! 2. expansion of the matches to their whole group(s);
//! 3. election of the oldest group member as primary;
//! 4. re-linking every other member directly to that primary;
//! 5. insertion of a secondary when the lookup carries novel information;
//! 6. assembly of the [`ConsolidatedIdentity`].
//!
//! The function is synchronous and never commits; the backend wraps the call
//! in its own transaction.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};

use crate::{
  contact::{Contact, LinkPrecedence, NewContact},
  identity::{ConsolidatedIdentity, Lookup, Resolution},
  store::ContactTx,
};

/// Resolve `lookup` to a consolidated identity, writing through `tx`.
pub fn resolve<T: ContactTx>(
  tx: &mut T,
  lookup: &Lookup,
  now: DateTime<Utc>,
) -> Result<Resolution, T::Error> {
  let matches = tx.find_direct_matches(lookup.email(), lookup.phone_number())?;
  let mut group = expand_group(tx, matches)?;

  let Some(primary) = elect_primary(&group).cloned() else {
    let contact = tx.insert_contact(
      NewContact::primary(
        lookup.email().map(str::to_owned),
        lookup.phone_number().map(str::to_owned),
      ),
      now,
    )?;
    let identity = assemble(&contact, std::slice::from_ref(&contact));
    return Ok(Resolution { identity, created: Some(contact), relinked: Vec::new() });
  };

  let relinked = relink(tx, &mut group, &primary, now)?;

  let created = if carries_novel_info(lookup, &group) {
    let contact = tx.insert_contact(
      NewContact::secondary(
        lookup.email().map(str::to_owned),
        lookup.phone_number().map(str::to_owned),
        primary.id,
      ),
      now,
    )?;
    group.push(contact.clone());
    Some(contact)
  } else {
    None
  };

  let identity = assemble(&primary, &group);
  Ok(Resolution { identity, created, relinked })
}

// ─── Grouping ────────────────────────────────────────────────────────────────

/// Fetch the involved group for `matches`, de-duplicated by id and ordered by
/// id. The direct matches are always part of the result; no matches means
/// an empty group and no query.
fn expand_group<T: ContactTx>(
  tx: &mut T,
  matches: Vec<Contact>,
) -> Result<Vec<Contact>, T::Error> {
  if matches.is_empty() {
    return Ok(Vec::new());
  }

  let roots: IndexSet<i64> = matches.iter().map(Contact::group_root).collect();
  let roots: Vec<i64> = roots.into_iter().collect();

  let mut by_id: IndexMap<i64, Contact> = tx
    .find_group(&roots)?
    .into_iter()
    .map(|c| (c.id, c))
    .collect();
  for contact in matches {
    by_id.entry(contact.id).or_insert(contact);
  }
  by_id.sort_keys();
  Ok(by_id.into_values().collect())
}

/// The oldest contact in `group`; ties go to the lowest id.
pub fn elect_primary(group: &[Contact]) -> Option<&Contact> {
  group.iter().min_by_key(|c| c.seniority())
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Point every member of `group` other than `primary` directly at it, and
/// make sure `primary` itself is in the primary state. Mirrors each write
/// onto the in-memory copy. Returns the ids rewritten, ascending.
fn relink<T: ContactTx>(
  tx: &mut T,
  group: &mut [Contact],
  primary: &Contact,
  now: DateTime<Utc>,
) -> Result<Vec<i64>, T::Error> {
  let mut relinked = Vec::new();

  for contact in group.iter_mut() {
    let (precedence, linked_id) = if contact.id == primary.id {
      if contact.is_primary() && contact.linked_id.is_none() {
        continue;
      }
      (LinkPrecedence::Primary, None)
    } else {
      if contact.is_linked_to(primary.id) {
        continue;
      }
      (LinkPrecedence::Secondary, Some(primary.id))
    };

    tx.update_link(contact.id, precedence, linked_id, now)?;
    contact.link_precedence = precedence;
    contact.linked_id = linked_id;
    contact.updated_at = now;
    relinked.push(contact.id);
  }

  Ok(relinked)
}

// ─── Novelty ─────────────────────────────────────────────────────────────────

/// `true` if `lookup` carries an email or phone number that no member of
/// `group` has.
fn carries_novel_info(lookup: &Lookup, group: &[Contact]) -> bool {
  let emails: IndexSet<&str> = group.iter().filter_map(|c| c.email.as_deref()).collect();
  let phones: IndexSet<&str> =
    group.iter().filter_map(|c| c.phone_number.as_deref()).collect();

  lookup.email().is_some_and(|e| !emails.contains(e))
    || lookup.phone_number().is_some_and(|p| !phones.contains(p))
}

// ─── Assembly ────────────────────────────────────────────────────────────────

/// Build the consolidated view of `group` around `primary`.
pub fn assemble(primary: &Contact, group: &[Contact]) -> ConsolidatedIdentity {
  let emails = primary_first(
    primary.email.as_deref(),
    group.iter().filter_map(|c| c.email.as_deref()),
  );
  let phone_numbers = primary_first(
    primary.phone_number.as_deref(),
    group.iter().filter_map(|c| c.phone_number.as_deref()),
  );
  let secondary_contact_ids: BTreeSet<i64> = group
    .iter()
    .filter(|c| c.link_precedence == LinkPrecedence::Secondary)
    .map(|c| c.id)
    .collect();

  ConsolidatedIdentity {
    primary_contact_id: primary.id,
    emails,
    phone_numbers,
    secondary_contact_ids: secondary_contact_ids.into_iter().collect(),
  }
}

/// Distinct values with `first` leading, the rest ascending.
fn primary_first<'a>(
  first: Option<&'a str>,
  values: impl Iterator<Item = &'a str>,
) -> Vec<String> {
  let rest: BTreeSet<&str> = values.collect();
  let ordered: IndexSet<&str> = first.into_iter().chain(rest).collect();
  ordered.into_iter().map(str::to_owned).collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
