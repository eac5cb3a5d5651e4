//! Error types for `idlink-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("at least one of email or phoneNumber must be provided")]
  EmptyLookup,

  #[error("unknown link precedence: {0:?}")]
  UnknownPrecedence(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
