//! Core types, storage traits and the consolidation algorithm for idlink.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Backends implement [`store::ContactTx`] and [`store::IdentityStore`]; the
//! HTTP layer talks only to the latter.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod contact;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod store;

pub use error::{Error, Result};
