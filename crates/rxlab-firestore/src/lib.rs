//! Firestore REST API document client.
//!
//! This crate provides:
//! - Bearer auth via the hand-rolled `rxlab-gauth` broker (no cloud SDK)
//! - A JSON to tagged-wire-value codec, both directions
//! - Upsert-by-id writes with automatic `updatedAt` stamping
//! - Ordered, limited structured queries
//!
//! Persistence is an optional capability: with no credential or project
//! configured, every operation resolves to `None`/empty instead of failing.

pub mod client;
pub mod codec;
pub mod error;
pub mod metrics;
pub mod types;


pub use client::{
    FirestoreClient, FirestoreConfig, ListOptions, QueriedDocument, FIRESTORE_SCOPE,
};
pub use error::{FirestoreError, FirestoreResult};
pub use types::{Document, Value};
