//! Offer storage backends.
//!
//! `MongoStore` is the production backend; `MemoryDocumentStore` mirrors
//! its document semantics in-process for tests and dry runs.

#![warn(clippy::unwrap_used)]

pub mod codec;
pub mod documents;
pub mod memory;
pub mod mongo;

pub use documents::{
    BulkWriteOutcome, DocumentFailure, DocumentUpdate, IndexOutcome, IndexSpec, OfferDocumentStore,
};
pub use memory::MemoryDocumentStore;
pub use mongo::MongoStore;
