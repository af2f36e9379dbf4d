//! Read path of the link service.
//!
//! Lookups by short code, id and custom slug, and paged listings of a
//! customer's links. Never writes to the store.

pub mod cursor;
pub mod error;
pub mod grpc;
pub mod query;
pub mod service;

pub use error::ReaderError;
pub use query::{ListLinksParams, ListQuery};
pub use service::{CustomerLinksPage, LinkReader, ReaderService, ReaderSettings};
