//! Core types and traits for the Portal link service.
//!
//! This crate provides shared types and traits used by both the
//! write service and the read service.

pub mod clock;
pub mod error;
pub mod link;
pub mod repository;
pub mod shortcode;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, StorageError};
pub use link::{CustomerId, FieldUpdate, Link, LinkId};
pub use repository::{
    CustomerIndexQuery, IndexCursor, IndexPage, ReadConsistency, ReadRepository, Repository,
};
pub use shortcode::ShortCode;
