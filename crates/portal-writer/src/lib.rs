//! Write path of the link service.
//!
//! This crate owns every mutation of the link store: creation with unique
//! short code allocation, full-record updates, deletes and click counting.

pub mod error;
pub mod grpc;
pub mod service;

pub use error::WriterError;
pub use service::{CreateLinkParams, LinkWriter, UpdateLinkParams, WriterService, WriterSettings};
