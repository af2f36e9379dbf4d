pub mod dynamo;
pub mod memory;

pub use dynamo::{DynamoRepository, DynamoSettings};
pub use memory::InMemoryRepository;
pub use portal_core::{ReadConsistency, ReadRepository, Repository, StorageError};
