pub mod conformance;
mod error;
mod file;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::StoredBatch;
pub use traits::CustodyStorage;
