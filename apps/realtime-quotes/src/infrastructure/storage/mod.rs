//! Key-Value Store Adapters
//!
//! - [`JsonFileStore`]: one JSON object on disk, rewritten atomically
//! - [`MemoryStore`]: process-local map

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
