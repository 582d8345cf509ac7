//! In-process store

mod store;

pub use store::MemoryStore;
