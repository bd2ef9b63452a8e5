//! Storage implementations of the data access port

pub mod in_memory;

pub use in_memory::InMemoryStore;
