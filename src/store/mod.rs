//! Rate cache persistence backends

pub mod debounce;
pub mod disk;
pub mod memory;

pub use debounce::DebouncedWriter;
pub use disk::JsonFileStore;
pub use memory::MemoryStore;
