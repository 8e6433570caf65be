//! Pixel store implementations.

pub mod inmemory;

pub use inmemory::InMemoryPixelStore;
