//! Core traits defined in `pharmahub-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
