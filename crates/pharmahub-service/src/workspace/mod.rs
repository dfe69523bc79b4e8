//! Workspace context resolution.

pub mod resolver;

pub use resolver::WorkspaceContextResolver;
