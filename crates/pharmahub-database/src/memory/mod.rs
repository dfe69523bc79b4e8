//! Process-local repository backends.
//!
//! Used by the `memory` store provider and throughout the test suites.
//! State is lost on restart.

mod notification;
mod preference;
mod workspace;

pub use notification::MemoryNotificationRepository;
pub use preference::MemoryPreferenceRepository;
pub use workspace::MemoryWorkspaceDirectory;
