//! Tenant records owned by external collaborators, and the context derived
//! from them for authorization decisions.

pub mod context;
pub mod limits;
pub mod model;

pub use context::{PlanRef, SubscriptionRef, WorkspaceContext, WorkspaceRef};
pub use limits::{Limit, PlanLimits};
pub use model::{Plan, Subscription, SubscriptionStatus, Workspace};
