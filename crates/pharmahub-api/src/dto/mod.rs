//! Request and response bodies.

pub mod request;
pub mod response;

pub use request::{BulkReadRequest, CreateNotificationRequest, InvalidateContextRequest};
pub use response::{
    ApiResponse, ChangedResponse, CountResponse, DetailedHealthResponse, HealthResponse,
    InvalidateResponse, JobsResponse,
};
