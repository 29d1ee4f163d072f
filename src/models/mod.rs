mod api;

pub use api::{CreateMessageRequest, HealthResponse, ItemResponse, MessageAccepted};
