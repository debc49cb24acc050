//! Data Transfer Objects for REST responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement for a relayed publish.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishResponse {
    /// The envelope was handed to the relay bus.
    pub accepted: bool,
    /// Time of acceptance.
    pub timestamp: DateTime<Utc>,
}
