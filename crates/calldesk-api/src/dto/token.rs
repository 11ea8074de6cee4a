//! Access token DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request body for minting a voice access token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AccessTokenRequest {
    pub user_id: Uuid,

    /// Token lifetime in seconds
    #[validate(range(min = 60, max = 86400))]
    pub ttl: Option<i64>,
}

/// Minted token response payload
#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenResponse {
    pub token: String,
}
