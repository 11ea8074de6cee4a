//! Voice access token handler

use crate::dto::{AccessTokenRequest, AccessTokenResponse, ApiResponse};
use crate::state::AppState;
use actix_web::{
    web::{self, Data, Json},
    Result,
};
use calldesk_core::AppError;
use calldesk_telephony::{token::generate_voice_access_token, Identity};
use tracing::{info, instrument};
use validator::Validate;

/// Mint a voice access token for a user's softphone session
#[instrument(skip(state, body))]
pub async fn access_token(
    body: Json<AccessTokenRequest>,
    state: Data<AppState>,
) -> Result<Json<ApiResponse<AccessTokenResponse>>> {
    body.validate().map_err(AppError::from)?;

    let resolved = state
        .resolver
        .resolve(&Identity::Client(body.user_id))
        .await?;
    let credentials = resolved.agent.credentials.require_token_credentials()?;

    let token = generate_voice_access_token(credentials, body.user_id, body.ttl)?;
    info!(user_id = %body.user_id, "Issued voice access token");

    Ok(Json(ApiResponse::success(AccessTokenResponse { token })))
}

/// Mount the token route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/telephony").route("/access-token", web::post().to(access_token)));
}
