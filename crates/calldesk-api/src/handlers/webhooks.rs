//! Provider webhook handlers
//!
//! Every handler takes the raw body bytes: the signature covers the exact
//! parameter set the provider sent, so the form is parsed once into sorted
//! pairs, verified, and only then shaped into a DTO. Nothing is persisted
//! before the signature checks out.

use crate::dto::{shape, CallStatusUpdate, IncomingCallWebhook, StatusRoute, VoiceWebhook};
use crate::state::AppState;
use actix_web::{
    web::{self, Bytes, Data},
    HttpRequest, HttpResponse, Result,
};
use calldesk_core::{
    models::{CallDirection, CallStatus},
    traits::NewCallRecord,
    AppError, AppResult,
};
use calldesk_telephony::{
    parse_form_body, side_effects::CrmCorrelation, twiml, Identity, ResolvedIdentity,
};
use std::collections::BTreeMap;
use tracing::{info, instrument};

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// The URL the provider signed: our public base plus the request path.
fn request_url(base: &str, req: &HttpRequest) -> String {
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.path());
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Reject the request unless the signature matches under the resolved
/// identity's signing key.
fn verify_signature(
    state: &AppState,
    req: &HttpRequest,
    params: &BTreeMap<String, String>,
    resolved: &ResolvedIdentity,
) -> AppResult<()> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let auth_token = resolved.agent.credentials.require_auth_token()?;
    let url = request_url(&state.telephony.base_url, req);

    state.verifier.verify(auth_token, &url, params, signature)
}

/// Outgoing call placed from the softphone. Responds with the dial
/// directive and creates the call record plus its attempt activity.
#[instrument(skip(req, body, state))]
pub async fn voice(
    req: HttpRequest,
    body: Bytes,
    state: Data<AppState>,
) -> Result<HttpResponse> {
    let params = parse_form_body(&body);
    let dto: VoiceWebhook = shape(&params)?;

    let identity = Identity::parse(&dto.from)?;
    let resolved = state.resolver.resolve(&identity).await?;
    verify_signature(&state, &req, &params, &resolved)?;

    let counterpart = Identity::parse(&dto.to)?;
    let directive = state.routing.route_outgoing(&resolved, &counterpart)?;

    let (record, created) = state
        .tracker
        .record_initiated(NewCallRecord {
            call_sid: dto.call_sid.clone(),
            direction: CallDirection::Outgoing,
            caller: dto.from.clone(),
            receiver: Some(dto.to.clone()),
            from_number: resolved.agent.agent_number.clone(),
            to_number: Some(counterpart.to_string()),
            status: CallStatus::Initiated,
            contact_id: dto.contact_id(),
        })
        .await?;

    if created {
        state
            .effects
            .on_outgoing_call_created(
                &record.call_sid,
                &resolved.agent,
                &CrmCorrelation {
                    contact_id: dto.contact_id(),
                    lead_id: dto.lead_id(),
                    opportunity_id: dto.opportunity_id(),
                },
            )
            .await?;
    }

    info!(call_sid = %record.call_sid, "Routed outgoing call");

    let xml = twiml::encode(&directive)?;
    Ok(HttpResponse::Ok().content_type("text/xml").body(xml))
}

/// Inbound call to an agent's provider number. Responds with a dial
/// directive for the agent's device, or the unavailable announcement when
/// no routing target exists.
#[instrument(skip(req, body, state))]
pub async fn incoming_call(
    req: HttpRequest,
    body: Bytes,
    state: Data<AppState>,
) -> Result<HttpResponse> {
    let params = parse_form_body(&body);
    let dto: IncomingCallWebhook = shape(&params)?;

    let identity = Identity::parse(&dto.to)?;
    let resolved = state.resolver.resolve(&identity).await?;
    verify_signature(&state, &req, &params, &resolved)?;

    let caller = Identity::parse(&dto.from)?;
    let directive = state.routing.route_incoming(&resolved, &caller.to_string());

    let (record, created) = state
        .tracker
        .record_initiated(NewCallRecord {
            call_sid: dto.call_sid.clone(),
            direction: CallDirection::Incoming,
            caller: dto.from.clone(),
            receiver: Some(dto.to.clone()),
            from_number: Some(caller.to_string()),
            to_number: resolved.agent.agent_number.clone(),
            status: CallStatus::Initiated,
            contact_id: None,
        })
        .await?;

    if created {
        state
            .effects
            .on_incoming_call_created(&record.call_sid, &resolved.agent, &caller.to_string())
            .await?;
    }

    info!(call_sid = %record.call_sid, "Routed incoming call");

    let xml = twiml::encode(&directive)?;
    Ok(HttpResponse::Ok().content_type("text/xml").body(xml))
}

async fn update_call_status(
    route: StatusRoute,
    req: HttpRequest,
    body: Bytes,
    state: Data<AppState>,
) -> Result<HttpResponse> {
    let params = parse_form_body(&body);
    let dto: CallStatusUpdate = shape(&params)?;

    let resolved = state.resolver.resolve_event(&dto.identity_fields()).await?;
    verify_signature(&state, &req, &params, &resolved)?;

    let event = dto.into_event()?;
    state
        .tracker
        .apply_status_event(&event, route.direction(), &resolved.agent)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Status event for an outgoing call leg
#[instrument(skip(req, body, state))]
pub async fn update_outgoing_call_status(
    req: HttpRequest,
    body: Bytes,
    state: Data<AppState>,
) -> Result<HttpResponse> {
    update_call_status(StatusRoute::Outgoing, req, body, state).await
}

/// Status event for an incoming call leg
#[instrument(skip(req, body, state))]
pub async fn update_incoming_call_status(
    req: HttpRequest,
    body: Bytes,
    state: Data<AppState>,
) -> Result<HttpResponse> {
    update_call_status(StatusRoute::Incoming, req, body, state).await
}

/// Mount the webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhooks/telephony")
            .route("/voice", web::post().to(voice))
            .route("/incoming-call", web::post().to(incoming_call))
            .route(
                "/update-outgoing-call-status",
                web::post().to(update_outgoing_call_status),
            )
            .route(
                "/update-incoming-call-status",
                web::post().to(update_incoming_call_status),
            ),
    );
}
