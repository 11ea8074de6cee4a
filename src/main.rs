//! Calldesk backend server
//!
//! CRM backend around a telephony call-event orchestration core: provider
//! webhooks are verified, resolved to an agent identity, routed, and merged
//! into consistent call records with derived CRM side effects.

use actix_web::{middleware, web, App, HttpServer};
use calldesk_api::{configure_health, configure_tokens, configure_webhooks, AppState};
use calldesk_core::config::AppConfig;
use calldesk_db::{
    create_pool, PgActivityRepository, PgAgentDirectory, PgCallLogRepository,
    PgContactRepository, PgInboxRepository,
};
use calldesk_telephony::{
    side_effects::EffectPolicy, IdentityResolver, LifecycleTracker, RoutingEngine,
    SideEffectEngine, SignatureVerifier, TwilioClient,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "calldesk={},calldesk_api={},calldesk_telephony={},calldesk_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Calldesk backend v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().expect("Failed to load configuration");

    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, Some(config.database.max_connections))
        .await
        .expect("Failed to create database pool");

    // Repositories
    let calls = Arc::new(PgCallLogRepository::new(pool.clone()));
    let activities = Arc::new(PgActivityRepository::new(pool.clone()));
    let inbox = Arc::new(PgInboxRepository::new(pool.clone()));
    let agents = Arc::new(PgAgentDirectory::new(pool.clone()));
    let contacts = Arc::new(PgContactRepository::new(pool.clone()));

    // Orchestration core
    let provider = Arc::new(
        TwilioClient::new(Duration::from_secs(config.telephony.provider_timeout_secs))
            .expect("Failed to build provider client"),
    );
    let effects = Arc::new(SideEffectEngine::new(
        activities,
        inbox,
        contacts,
        EffectPolicy::from_config(&config.telephony),
    ));
    let tracker = Arc::new(LifecycleTracker::new(calls, provider, effects.clone()));
    let resolver = Arc::new(IdentityResolver::new(agents));

    let state = web::Data::new(AppState {
        resolver,
        routing: RoutingEngine::new(config.telephony.clone()),
        tracker,
        effects,
        verifier: SignatureVerifier::new(),
        telephony: config.telephony.clone(),
    });

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!(
        "Starting HTTP server on {} with {} workers, callbacks at {}",
        bind_addr, workers, config.telephony.base_url
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(64 * 1024))
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_health)
            .configure(configure_webhooks)
            .configure(configure_tokens)
    })
    .bind(&bind_addr)?
    .workers(workers)
    .run()
    .await
}
