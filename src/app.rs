/*
 * Responsibility
 * - Config -> security log sink -> gate -> Router
 * - Layer order (outer -> inner): static headers, http, nonce/CSP, gate, handlers
 * - axum::serve() startup
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, HttpSettings, SecurityLogSettings, SinkKind};
use crate::middleware;
use crate::services::gate::build_gate;
use crate::services::security_log::{
    NonBlockingSink, SecurityLogger, SecuritySink, StderrSink, TracingSink,
};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=info,route_gate=debug,security=warn
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default hook, server keeps running.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting route gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = build_router(state, config.http);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}

/// Must run inside the tokio runtime (the log sink spawns its drain task).
fn build_state(config: &Config) -> Result<AppState> {
    let logger = SecurityLogger::new(build_sink(&config.security_log));
    let gate = build_gate(&config.gate, logger).context("building gate")?;

    tracing::info!(
        admin = config.gate.routes.admin.len(),
        protected = config.gate.routes.protected.len(),
        auth = config.gate.routes.auth.len(),
        public = config.gate.routes.public.len(),
        excluded = config.gate.routes.excluded.len(),
        "route table loaded"
    );

    Ok(AppState::new(Arc::new(gate)))
}

fn build_sink(settings: &SecurityLogSettings) -> Arc<dyn SecuritySink> {
    let inner: Arc<dyn SecuritySink> = match settings.sink {
        SinkKind::Tracing => Arc::new(TracingSink),
        SinkKind::Stderr => Arc::new(StderrSink),
    };
    Arc::new(NonBlockingSink::spawn(inner, settings.queue_capacity))
}

/// Assemble the full middleware stack around the page routes.
pub fn build_router(state: AppState, http: HttpSettings) -> Router {
    let router = api::routes().with_state(state.clone());
    let router = middleware::gate::apply(router, state);
    let router = middleware::security_headers::apply(router);
    let router = middleware::http::apply(router, http);
    middleware::security_headers::apply_static(router)
}
