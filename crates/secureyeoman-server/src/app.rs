//! Router assembly and the serve loop.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use secureyeoman_core::{YeomanError, YeomanResult};
use secureyeoman_storage::SurrealKvStore;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::middleware::require_auth;
use crate::routes;
use crate::state::{AppState, build_state};

/// Build the full router: public auth + webhook sinks, token-protected
/// everything else, all under `/api/v1` (webhook sinks stay at the root).
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/v1/auth/login", post(routes::auth::login))
        .route("/api/v1/auth/refresh", post(routes::auth::refresh))
        // Platform signatures authenticate webhook sinks.
        .route(
            "/webhooks/{platform}/{id}",
            post(routes::integrations::webhook_sink),
        );

    let protected: Router<AppState> = Router::new()
        // Auth management
        .route("/api/v1/auth/logout", post(routes::auth::logout))
//         .route(
//             "/api/v1/auth/api-keys",
//             get(routes::auth::list_api_keys).post(routes::auth::create_api_key),
//         )
//         // Audit
//         .route("/api/v1/audit", get(routes::audit::query))
//         .route("/api/v1/audit/verify", post(routes::audit::verify))
//         // Soul
//         .route(
//             "/api/v1/soul/personalities",
//             get(routes::soul::list_personalities).post(routes::soul::create_personality),
//         )
//         .route(
//             "/api/v1/soul/personalities/{id}",
//             get(routes::soul::get_personality)
//                 .put(routes::soul::update_personality)
//                 .delete(routes::soul::delete_personality),
//         )
//         .route(
//             "/api/v1/soul/personalities/{id}/activate",
//             post(routes::soul::activate_personality),
//         )
//         .route("/api/v1/soul/personality", get(routes::soul::active_personality))
//         .route(
//             "/api/v1/soul/skills",
//             get(routes::soul::list_skills).post(routes::soul::create_skill),
//         )
//         .route(
//             "/api/v1/soul/skills/{id}",
//             delete(routes::soul::delete_skill),
//         )
//         .route(
//             "/api/v1/soul/skills/{id}/{action}",
//             post(routes::soul::skill_action),
//         )
//         .route("/api/v1/soul/prompt/preview", get(routes::soul::prompt_preview))
//         .route(
//             "/api/v1/soul/onboarding/status",
//             get(routes::soul::onboarding_status),
//         )
//         .route(
//             "/api/v1/soul/onboarding/complete",
//             post(routes::soul::onboarding_complete),
//         )
//         // Brain
//         .route(
//             "/api/v1/brain/memories",
//             get(routes::brain::list_memories).post(routes::brain::create_memory),
//         )
//         .route(
//             "/api/v1/brain/memories/{id}",
//             delete(routes::brain::delete_memory),
//         )
//         .route("/api/v1/brain/knowledge", get(routes::brain::list_knowledge))
//         .route("/api/v1/brain/stats", get(routes::brain::stats))
//         .route(
//             "/api/v1/brain/search/similar",
//             post(routes::brain::search_similar),
//         )
//         .route(
//             "/api/v1/brain/consolidation/run",
//             post(routes::brain::run_consolidation),
//         )
//         .route("/api/v1/brain/reindex", post(routes::brain::reindex))
//         // Model
//         .route("/api/v1/model/info", get(routes::model::info))
//         .route("/api/v1/model/switch", post(routes::model::switch))
//         .route(
//             "/api/v1/model/default",
//             get(routes::model::get_default)
//                 .post(routes::model::switch)
//                 .delete(routes::model::clear_default),
//         )
//         .route("/api/v1/model/route", post(routes::model::route))
//         .route(
//             "/api/v1/model/cost-recommendations",
//             get(routes::model::cost_recommendations),
//         )
//         // Extensions
//         .route(
//             "/api/v1/extensions",
//             get(routes::extensions::list_extensions).post(routes::extensions::create_extension),
//         )
//         .route(
//             "/api/v1/extensions/hooks",
//             get(routes::extensions::list_hooks),
//         )
//         .route(
//             "/api/v1/extensions/hooks/test",
//             post(routes::extensions::test_hook),
//         )
//         .route(
//             "/api/v1/extensions/webhooks",
//             get(routes::extensions::list_webhooks).post(routes::extensions::create_webhook),
//         )
//         .route(
//             "/api/v1/extensions/webhooks/{id}",
//             delete(routes::extensions::delete_webhook),
//         )
//         .route(
//             "/api/v1/extensions/discover",
//             post(routes::extensions::discover),
//         )
//         .route(
//             "/api/v1/extensions/{id}",
//             get(routes::extensions::get_extension).delete(routes::extensions::delete_extension),
//         )
//         // Roles
//         .route(
//             "/api/v1/roles",
//             get(routes::roles::list_roles).post(routes::roles::create_role),
//         )
//         .route("/api/v1/roles/{id}", delete(routes::roles::delete_role))
//         // Tasks
//         .route(
//             "/api/v1/tasks",
//             get(routes::tasks::list_tasks).post(routes::tasks::submit),
//         )
//         .route("/api/v1/tasks/{id}", get(routes::tasks::get_task))
//         .route("/api/v1/tasks/{id}/cancel", post(routes::tasks::cancel_task))
//         // Integrations
//         .route(
//             "/api/v1/integrations",
//             get(routes::integrations::list_integrations)
//                 .post(routes::integrations::create_integration),
//         )
//         .route(
//             "/api/v1/integrations/{id}",
//             get(routes::integrations::get_integration)
//                 .put(routes::integrations::update_integration)
//                 .delete(routes::integrations::delete_integration),
//         )
//         .route(
//             "/api/v1/integrations/{id}/status",
//             get(routes::integrations::integration_status),
//         )
        .layer(from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open durable storage, assemble state, and serve until ctrl-c.
///
/// # Errors
///
/// Returns an error if storage, state assembly, or the listener fails.
pub async fn serve(config: Config) -> YeomanResult<()> {
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| YeomanError::storage(e.to_string()))?;
    let kv = Arc::new(
        SurrealKvStore::open(config.data_dir.join("kv"))
            .map_err(|e| YeomanError::storage(e.to_string()))?,
    );

    let bind_addr = config.bind_addr.clone();
    let state = build_state(config, kv, false).await?;

    // Background loops: the consolidation minute tick and rate-limiter
    // counter cleanup.
    let (shutdown_tx, _) = broadcast::channel(1);
    tokio::spawn(
        Arc::clone(&state.consolidation).run_schedule(shutdown_tx.subscribe()),
    );
    {
        let limiter = Arc::clone(state.auth.rate_limiter());
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = tick.tick() => {
                        let _ = limiter.cleanup();
                    }
                }
            }
        });
    }

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| YeomanError::internal(format!("bind failed: {e}")))?;
    info!(addr = %bind_addr, "SecureYeoman gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(());
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| YeomanError::internal(e.to_string()))
}
