use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use agora_shared::middleware::{cors_layer, metrics_middleware, OriginAllowList};
use agora_shared::types::auth::TokenIssuer;

use crate::avatar::{AvatarStore, LocalAvatarStore};
use crate::routes;
use crate::services::accounts::AccountService;
use crate::services::aggregation::ContentAggregator;
use crate::services::policy::SocialPolicy;
use crate::store::SocialStore;

/// Room for the text fields that travel next to an avatar.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SocialStore>,
    pub policy: SocialPolicy,
    pub aggregator: ContentAggregator,
    pub accounts: AccountService,
    pub tokens: TokenIssuer,
    pub max_avatar_bytes: usize,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SocialStore>,
        avatars: Arc<dyn AvatarStore>,
        tokens: TokenIssuer,
        max_avatar_bytes: usize,
    ) -> Self {
        Self {
            policy: SocialPolicy::new(store.clone()),
            aggregator: ContentAggregator::new(store.clone()),
            accounts: AccountService::new(store.clone(), avatars, tokens.clone()),
            store,
            tokens,
            max_avatar_bytes,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

pub struct RouterOptions {
    pub cors: OriginAllowList,
    /// Served under its public path when avatars live on local disk.
    pub uploads: Option<LocalAvatarStore>,
}

pub fn build_router(state: AppState, options: RouterOptions) -> Router {
    let avatar_limit = DefaultBodyLimit::max(state.max_avatar_bytes + MULTIPART_OVERHEAD);

    let api = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/users/current", get(routes::users::current))
        .route("/users/:id", get(routes::users::get_user))
        .route("/users/:id", put(routes::users::update_user).layer(avatar_limit))
        .route("/posts", post(routes::posts::create_post).get(routes::posts::feed))
        .route("/posts/:id", get(routes::posts::get_post).delete(routes::posts::delete_post))
        .route("/comments", post(routes::comments::create_comment))
        .route("/comments/:id", delete(routes::comments::delete_comment))
        .route("/likes", post(routes::likes::like_post))
        .route("/likes/:id", delete(routes::likes::unlike_post))
        .route("/follow", post(routes::follows::follow_user))
        .route("/follow/:id", get(routes::follows::follow_status))
        .route("/unfollow/:id", delete(routes::follows::unfollow_user));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .nest("/api", api);

    if let Some(uploads) = options.uploads {
        tracing::info!(dir = %uploads.dir().display(), path = uploads.public_path(), "serving local avatars");
        app = app.nest_service(uploads.public_path(), ServeDir::new(uploads.dir()));
    }

    app.fallback(routes::not_found)
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(cors_layer(options.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
