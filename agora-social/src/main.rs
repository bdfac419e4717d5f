use std::sync::Arc;

use agora_shared::clients::db::create_pool;
use agora_shared::clients::object_store::ObjectStorage;
use agora_shared::errors::set_expose_details;
use agora_shared::middleware::{init_metrics, init_tracing, OriginAllowList};
use agora_shared::types::auth::TokenIssuer;

use agora_social::avatar::{AvatarStore, InlineAvatarStore, LocalAvatarStore, S3AvatarStore};
use agora_social::config::{AppConfig, AvatarBackend, StorageBackend};
use agora_social::store::{MemoryStore, PgStore, SocialStore};
use agora_social::{build_router, AppState, RouterOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing("agora-social", config.is_production());
    set_expose_details(!config.is_production());

    let metrics = init_metrics()?;

    let store: Arc<dyn SocialStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let mut uploads = None;
    let avatars: Arc<dyn AvatarStore> = match config.avatar_backend {
        AvatarBackend::Inline => Arc::new(InlineAvatarStore),
        AvatarBackend::Local => {
            let local = LocalAvatarStore::new(&config.upload_dir, &config.upload_public_path);
            uploads = Some(local.clone());
            Arc::new(local)
        }
        AvatarBackend::S3 => {
            let storage = ObjectStorage::new(
                &config.s3_endpoint,
                &config.s3_access_key,
                &config.s3_secret_key,
                &config.s3_bucket,
                &config.s3_public_url,
            )
            .await;
            Arc::new(S3AvatarStore::new(storage))
        }
    };
    tracing::info!(backend = avatars.backend(), "avatar store ready");

    let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_ttl_secs);
    let state = AppState::new(store, avatars, tokens, config.max_avatar_bytes).with_metrics(metrics);

    let app = build_router(
        state,
        RouterOptions {
            cors: OriginAllowList::new(config.cors_origins()),
            uploads,
        },
    );

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(addr = %addr, environment = ?config.environment, "agora-social starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
