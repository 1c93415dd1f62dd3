//! Parley application composition root
//!
//! Wires the Remote Store and Inference Gateway chosen by configuration
//! into a single [`ConversationManager`].

use std::sync::Arc;

use parley_common::{Config, StoreProvider};
use parley_conversations::{
    ConversationManager, ConversationStore, ConversationsRepositories, MockConversationStore,
};
use parley_gateway::{GatewayConfig, GatewayFactory, InferenceGateway};
use sqlx::PgPool;

/// Open the Remote Store selected by `STORE_PROVIDER`
pub async fn create_store(config: &Config) -> Result<Arc<dyn ConversationStore>, anyhow::Error> {
    match config.store_provider {
        StoreProvider::Postgres => {
            let database_url = config.database_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("DATABASE_URL is required when STORE_PROVIDER=postgres")
            })?;
            let pool = PgPool::connect(database_url)
                .await
                .map_err(|e| anyhow::anyhow!("Database connection failed: {}", e))?;

            tracing::info!("Database connection established");
            Ok(Arc::new(ConversationsRepositories::new(pool)))
        }
        StoreProvider::Mock => {
            tracing::info!("Using in-memory conversation store");
            Ok(Arc::new(MockConversationStore::new()))
        }
    }
}

/// Build the conversation manager from application and gateway configuration
pub async fn create_manager(
    config: &Config,
    gateway_config: GatewayConfig,
) -> Result<ConversationManager, anyhow::Error> {
    let store = create_store(config).await?;

    tracing::info!(
        provider = %gateway_config.provider,
        base_url = %gateway_config.base_url,
        "Creating inference gateway"
    );
    let gateway: Arc<dyn InferenceGateway> = Arc::from(GatewayFactory::create(gateway_config)?);

    if config.user_id.is_none() {
        tracing::warn!("PARLEY_USER_ID not set; thread listing and creation are disabled");
    }

    Ok(ConversationManager::new(store, gateway, config.user_id))
}
