use std::sync::Arc;

use anyhow::Context;

use orderdesk_infra::{
    seed_demo_accounts, IdentityDirectory, InMemoryIdentityDirectory, InMemoryOrderStore,
    OrderLifecycle, OrderStore, PostgresOrderStore,
};

use crate::config::ApiConfig;

pub type DynOrderStore = Arc<dyn OrderStore>;

/// Shared application services, injected into handlers as an `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub lifecycle: OrderLifecycle<DynOrderStore>,
    pub identity: Arc<dyn IdentityDirectory>,
}

impl AppServices {
    pub fn new(store: DynOrderStore, identity: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(store),
            identity,
        }
    }
}

/// Wire stores per configuration and seed the demo accounts.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: DynOrderStore = if config.use_persistent_stores {
        let url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is required for persistent stores")?;
        let store = PostgresOrderStore::connect(url)
            .await
            .context("failed to connect the Postgres order store")?;
        tracing::info!("using Postgres order store");
        Arc::new(store)
    } else {
        tracing::info!("using in-memory order store");
        Arc::new(InMemoryOrderStore::new())
    };

    let identity: Arc<dyn IdentityDirectory> = Arc::new(InMemoryIdentityDirectory::new());
    if config.seed_demo_accounts {
        let seeded = seed_demo_accounts(identity.as_ref())
            .await
            .context("failed to seed demo accounts")?;
        tracing::info!(accounts = seeded.len(), "demo accounts ready");
    }

    Ok(AppServices::new(store, identity))
}
