use std::sync::Arc;

use crate::config::Config;
use crate::crypto::master_key::MasterKeyCache;
use crate::error::Result;
use crate::gateway::proxy::{ClientTransport, Gateway, Transport};
use crate::services::sync::SyncTracker;
use crate::store::{Cache, MemoryStore, RedisStore};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The local cache.
    pub store: Cache,
    /// The gateway behind `/api/proxy`.
    pub gateway: Arc<Gateway>,
    /// How the engine reaches the portal. The gateway itself, unless replaced in tests.
    pub transport: Arc<dyn Transport>,
    /// The master key cache.
    pub keys: MasterKeyCache,
    /// Progress of the running or last sync.
    pub sync: SyncTracker,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Uses Redis when `REDIS_URL` is configured, an in-process store otherwise.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Cache = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                tracing::info!("✅ Redis cache connected");
                Arc::new(store)
            }
            None => {
                tracing::warn!("REDIS_URL not set, cached data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let gateway = Arc::new(Gateway::new(config)?);
        tracing::info!(
            "✅ Gateway initialized for {} ({} requests / {}s)",
            config.portal_base_url,
            config.rate_limit_max_requests,
            config.rate_limit_window.as_secs()
        );

        Ok(Self::with_gateway(config.clone(), store, gateway))
    }

    fn with_gateway(config: Config, store: Cache, gateway: Arc<Gateway>) -> Self {
        let transport: Arc<dyn Transport> = gateway.clone();
        AppState {
            config,
            store,
            gateway,
            transport,
            keys: MasterKeyCache::new(),
            sync: SyncTracker::new(),
        }
    }

    /// The same state with portal calls rate-limited under `client` instead of the local key.
    pub fn for_client(&self, client: &str) -> Self {
        AppState {
            transport: Arc::new(ClientTransport::new(self.transport.clone(), client)),
            ..self.clone()
        }
    }

    /// Assembles a state around an explicit store and transport.
    pub fn from_parts(config: Config, store: Cache, transport: Arc<dyn Transport>) -> Result<Self> {
        let gateway = Arc::new(Gateway::new(&config)?);
        Ok(AppState {
            config,
            store,
            gateway,
            transport,
            keys: MasterKeyCache::new(),
            sync: SyncTracker::new(),
        })
    }
}
