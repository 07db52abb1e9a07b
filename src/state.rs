use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    ledger::VoteLedger,
    notifier::ChangeNotifier,
    store::{EntityStore, MemoryStore, RedisStore},
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EntityStore>,
    pub notifier: Arc<ChangeNotifier>,
    pub ledger: VoteLedger,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store: Arc<dyn EntityStore> = match config.store_backend.as_str() {
            "redis" => {
                info!("Using redis store at {}", config.redis_url);
                Arc::new(
                    RedisStore::connect(&config.redis_url)
                        .await
                        .expect("Redis misconfigured!"),
                )
            }
            "memory" => Arc::new(MemoryStore::new()),
            other => {
                warn!("Unknown STORE_BACKEND '{other}', falling back to memory");
                Arc::new(MemoryStore::new())
            }
        };

        let notifier = Arc::new(ChangeNotifier::new());
        let ledger = VoteLedger::new(store.clone(), notifier.clone());

        Arc::new(Self {
            config,
            store,
            notifier,
            ledger,
        })
    }
}
