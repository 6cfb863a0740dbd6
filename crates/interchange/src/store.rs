use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chain::{Chain, ChainRegistry};
use crate::config::Settings;
use crate::error::ConnectError;
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, CHAIN_ID_KEY};
use crate::token::TokenRegistry;
use crate::wallet::{BalanceClient, SignerAdapter, WalletSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Registries loaded, session not yet restored.
    Initialized,
    Active,
    TornDown,
}

struct StoreState {
    lifecycle: Lifecycle,
    current_chain_id: Option<u32>,
}

/// Application store handed to the swap form: static registries, the
/// header's current chain, and the wallet session.
pub struct AppStore {
    settings: Settings,
    chains: ChainRegistry,
    tokens: TokenRegistry,
    prefs: Arc<dyn KeyValueStore>,
    state: Mutex<StoreState>,
    wallet: Mutex<WalletSession>,
}

impl AppStore {
    /// Load the built-in registries and restore the current chain preference.
    pub fn init(settings: Settings, prefs: Arc<dyn KeyValueStore>, wallet: WalletSession) -> Self {
        Self::with_registries(
            settings,
            ChainRegistry::builtin(),
            TokenRegistry::builtin(),
            prefs,
            wallet,
        )
    }

    pub fn with_registries(
        settings: Settings,
        chains: ChainRegistry,
        tokens: TokenRegistry,
        prefs: Arc<dyn KeyValueStore>,
        wallet: WalletSession,
    ) -> Self {
        let current_chain_id = restore_chain_id(&settings, &chains, prefs.as_ref());
        Self {
            settings,
            chains,
            tokens,
            prefs,
            state: Mutex::new(StoreState {
                lifecycle: Lifecycle::Initialized,
                current_chain_id,
            }),
            wallet: Mutex::new(wallet),
        }
    }

    /// Build a store from settings: preferences go to `storage_path` when set.
    pub fn from_settings(
        settings: Settings,
        signer: Option<Arc<dyn SignerAdapter>>,
        balances: Arc<dyn BalanceClient>,
    ) -> Self {
        let prefs: Arc<dyn KeyValueStore> = match &settings.storage_path {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        let wallet = WalletSession::new(signer, balances, prefs.clone());
        Self::init(settings, prefs, wallet)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn wallet(&self) -> &Mutex<WalletSession> {
        &self.wallet
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.state.lock().await.lifecycle
    }

    /// Restore the wallet session from preferences and start serving reads/writes.
    pub async fn activate(&self) {
        let mut state = self.state.lock().await;
        if state.lifecycle != Lifecycle::Initialized {
            return;
        }
        self.wallet.lock().await.restore();
        state.lifecycle = Lifecycle::Active;
    }

    /// Disconnect the wallet. No other persisted state is touched.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        self.wallet.lock().await.disconnect();
        state.lifecycle = Lifecycle::TornDown;
    }

    /// Connect the wallet. The session lock is only taken to start and to
    /// commit, so readers are never held up by a pending signer approval.
    pub async fn connect(&self, chain_id: &str) -> Result<(), ConnectError> {
        let connector = self.wallet.lock().await.connector();
        let state = connector.connect(chain_id).await?;
        self.wallet.lock().await.commit(state);
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.wallet.lock().await.disconnect();
    }

    pub async fn is_wallet_connected(&self) -> bool {
        self.wallet.lock().await.is_connected()
    }

    pub async fn current_chain(&self) -> Option<Chain> {
        let id = self.state.lock().await.current_chain_id?;
        self.chains.get(id).cloned()
    }

    /// Select the header chain and remember it. Unknown ids are ignored.
    pub async fn switch_chain(&self, chain_id: u32) -> bool {
        let Some(chain) = self.chains.get(chain_id) else {
            warn!(chain_id, "ignoring switch to unknown chain");
            return false;
        };
        self.state.lock().await.current_chain_id = Some(chain.id);
        if let Err(e) = self.prefs.set(CHAIN_ID_KEY, &chain.id.to_string()) {
            warn!(chain_id, error = %e, "failed to persist chain preference");
        }
        info!(chain_id, chain = %chain.name, "switched chain");
        true
    }
}

/// Stored id if it parses and is known, else the configured default, else the first chain.
fn restore_chain_id(
    settings: &Settings,
    chains: &ChainRegistry,
    prefs: &dyn KeyValueStore,
) -> Option<u32> {
    let saved = match prefs.get(CHAIN_ID_KEY) {
        Ok(value) => value.and_then(|v| v.trim().parse::<u32>().ok()),
        Err(e) => {
            warn!(error = %e, "failed to read chain preference");
            None
        }
    };
    saved
        .filter(|id| chains.contains(*id))
        .or_else(|| Some(settings.default_chain_id).filter(|id| chains.contains(*id)))
        .or_else(|| chains.first().map(|c| c.id))
}
