pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod form;
pub mod price;
pub mod quote;
pub mod storage;
pub mod store;
pub mod token;
pub mod wallet;

use std::sync::Arc;

use error::Error;

// Re-exports for convenience
pub use chain::{Chain, ChainRegistry};
pub use config::Settings;
pub use engine::{Direction, QuoteEngine, QuoteStatus, Side};
pub use form::{FormSnapshot, SwapAction, SwapForm, SwapReceipt};
pub use price::{FixedOracle, PriceTable, QuoteOracle, SimulatedOracle};
pub use quote::Quote;
pub use store::{AppStore, Lifecycle};
pub use token::{Token, TokenRegistry};
pub use wallet::{BalanceClient, Connector, SignerAdapter, WalletSession};

/// Build an active store and a swap form from a settings file.
///
/// The form prices with a [`SimulatedOracle`] bounded by the loaded settings.
/// Must be called from within a tokio runtime.
pub async fn launch(
    settings_path: Option<&std::path::Path>,
    signer: Option<Arc<dyn SignerAdapter>>,
    balances: Arc<dyn BalanceClient>,
) -> Result<SwapForm, Error> {
    let settings = match settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let oracle: Arc<dyn QuoteOracle> = Arc::new(settings.simulated_oracle());
    let store = Arc::new(AppStore::from_settings(settings, signer, balances));
    store.activate().await;
    Ok(SwapForm::new(store, oracle))
}
