//! Wallet session backed by an injected signer extension.
//!
//! The signer itself is out of process; this module only drives the
//! suggest-chain / enable / accounts / balance sequence and mirrors the
//! session into local preferences.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::ConnectError;
use crate::storage::{KeyValueStore, CHAIN_ID_KEY, WALLET_ADDRESS_KEY};

/// Decimals of every stake/fee currency the adapter registers.
const COIN_DECIMALS: u8 = 6;
/// BIP-44 coin type shared by Cosmos SDK chains.
const COSMOS_COIN_TYPE: u32 = 118;

/// Signer-side configuration for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletChainConfig {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc: String,
    pub rest: String,
    pub stake_currency: String,
    pub bech32_prefix: String,
    pub fee_currencies: Vec<String>,
}

/// Chains the signer adapter knows how to register.
#[derive(Debug, Clone)]
pub struct WalletChainTable {
    configs: HashMap<String, WalletChainConfig>,
}

impl WalletChainTable {
    pub fn new(configs: Vec<WalletChainConfig>) -> Self {
        Self {
            configs: configs
                .into_iter()
                .map(|c| (c.chain_id.clone(), c))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            WalletChainConfig {
                chain_id: "cosmoshub-4".to_string(),
                chain_name: "Cosmos Hub".to_string(),
                rpc: "https://cosmos-rpc.polkachu.com".to_string(),
                rest: "https://rest.cosmos.directory/cosmoshub".to_string(),
                stake_currency: "uatom".to_string(),
                bech32_prefix: "cosmos".to_string(),
                fee_currencies: vec!["uatom".to_string()],
            },
            WalletChainConfig {
                chain_id: "osmosis-1".to_string(),
                chain_name: "Osmosis".to_string(),
                rpc: "https://osmosis-rpc.polkachu.com".to_string(),
                rest: "https://rest.cosmos.directory/osmosis".to_string(),
                stake_currency: "uosmo".to_string(),
                bech32_prefix: "osmo".to_string(),
                fee_currencies: vec!["uosmo".to_string()],
            },
        ])
    }

    pub fn get(&self, chain_id: &str) -> Option<&WalletChainConfig> {
        self.configs.get(chain_id)
    }
}

impl Default for WalletChainTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub coin_denom: String,
    pub coin_minimal_denom: String,
    pub coin_decimals: u8,
}

impl Currency {
    fn from_denom(denom: &str) -> Self {
        Self {
            coin_denom: denom.to_uppercase(),
            coin_minimal_denom: denom.to_string(),
            coin_decimals: COIN_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44 {
    pub coin_type: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bech32Config {
    #[serde(rename = "bech32PrefixAccAddr")]
    pub acc_addr: String,
    #[serde(rename = "bech32PrefixAccPub")]
    pub acc_pub: String,
    #[serde(rename = "bech32PrefixValAddr")]
    pub val_addr: String,
    #[serde(rename = "bech32PrefixValPub")]
    pub val_pub: String,
    #[serde(rename = "bech32PrefixConsAddr")]
    pub cons_addr: String,
    #[serde(rename = "bech32PrefixConsPub")]
    pub cons_pub: String,
}

impl Bech32Config {
    fn from_prefix(prefix: &str) -> Self {
        Self {
            acc_addr: prefix.to_string(),
            acc_pub: format!("{prefix}pub"),
            val_addr: format!("{prefix}valoper"),
            val_pub: format!("{prefix}valoperpub"),
            cons_addr: format!("{prefix}valcons"),
            cons_pub: format!("{prefix}valconspub"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasPriceStep {
    pub low: f64,
    pub average: f64,
    pub high: f64,
}

/// Chain registration payload handed to the signer before enabling it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc: String,
    pub rest: String,
    pub stake_currency: Currency,
    pub bip44: Bip44,
    pub bech32_config: Bech32Config,
    pub currencies: Vec<Currency>,
    pub fee_currencies: Vec<Currency>,
    pub coin_type: u32,
    pub gas_price_step: GasPriceStep,
}

impl ChainInfo {
    pub fn from_config(config: &WalletChainConfig) -> Self {
        let fee_currencies: Vec<Currency> = config
            .fee_currencies
            .iter()
            .map(|denom| Currency::from_denom(denom))
            .collect();
        Self {
            chain_id: config.chain_id.clone(),
            chain_name: config.chain_name.clone(),
            rpc: config.rpc.clone(),
            rest: config.rest.clone(),
            stake_currency: Currency::from_denom(&config.stake_currency),
            bip44: Bip44 {
                coin_type: COSMOS_COIN_TYPE,
            },
            bech32_config: Bech32Config::from_prefix(&config.bech32_prefix),
            currencies: fee_currencies.clone(),
            fee_currencies,
            coin_type: COSMOS_COIN_TYPE,
            gas_price_step: GasPriceStep {
                low: 0.01,
                average: 0.025,
                high: 0.04,
            },
        }
    }
}

/// Browser-injected signer extension.
#[async_trait]
pub trait SignerAdapter: Send + Sync {
    /// Register (or re-register) a chain with the signer.
    async fn suggest_chain(&self, info: &ChainInfo) -> Result<(), ConnectError>;

    /// Ask the user to authorize this site for the chain.
    async fn enable(&self, chain_id: &str) -> Result<(), ConnectError>;

    /// Accounts exposed by the offline signer, primary first.
    async fn accounts(&self, chain_id: &str) -> Result<Vec<String>, ConnectError>;
}

/// Balance lookup against a chain endpoint. Amounts are in the minimal denomination.
#[async_trait]
pub trait BalanceClient: Send + Sync {
    async fn balance(
        &self,
        config: &WalletChainConfig,
        address: &str,
        denom: &str,
    ) -> Result<BigUint, ConnectError>;
}

/// Bank-module balance query over the chain's LCD (`rest`) endpoint.
///
/// The Tendermint `rpc` endpoint only answers protobuf `abci_query`; the LCD
/// serves the same bank query as JSON.
#[cfg(feature = "lcd-balance")]
pub struct LcdBalanceClient {
    client: reqwest::Client,
}

#[cfg(feature = "lcd-balance")]
impl LcdBalanceClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "lcd-balance")]
impl Default for LcdBalanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "lcd-balance")]
#[derive(serde::Deserialize)]
struct BalanceResponse {
    balance: Option<Coin>,
}

#[cfg(feature = "lcd-balance")]
#[derive(serde::Deserialize)]
struct Coin {
    amount: String,
}

#[cfg(feature = "lcd-balance")]
#[async_trait]
impl BalanceClient for LcdBalanceClient {
    async fn balance(
        &self,
        config: &WalletChainConfig,
        address: &str,
        denom: &str,
    ) -> Result<BigUint, ConnectError> {
        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{address}/by_denom",
            config.rest.trim_end_matches('/')
        );
        let response: BalanceResponse = self
            .client
            .get(&url)
            .query(&[("denom", denom)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ConnectError::NetworkFailure(e.to_string()))?
            .json()
            .await
            .map_err(|e| ConnectError::NetworkFailure(e.to_string()))?;

        match response.balance {
            Some(coin) => coin.amount.parse::<BigUint>().map_err(|e| {
                ConnectError::NetworkFailure(format!("invalid balance amount: {e}"))
            }),
            None => Ok(BigUint::default()),
        }
    }
}

/// Signer and balance handles cloned out of a [`WalletSession`].
#[derive(Clone)]
pub struct Connector {
    signer: Option<Arc<dyn SignerAdapter>>,
    balances: Arc<dyn BalanceClient>,
    chains: WalletChainTable,
}

impl Connector {
    /// Run suggest-chain, enable, accounts and the balance query. No timeout:
    /// a pending signer approval keeps this future pending.
    pub async fn connect(&self, chain_id: &str) -> Result<SessionState, ConnectError> {
        match self.try_connect(chain_id).await {
            Ok(state) => {
                info!(chain_id, address = ?state.address, "wallet connected");
                Ok(state)
            }
            Err(e) => {
                error!(chain_id, error = %e, "failed to connect wallet");
                Err(e)
            }
        }
    }

    async fn try_connect(&self, chain_id: &str) -> Result<SessionState, ConnectError> {
        let signer = self.signer.as_ref().ok_or(ConnectError::SignerUnavailable)?;
        let config = self
            .chains
            .get(chain_id)
            .ok_or_else(|| ConnectError::UnsupportedChain(chain_id.to_string()))?;

        signer.suggest_chain(&ChainInfo::from_config(config)).await?;
        signer.enable(&config.chain_id).await?;

        let address = signer
            .accounts(&config.chain_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ConnectError::NetworkFailure("signer returned no accounts".to_string()))?;

        let amount = self
            .balances
            .balance(config, &address, &config.stake_currency)
            .await?;

        Ok(SessionState {
            connected: true,
            balance: Some(format_balance(&amount, &config.stake_currency)),
            address: Some(address),
            chain_id: Some(config.chain_id.clone()),
        })
    }
}

/// Observable session fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub connected: bool,
    pub address: Option<String>,
    pub balance: Option<String>,
    pub chain_id: Option<String>,
}

/// Wallet connection state and the only real I/O in the interface.
pub struct WalletSession {
    signer: Option<Arc<dyn SignerAdapter>>,
    balances: Arc<dyn BalanceClient>,
    chains: WalletChainTable,
    store: Arc<dyn KeyValueStore>,
    state: SessionState,
}

impl WalletSession {
    /// `signer` is `None` when no compatible extension was detected.
    pub fn new(
        signer: Option<Arc<dyn SignerAdapter>>,
        balances: Arc<dyn BalanceClient>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            signer,
            balances,
            chains: WalletChainTable::builtin(),
            store,
            state: SessionState::default(),
        }
    }

    pub fn with_chains(mut self, chains: WalletChainTable) -> Self {
        self.chains = chains;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    /// `cosmos...wxyz` style display of the address.
    pub fn short_address(&self) -> Option<String> {
        self.state.address.as_deref().map(short_address)
    }

    /// Mark the session connected when both persisted keys are present.
    /// The signer is not consulted and the balance stays unknown.
    pub fn restore(&mut self) {
        let address = self.read_pref(WALLET_ADDRESS_KEY);
        let chain_id = self.read_pref(CHAIN_ID_KEY);
        if let (Some(address), Some(chain_id)) = (address, chain_id) {
            info!(%address, %chain_id, "restored wallet session");
            self.state = SessionState {
                connected: true,
                address: Some(address),
                balance: None,
                chain_id: Some(chain_id),
            };
        }
    }

    /// Connect to `chain_id` through the signer. On failure the session is
    /// left as it was and the error is returned to the caller.
    pub async fn connect(&mut self, chain_id: &str) -> Result<(), ConnectError> {
        let state = self.connector().connect(chain_id).await?;
        self.commit(state);
        Ok(())
    }

    /// Detached handle for a connect attempt that must not hold the session.
    pub fn connector(&self) -> Connector {
        Connector {
            signer: self.signer.clone(),
            balances: self.balances.clone(),
            chains: self.chains.clone(),
        }
    }

    /// Adopt a state produced by [`Connector::connect`] and persist it.
    pub fn commit(&mut self, state: SessionState) {
        self.persist(&state);
        self.state = state;
    }

    /// Clear the session and both persisted keys. Never fails.
    pub fn disconnect(&mut self) {
        self.state = SessionState::default();
        for key in [WALLET_ADDRESS_KEY, CHAIN_ID_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear wallet preference");
            }
        }
    }

    fn persist(&self, state: &SessionState) {
        let entries = [
            (WALLET_ADDRESS_KEY, state.address.as_deref()),
            (CHAIN_ID_KEY, state.chain_id.as_deref()),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                if let Err(e) = self.store.set(key, value) {
                    warn!(key, error = %e, "failed to persist wallet preference");
                }
            }
        }
    }

    fn read_pref(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "failed to read wallet preference");
                None
            }
        }
    }
}

/// First six and last four characters, joined by `...`.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// `1234567` `uatom` → `1.234567 UATOM`
pub fn format_balance(amount: &BigUint, denom: &str) -> String {
    format!(
        "{} {}",
        format_fixed(amount, COIN_DECIMALS),
        denom.to_uppercase()
    )
}

/// Render a minimal-denomination integer with exactly `decimals` fraction digits.
fn format_fixed(amount: &BigUint, decimals: u8) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return s;
    }
    if s.len() <= decimals {
        let mut result = String::from("0.");
        result.extend(std::iter::repeat_n('0', decimals - s.len()));
        result.push_str(&s);
        return result;
    }
    let (integer_part, decimal_part) = s.split_at(s.len() - decimals);
    format!("{integer_part}.{decimal_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSigner {
        suggested: Mutex<Vec<ChainInfo>>,
        reject_enable: bool,
    }

    #[async_trait]
    impl SignerAdapter for MockSigner {
        async fn suggest_chain(&self, info: &ChainInfo) -> Result<(), ConnectError> {
            self.suggested.lock().unwrap().push(info.clone());
            Ok(())
        }

        async fn enable(&self, _chain_id: &str) -> Result<(), ConnectError> {
            if self.reject_enable {
                return Err(ConnectError::NetworkFailure("request rejected".to_string()));
            }
            Ok(())
        }

        async fn accounts(&self, chain_id: &str) -> Result<Vec<String>, ConnectError> {
            let prefix = if chain_id == "osmosis-1" { "osmo" } else { "cosmos" };
            Ok(vec![format!("{prefix}1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu")])
        }
    }

    struct FixedBalance(u64);

    #[async_trait]
    impl BalanceClient for FixedBalance {
        async fn balance(
            &self,
            _config: &WalletChainConfig,
            _address: &str,
            _denom: &str,
        ) -> Result<BigUint, ConnectError> {
            Ok(BigUint::from(self.0))
        }
    }

    struct FailingBalance;

    #[async_trait]
    impl BalanceClient for FailingBalance {
        async fn balance(
            &self,
            _config: &WalletChainConfig,
            _address: &str,
            _denom: &str,
        ) -> Result<BigUint, ConnectError> {
            Err(ConnectError::NetworkFailure("rpc unreachable".to_string()))
        }
    }

    fn session(signer: Option<Arc<dyn SignerAdapter>>) -> (WalletSession, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let session = WalletSession::new(signer, Arc::new(FixedBalance(1_500_000)), store.clone());
        (session, store)
    }

    #[tokio::test]
    async fn test_connect_populates_and_persists() {
        let signer = Arc::new(MockSigner::default());
        let (mut session, store) = session(Some(signer.clone()));

        session.connect("cosmoshub-4").await.unwrap();

        let state = session.state();
        assert!(state.connected);
        assert_eq!(state.chain_id.as_deref(), Some("cosmoshub-4"));
        assert_eq!(state.balance.as_deref(), Some("1.500000 UATOM"));
        assert_eq!(
            store.get(WALLET_ADDRESS_KEY).unwrap(),
            state.address.clone()
        );
        assert_eq!(store.get(CHAIN_ID_KEY).unwrap().as_deref(), Some("cosmoshub-4"));
        assert_eq!(session.short_address().as_deref(), Some("cosmos...v7xu"));

        let suggested = signer.suggested.lock().unwrap();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].bech32_config.val_addr, "cosmosvaloper");
        assert_eq!(suggested[0].stake_currency.coin_denom, "UATOM");
    }

    #[tokio::test]
    async fn test_connect_without_signer() {
        let (mut session, store) = session(None);
        let err = session.connect("cosmoshub-4").await.unwrap_err();
        assert_eq!(err, ConnectError::SignerUnavailable);
        assert!(!session.is_connected());
        assert_eq!(store.get(WALLET_ADDRESS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_connect_unsupported_chain() {
        let (mut session, _) = session(Some(Arc::new(MockSigner::default())));
        let err = session.connect("juno-1").await.unwrap_err();
        assert_eq!(err, ConnectError::UnsupportedChain("juno-1".to_string()));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_network_failures() {
        let signer = Arc::new(MockSigner {
            reject_enable: true,
            ..Default::default()
        });
        let (mut session, _) = session(Some(signer));
        let err = session.connect("osmosis-1").await.unwrap_err();
        assert!(matches!(err, ConnectError::NetworkFailure(_)));

        let store = Arc::new(MemoryStore::new());
        let mut session = WalletSession::new(
            Some(Arc::new(MockSigner::default())),
            Arc::new(FailingBalance),
            store,
        );
        let err = session.connect("osmosis-1").await.unwrap_err();
        assert!(matches!(err, ConnectError::NetworkFailure(_)));
        assert_eq!(session.state(), &SessionState::default());
    }

    #[tokio::test]
    async fn test_disconnect_clears_everything() {
        let (mut session, store) = session(Some(Arc::new(MockSigner::default())));
        session.connect("osmosis-1").await.unwrap();
        session.disconnect();
        assert_eq!(session.state(), &SessionState::default());
        assert_eq!(store.get(WALLET_ADDRESS_KEY).unwrap(), None);
        assert_eq!(store.get(CHAIN_ID_KEY).unwrap(), None);
    }

    #[test]
    fn test_restore_requires_both_keys() {
        let (mut session, store) = session(None);
        store.set(WALLET_ADDRESS_KEY, "cosmos1abc").unwrap();
        session.restore();
        assert!(!session.is_connected());

        store.set(CHAIN_ID_KEY, "cosmoshub-4").unwrap();
        session.restore();
        assert!(session.is_connected());
        assert_eq!(session.state().address.as_deref(), Some("cosmos1abc"));
        assert_eq!(session.state().balance, None);
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("cosmos1abcdefghijklmnop"), "cosmos...mnop");
        assert_eq!(short_address("short"), "short");
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(&BigUint::from(1_234_567u64), "uatom"), "1.234567 UATOM");
        assert_eq!(format_balance(&BigUint::from(42u64), "uosmo"), "0.000042 UOSMO");
        assert_eq!(format_balance(&BigUint::default(), "uosmo"), "0.000000 UOSMO");
    }
}
