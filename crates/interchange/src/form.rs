//! Swap form orchestration.
//!
//! Binds the registries, wallet session and [`QuoteEngine`] together and
//! runs the simulated latency: amount recomputes are debounced on a tokio
//! timer and a submitted swap settles after a fixed delay. Methods that
//! arm timers must be called from within a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::chain::Chain;
use crate::engine::{Leg, QuoteEngine, QuoteStatus, Side};
use crate::error::Error;
use crate::price::QuoteOracle;
use crate::quote::{self, Quote};
use crate::store::AppStore;
use crate::token::Token;

/// State of the swap button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapAction {
    ConnectWallet,
    SelectTokens,
    EnterAmount,
    Swapping,
    SwapAcrossChains,
    Swap,
}

impl SwapAction {
    pub fn is_enabled(self) -> bool {
        matches!(self, SwapAction::SwapAcrossChains | SwapAction::Swap)
    }

    pub fn label(self) -> &'static str {
        match self {
            SwapAction::ConnectWallet => "Connect Wallet",
            SwapAction::SelectTokens => "Select Tokens",
            SwapAction::EnterAmount => "Enter Amount",
            SwapAction::Swapping => "Swapping...",
            SwapAction::SwapAcrossChains => "Swap Across Chains",
            SwapAction::Swap => "Swap",
        }
    }
}

/// What the form renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSnapshot {
    pub from: Leg,
    pub to: Leg,
    pub status: QuoteStatus,
    pub rate_label: Option<String>,
    pub bridge_fee: String,
    pub price_impact: String,
    /// Impact above 0.3 %, shown as a warning.
    pub high_price_impact: bool,
    pub cross_chain: bool,
    pub swapping: bool,
    pub recomputes: u64,
}

/// Outcome of a simulated swap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapReceipt {
    pub from_amount: String,
    pub from_symbol: String,
    pub from_chain: String,
    pub to_amount: String,
    pub to_symbol: String,
    pub to_chain: String,
    #[serde(with = "time::serde::rfc3339")]
    pub executed_at: OffsetDateTime,
}

impl SwapReceipt {
    pub fn summary(&self) -> String {
        format!(
            "Swap successful: {} {} ({}) to {} {} ({})",
            self.from_amount,
            self.from_symbol,
            self.from_chain,
            self.to_amount,
            self.to_symbol,
            self.to_chain
        )
    }

    pub fn executed_at_label(&self) -> Option<String> {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
        self.executed_at.format(&format).ok()
    }
}

struct FormState {
    engine: QuoteEngine,
    timer: Option<JoinHandle<()>>,
    swapping: bool,
}

impl FormState {
    fn snapshot(&self) -> FormSnapshot {
        let from = self.engine.leg(Side::From).clone();
        let to = self.engine.leg(Side::To).clone();
        let rate_label = match (self.engine.rate(), &from.token, &to.token) {
            (Some(rate), Some(from_token), Some(to_token)) => Some(format!(
                "1 {} = {} {}",
                from_token.symbol, rate, to_token.symbol
            )),
            _ => None,
        };
        FormSnapshot {
            status: self.engine.status(),
            rate_label,
            bridge_fee: quote::format_percent(self.engine.bridge_fee()),
            price_impact: quote::format_percent(self.engine.price_impact()),
            high_price_impact: quote::is_high_price_impact(self.engine.price_impact()),
            cross_chain: self.engine.is_cross_chain(),
            swapping: self.swapping,
            recomputes: self.engine.recomputes(),
            from,
            to,
        }
    }

    fn action(&self, wallet_connected: bool) -> SwapAction {
        let from = self.engine.leg(Side::From);
        let to = self.engine.leg(Side::To);
        if !wallet_connected {
            SwapAction::ConnectWallet
        } else if from.token.is_none() || to.token.is_none() {
            SwapAction::SelectTokens
        } else if from.amount.is_empty() || to.amount.is_empty() {
            SwapAction::EnterAmount
        } else if self.swapping || self.engine.status() == QuoteStatus::Computing {
            SwapAction::Swapping
        } else if self.engine.is_cross_chain() {
            SwapAction::SwapAcrossChains
        } else {
            SwapAction::Swap
        }
    }
}

/// Interactive swap form over an injected [`AppStore`].
pub struct SwapForm {
    store: Arc<AppStore>,
    state: Arc<Mutex<FormState>>,
    updates: Arc<watch::Sender<FormSnapshot>>,
    recompute_delay: Duration,
    swap_delay: Duration,
}

impl SwapForm {
    /// Preselect the default chain pair and the first token listed on each.
    pub fn new(store: Arc<AppStore>, oracle: Arc<dyn QuoteOracle>) -> Self {
        let mut engine = QuoteEngine::new(oracle);
        if let Some((from, to)) = store.chains().default_pair() {
            for (side, chain) in [(Side::From, from), (Side::To, to)] {
                engine.set_chain(side, chain.clone());
                let token = store.tokens().tokens_by_chain(chain.id).first().map(|t| (*t).clone());
                engine.set_token(side, token);
            }
        }

        let state = FormState {
            engine,
            timer: None,
            swapping: false,
        };
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            recompute_delay: store.settings().recompute_delay(),
            swap_delay: store.settings().swap_delay(),
            store,
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
        }
    }

    pub fn store(&self) -> &Arc<AppStore> {
        &self.store
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FormSnapshot> {
        self.updates.subscribe()
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn quote(&self) -> Option<Quote> {
        self.state.lock().await.engine.quote()
    }

    pub async fn action(&self) -> SwapAction {
        let connected = self.store.is_wallet_connected().await;
        self.state.lock().await.action(connected)
    }

    /// Select a chain for one side. The side's token is replaced by the
    /// chain's own listing of the same symbol, or its first token.
    pub async fn select_chain(&self, side: Side, chain_id: u32) -> Result<(), Error> {
        let chain = self
            .store
            .chains()
            .get(chain_id)
            .cloned()
            .ok_or_else(|| Error::Registry(format!("unknown chain id {chain_id}")))?;

        let mut state = self.state.lock().await;
        let current_symbol = state
            .engine
            .leg(side)
            .token
            .as_ref()
            .map(|t| t.symbol.clone());
        let token = self.token_for_chain(&chain, current_symbol.as_deref());

        debug!(?side, chain_id, token = ?token.as_ref().map(|t| &t.symbol), "chain selected");
        state.engine.set_chain(side, chain);
        state.engine.set_token(side, token);
        self.rearm(&mut state);
        self.publish(&state);
        Ok(())
    }

    /// Select a token by symbol from the side's current chain.
    pub async fn select_token(&self, side: Side, symbol: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let chain_id = state
            .engine
            .leg(side)
            .chain
            .as_ref()
            .map(|c| c.id)
            .ok_or_else(|| Error::Registry("no chain selected".to_string()))?;
        let token = self
            .store
            .tokens()
            .find(chain_id, symbol)
            .cloned()
            .ok_or_else(|| Error::Registry(format!("token {symbol} not listed on chain {chain_id}")))?;

        state.engine.set_token(side, Some(token));
        self.rearm(&mut state);
        self.publish(&state);
        Ok(())
    }

    /// Tokens offered by a side's selector, hiding the opposite side's token.
    pub async fn search_tokens(&self, side: Side, query: &str) -> Vec<Token> {
        let state = self.state.lock().await;
        let Some(chain) = &state.engine.leg(side).chain else {
            return Vec::new();
        };
        let exclude = state
            .engine
            .leg(side.opposite())
            .token
            .as_ref()
            .map(|t| t.symbol.as_str());
        self.store
            .tokens()
            .search(chain.id, query, exclude)
            .into_iter()
            .cloned()
            .collect()
    }

    /// A keystroke in one amount field; the opposite field follows after the debounce delay.
    pub async fn set_amount(&self, side: Side, text: &str) {
        let mut state = self.state.lock().await;
        state.engine.edit_amount(side, text);
        self.rearm(&mut state);
        self.publish(&state);
    }

    /// Swap both sides in one step. A pending recompute follows the typed amount.
    pub async fn invert(&self) {
        let mut state = self.state.lock().await;
        state.engine.invert();
        self.rearm(&mut state);
        self.publish(&state);
    }

    /// Re-read rate and bridge fee for the current selection.
    pub async fn refresh_pricing(&self) {
        let mut state = self.state.lock().await;
        state.engine.refresh_pricing();
        self.publish(&state);
    }

    /// Submit the swap. Settles after the configured delay and clears both amounts.
    pub async fn submit_swap(&self) -> Result<SwapReceipt, Error> {
        let connected = self.store.is_wallet_connected().await;
        let receipt = {
            let mut state = self.state.lock().await;
            let action = state.action(connected);
            if !action.is_enabled() {
                return Err(Error::SwapUnavailable(action.label().to_string()));
            }
            let receipt = receipt_for(&state.engine)
                .ok_or_else(|| Error::SwapUnavailable("incomplete form".to_string()))?;
            state.swapping = true;
            self.publish(&state);
            receipt
        };

        tokio::time::sleep(self.swap_delay).await;

        let mut state = self.state.lock().await;
        state.swapping = false;
        state.engine.clear_amounts();
        self.rearm(&mut state);
        self.publish(&state);

        let receipt = SwapReceipt {
            executed_at: OffsetDateTime::now_utc(),
            ..receipt
        };
        info!(summary = %receipt.summary(), "swap settled");
        Ok(receipt)
    }

    fn token_for_chain(&self, chain: &Chain, symbol: Option<&str>) -> Option<Token> {
        let tokens = self.store.tokens();
        symbol
            .and_then(|s| tokens.find(chain.id, s))
            .or_else(|| tokens.tokens_by_chain(chain.id).first().copied())
            .cloned()
    }

    /// Cancel any running timer and start one for the engine's pending request.
    fn rearm(&self, state: &mut FormState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let Some(request) = state.engine.pending().cloned() else {
            return;
        };

        let shared = self.state.clone();
        let updates = self.updates.clone();
        let delay = self.recompute_delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = shared.lock().await;
            state.engine.resolve(request.ticket);
            updates.send_replace(state.snapshot());
        }));
    }

    fn publish(&self, state: &FormState) {
        self.updates.send_replace(state.snapshot());
    }
}

fn receipt_for(engine: &QuoteEngine) -> Option<SwapReceipt> {
    let from = engine.leg(Side::From);
    let to = engine.leg(Side::To);
    Some(SwapReceipt {
        from_amount: from.amount.clone(),
        from_symbol: from.token.as_ref()?.symbol.clone(),
        from_chain: from.chain.as_ref()?.name.clone(),
        to_amount: to.amount.clone(),
        to_symbol: to.token.as_ref()?.symbol.clone(),
        to_chain: to.chain.as_ref()?.name.clone(),
        executed_at: OffsetDateTime::now_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::ConnectError;
    use crate::price::{FixedOracle, PriceTable};
    use crate::storage::{KeyValueStore, MemoryStore, CHAIN_ID_KEY, WALLET_ADDRESS_KEY};
    use crate::wallet::{BalanceClient, ChainInfo, SignerAdapter, WalletChainConfig, WalletSession};
    use async_trait::async_trait;
    use num_bigint::BigUint;
    use rust_decimal_macros::dec;

    struct NoBalance;

    #[async_trait]
    impl BalanceClient for NoBalance {
        async fn balance(
            &self,
            _config: &WalletChainConfig,
            _address: &str,
            _denom: &str,
        ) -> Result<BigUint, ConnectError> {
            Ok(BigUint::default())
        }
    }

    fn oracle() -> Arc<dyn QuoteOracle> {
        Arc::new(FixedOracle::new(PriceTable::builtin(), dec!(0.20), dec!(0.10)))
    }

    async fn form(connected: bool) -> SwapForm {
        let prefs = Arc::new(MemoryStore::new());
        if connected {
            prefs.set(WALLET_ADDRESS_KEY, "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu").unwrap();
            prefs.set(CHAIN_ID_KEY, "cosmoshub-4").unwrap();
        }
        let wallet = WalletSession::new(None, Arc::new(NoBalance), prefs.clone());
        let store = Arc::new(AppStore::init(Settings::default(), prefs, wallet));
        store.activate().await;
        SwapForm::new(store, oracle())
    }

    fn settle() -> tokio::time::Sleep {
        tokio::time::sleep(Duration::from_millis(600))
    }

    #[tokio::test(start_paused = true)]
    async fn test_defaults() {
        let form = form(false).await;
        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.from.chain.unwrap().name, "Cosmos Hub");
        assert_eq!(snapshot.to.chain.unwrap().name, "Osmosis");
        assert_eq!(snapshot.from.token.unwrap().symbol, "ATOM");
        assert_eq!(snapshot.to.token.unwrap().symbol, "OSMO");
        assert_eq!(snapshot.rate_label.as_deref(), Some("1 ATOM = 22.368421 OSMO"));
        assert_eq!(snapshot.bridge_fee, "0.20");
        assert!(snapshot.cross_chain);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recompute_after_delay() {
        let form = form(false).await;
        form.set_amount(Side::From, "10").await;

        let pending = form.snapshot().await;
        assert_eq!(pending.status, QuoteStatus::Computing);
        assert_eq!(pending.to.amount, "");

        settle().await;
        let done = form.snapshot().await;
        assert_eq!(done.status, QuoteStatus::Idle);
        assert_eq!(done.to.amount, "223.236842");
        assert_eq!(done.price_impact, "0.10");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_recompute_once() {
        let form = form(false).await;
        form.set_amount(Side::From, "1").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        form.set_amount(Side::From, "10").await;

        settle().await;
        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.recomputes, 1);
        assert_eq!(snapshot.to.amount, "223.236842");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_amount_leaves_no_timer() {
        let form = form(false).await;
        form.set_amount(Side::From, "10").await;
        form.set_amount(Side::From, "").await;

        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.to.amount, "");
        assert_eq!(snapshot.status, QuoteStatus::Idle);

        settle().await;
        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.to.amount, "");
        assert_eq!(snapshot.recomputes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_editing_destination_derives_source() {
        let form = form(false).await;
        form.set_amount(Side::To, "100").await;
        settle().await;
        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.from.amount, "4.479529");
        assert_eq!(snapshot.to.amount, "100");
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_chain_zero_fee() {
        let form = form(false).await;
        form.select_chain(Side::To, 1).await.unwrap();
        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.bridge_fee, "0.00");
        assert!(!snapshot.cross_chain);
        assert_eq!(snapshot.to.token.unwrap().symbol, "ATOM");
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_change_resets_token() {
        let form = form(false).await;
        form.select_chain(Side::To, 3).await.unwrap();
        assert_eq!(form.snapshot().await.to.token.unwrap().symbol, "JUNO");

        // ATOM is listed on Osmosis too, so the symbol is kept
        form.select_chain(Side::From, 2).await.unwrap();
        let from = form.snapshot().await.from.token.unwrap();
        assert_eq!(from.symbol, "ATOM");
        assert_eq!(from.chain_id, 2);

        assert!(matches!(
            form.select_chain(Side::From, 42).await,
            Err(Error::Registry(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_token_and_search() {
        let form = form(false).await;
        form.select_token(Side::To, "AXL").await.unwrap();
        assert_eq!(
            form.snapshot().await.rate_label.as_deref(),
            Some("1 ATOM = 17.000000 AXL")
        );
        assert!(form.select_token(Side::To, "JUNO").await.is_err());

        form.select_chain(Side::To, 1).await.unwrap();
        let offered: Vec<String> = form
            .search_tokens(Side::To, "")
            .await
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(offered, vec!["USDT", "USDC"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invert_twice() {
        let form = form(false).await;
        form.set_amount(Side::From, "10").await;
        settle().await;
        let before = form.snapshot().await;

        form.invert().await;
        let inverted = form.snapshot().await;
        assert_eq!(inverted.from, before.to);
        assert_eq!(inverted.to, before.from);

        form.invert().await;
        settle().await;
        let after = form.snapshot().await;
        assert_eq!(after.from, before.from);
        assert_eq!(after.to, before.to);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invert_while_computing_quotes_typed_amount() {
        let form = form(false).await;
        form.set_amount(Side::From, "10").await;
        form.invert().await;

        let pending = form.snapshot().await;
        assert_eq!(pending.status, QuoteStatus::Computing);
        assert_eq!(pending.to.amount, "10");
        assert_eq!(pending.to.token.unwrap().symbol, "ATOM");

        settle().await;
        let done = form.snapshot().await;
        assert_eq!(done.status, QuoteStatus::Idle);
        assert_eq!(done.to.amount, "10");
        assert_eq!(done.from.amount, "224.131579");
        assert_eq!(done.recomputes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_price_impact_flag() {
        let form = form(false).await;
        form.set_amount(Side::From, "10").await;
        settle().await;
        assert!(!form.snapshot().await.high_price_impact);

        let prefs = Arc::new(MemoryStore::new());
        let wallet = WalletSession::new(None, Arc::new(NoBalance), prefs.clone());
        let store = Arc::new(AppStore::init(Settings::default(), prefs, wallet));
        let oracle = Arc::new(FixedOracle::new(PriceTable::builtin(), dec!(0.20), dec!(0.45)));
        let form = SwapForm::new(store, oracle);
        form.set_amount(Side::From, "10").await;
        settle().await;
        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.price_impact, "0.45");
        assert!(snapshot.high_price_impact);
    }

    struct SlowSigner;

    #[async_trait]
    impl SignerAdapter for SlowSigner {
        async fn suggest_chain(&self, _info: &ChainInfo) -> Result<(), ConnectError> {
            Ok(())
        }

        async fn enable(&self, _chain_id: &str) -> Result<(), ConnectError> {
            // user leaves the approval prompt open
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn accounts(&self, _chain_id: &str) -> Result<Vec<String>, ConnectError> {
            Ok(vec!["cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu".to_string()])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_signer_approval_does_not_block_form() {
        let prefs = Arc::new(MemoryStore::new());
        let wallet = WalletSession::new(
            Some(Arc::new(SlowSigner)),
            Arc::new(NoBalance),
            prefs.clone(),
        );
        let store = Arc::new(AppStore::init(Settings::default(), prefs, wallet));
        store.activate().await;
        let form = SwapForm::new(store.clone(), oracle());

        let connecting = tokio::spawn({
            let store = store.clone();
            async move { store.connect("cosmoshub-4").await }
        });
        tokio::task::yield_now().await;

        let action = tokio::time::timeout(Duration::from_secs(10), form.action()).await;
        assert_eq!(action.unwrap(), SwapAction::ConnectWallet);
        let submitted = tokio::time::timeout(Duration::from_secs(10), form.submit_swap()).await;
        assert!(matches!(submitted.unwrap(), Err(Error::SwapUnavailable(_))));

        connecting.await.unwrap().unwrap();
        assert_eq!(form.action().await, SwapAction::EnterAmount);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_recompute() {
        let form = form(false).await;
        let mut rx = form.subscribe();
        form.set_amount(Side::From, "2").await;
        rx.borrow_and_update();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().to.amount, "44.647368");
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_states() {
        let disconnected = form(false).await;
        assert_eq!(disconnected.action().await, SwapAction::ConnectWallet);
        assert!(matches!(
            disconnected.submit_swap().await,
            Err(Error::SwapUnavailable(_))
        ));

        let form = form(true).await;
        assert_eq!(form.action().await, SwapAction::EnterAmount);
        form.set_amount(Side::From, "10").await;
        assert_eq!(form.action().await, SwapAction::EnterAmount);
        settle().await;
        assert_eq!(form.action().await, SwapAction::SwapAcrossChains);
        assert_eq!(SwapAction::SwapAcrossChains.label(), "Swap Across Chains");

        form.select_chain(Side::To, 1).await.unwrap();
        settle().await;
        assert_eq!(form.action().await, SwapAction::Swap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_swap() {
        let form = form(true).await;
        form.set_amount(Side::From, "10").await;
        settle().await;

        let receipt = form.submit_swap().await.unwrap();
        assert_eq!(
            receipt.summary(),
            "Swap successful: 10 ATOM (Cosmos Hub) to 223.236842 OSMO (Osmosis)"
        );
        assert!(receipt.executed_at_label().unwrap().ends_with("UTC"));

        let snapshot = form.snapshot().await;
        assert_eq!(snapshot.from.amount, "");
        assert_eq!(snapshot.to.amount, "");
        assert!(!snapshot.swapping);
        assert_eq!(form.action().await, SwapAction::EnterAmount);
    }
}
