use serde::{Deserialize, Serialize};

/// Token catalog entry. `balance` is a static display value, not a ledger read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "chainId")]
    pub chain_id: u32,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub balance: String,
}

impl Token {
    fn new(chain_id: u32, address: &str, name: &str, symbol: &str, balance: &str) -> Self {
        Self {
            chain_id,
            address: address.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: 6,
            balance: balance.to_string(),
        }
    }

    /// Key into the price table.
    pub fn price_key(&self) -> &str {
        &self.symbol
    }

    fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query) || self.symbol.to_lowercase().contains(query)
    }
}

/// Read-only token catalog keyed by chain id.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Mock catalog for the built-in chains.
    pub fn builtin() -> Self {
        Self::new(vec![
            Token::new(1, "cosmos1...", "Cosmos", "ATOM", "10.5"),
            Token::new(1, "cosmos1...", "Tether USD", "USDT", "100.00"),
            Token::new(1, "cosmos1...", "USD Coin", "USDC", "250.00"),
            Token::new(2, "osmo1...", "Osmosis", "OSMO", "75.25"),
            Token::new(2, "osmo1...", "Cosmos", "ATOM", "5.5"),
            Token::new(2, "osmo1...", "Axelar", "AXL", "120.00"),
            Token::new(3, "juno1...", "Juno", "JUNO", "30.00"),
            Token::new(3, "juno1...", "Neta", "NETA", "0.5"),
            Token::new(4, "secret1...", "Secret", "SCRT", "45.00"),
            Token::new(5, "akash1...", "Akash", "AKT", "100.00"),
            Token::new(6, "stars1...", "Stargaze", "STARS", "1000.00"),
        ])
    }

    pub fn all(&self) -> &[Token] {
        &self.tokens
    }

    /// Tokens listed on a chain, in catalog order.
    pub fn tokens_by_chain(&self, chain_id: u32) -> Vec<&Token> {
        self.tokens.iter().filter(|t| t.chain_id == chain_id).collect()
    }

    pub fn find(&self, chain_id: u32, symbol: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.chain_id == chain_id && t.symbol == symbol)
    }

    /// Selector search: case-insensitive match on name or symbol, hiding the
    /// token already picked on the opposite side.
    pub fn search(&self, chain_id: u32, query: &str, exclude_symbol: Option<&str>) -> Vec<&Token> {
        let query = query.trim().to_lowercase();
        self.tokens_by_chain(chain_id)
            .into_iter()
            .filter(|t| query.is_empty() || t.matches(&query))
            .filter(|t| exclude_symbol != Some(t.symbol.as_str()))
            .collect()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
