//! In-memory market data store.
//!
//! Backs the built-in capability handlers with a seeded, read-only data set
//! of tracked assets, labelled wallets, and recent whale transactions.
//! The store is built once at startup and shared through an `Arc`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Market sentiment derived from 24h price movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Neutral,
    Bearish,
}

impl Sentiment {
    /// Moves of more than 2% either way are directional.
    pub fn from_change(change_24h_pct: f64) -> Self {
        if change_24h_pct > 2.0 {
            Sentiment::Bullish
        } else if change_24h_pct < -2.0 {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Neutral => "neutral",
            Sentiment::Bearish => "bearish",
        }
    }
}

/// A tracked asset's current market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTrend {
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub change_24h_pct: f64,
    pub volume_24h_usd: f64,
}

impl AssetTrend {
    pub fn sentiment(&self) -> Sentiment {
        Sentiment::from_change(self.change_24h_pct)
    }
}

/// A single asset position inside a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub amount: f64,
    pub value_usd: f64,
}

/// A labelled wallet the tracker follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletProfile {
    pub address: String,
    pub label: String,
    pub holdings: Vec<Holding>,
    pub last_active: DateTime<Utc>,
}

impl WalletProfile {
    pub fn balance_usd(&self) -> f64 {
        self.holdings.iter().map(|h| h.value_usd).sum()
    }
}

/// Direction of a transfer relative to exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    ExchangeInflow,
    ExchangeOutflow,
    WalletToWallet,
}

impl TransferKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransferKind::ExchangeInflow => "exchange inflow",
            TransferKind::ExchangeOutflow => "exchange outflow",
            TransferKind::WalletToWallet => "wallet to wallet",
        }
    }
}

/// A large on-chain transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleTransaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub symbol: String,
    pub amount: f64,
    pub value_usd: f64,
    pub kind: TransferKind,
    pub timestamp: DateTime<Utc>,
}

/// Read-only market data set.
#[derive(Debug, Clone, Default)]
pub struct MarketStore {
    trends: Vec<AssetTrend>,
    wallets: Vec<WalletProfile>,
    /// Newest first.
    transactions: Vec<WhaleTransaction>,
}

impl MarketStore {
    pub fn new(
        trends: Vec<AssetTrend>,
        wallets: Vec<WalletProfile>,
        mut transactions: Vec<WhaleTransaction>,
    ) -> Self {
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self {
            trends,
            wallets,
            transactions,
        }
    }

    /// Store pre-populated with the tracker's demo data set, timestamped
    /// relative to `now`.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let trends = vec![
            trend("BTC", "Bitcoin", 67_420.15, 3.42, 28_400_000_000.0),
            trend("ETH", "Ethereum", 3_512.80, 1.87, 14_900_000_000.0),
            trend("SOL", "Solana", 172.34, -4.15, 3_100_000_000.0),
            trend("LINK", "Chainlink", 17.92, 0.64, 610_000_000.0),
        ];

        let wallets = vec![
            WalletProfile {
                address: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                label: "Exchange hot wallet".into(),
                holdings: vec![
                    holding("ETH", 182_340.0, 640_536_940.0),
                    holding("LINK", 2_100_000.0, 37_632_000.0),
                ],
                last_active: now - Duration::minutes(4),
            },
            WalletProfile {
                address: "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B".into(),
                label: "Early Ethereum whale".into(),
                holdings: vec![
                    holding("ETH", 12_500.0, 43_910_000.0),
                    holding("SOL", 40_000.0, 6_893_600.0),
                ],
                last_active: now - Duration::hours(6),
            },
            WalletProfile {
                address: "0xABCDEF1234".into(),
                label: "Demo wallet".into(),
                holdings: vec![
                    holding("ETH", 12.5, 43_910.0),
                    holding("BTC", 0.35, 23_597.05),
                ],
                last_active: now - Duration::days(2),
            },
        ];

        let transactions = vec![
            WhaleTransaction {
                hash: "0x9f1c0d3e7a".into(),
                from: "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B".into(),
                to: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                symbol: "ETH".into(),
                amount: 4_200.0,
                value_usd: 14_753_760.0,
                kind: TransferKind::ExchangeInflow,
                timestamp: now - Duration::minutes(12),
            },
            WhaleTransaction {
                hash: "0x41be77a0c2".into(),
                from: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                to: "0x5a52E96BAcdaBb82fd05763E25335261B270Efcb".into(),
                symbol: "BTC".into(),
                amount: 310.0,
                value_usd: 20_900_246.5,
                kind: TransferKind::ExchangeOutflow,
                timestamp: now - Duration::minutes(37),
            },
            WhaleTransaction {
                hash: "0x7d3a19ef05".into(),
                from: "0x3f5CE5FBFe3E9af3971dD833D26bA9b5C936f0bE".into(),
                to: "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B".into(),
                symbol: "SOL".into(),
                amount: 95_000.0,
                value_usd: 16_372_300.0,
                kind: TransferKind::WalletToWallet,
                timestamp: now - Duration::hours(1),
            },
            WhaleTransaction {
                hash: "0xc08e5b6d14".into(),
                from: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".into(),
                to: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                symbol: "LINK".into(),
                amount: 1_450_000.0,
                value_usd: 25_984_000.0,
                kind: TransferKind::ExchangeInflow,
                timestamp: now - Duration::hours(2),
            },
            WhaleTransaction {
                hash: "0x2aa4f3c977".into(),
                from: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                to: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".into(),
                symbol: "ETH".into(),
                amount: 9_800.0,
                value_usd: 34_425_440.0,
                kind: TransferKind::ExchangeOutflow,
                timestamp: now - Duration::hours(3),
            },
            WhaleTransaction {
                hash: "0xe51f8820ab".into(),
                from: "0x5a52E96BAcdaBb82fd05763E25335261B270Efcb".into(),
                to: "0x3f5CE5FBFe3E9af3971dD833D26bA9b5C936f0bE".into(),
                symbol: "BTC".into(),
                amount: 125.0,
                value_usd: 8_427_518.75,
                kind: TransferKind::WalletToWallet,
                timestamp: now - Duration::hours(5),
            },
            WhaleTransaction {
                hash: "0x63d2b7f018".into(),
                from: "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B".into(),
                to: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".into(),
                symbol: "ETH".into(),
                amount: 1_500.0,
                value_usd: 5_269_200.0,
                kind: TransferKind::WalletToWallet,
                timestamp: now - Duration::hours(8),
            },
            WhaleTransaction {
                hash: "0xb9c46e2d5f".into(),
                from: "0x3f5CE5FBFe3E9af3971dD833D26bA9b5C936f0bE".into(),
                to: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                symbol: "SOL".into(),
                amount: 60_000.0,
                value_usd: 10_340_400.0,
                kind: TransferKind::ExchangeInflow,
                timestamp: now - Duration::hours(11),
            },
            WhaleTransaction {
                hash: "0x0fe7a5d3c1".into(),
                from: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                to: "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B".into(),
                symbol: "BTC".into(),
                amount: 200.0,
                value_usd: 13_484_030.0,
                kind: TransferKind::ExchangeOutflow,
                timestamp: now - Duration::hours(16),
            },
            WhaleTransaction {
                hash: "0x8c1d9b47e6".into(),
                from: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".into(),
                to: "0x5a52E96BAcdaBb82fd05763E25335261B270Efcb".into(),
                symbol: "LINK".into(),
                amount: 800_000.0,
                value_usd: 14_336_000.0,
                kind: TransferKind::WalletToWallet,
                timestamp: now - Duration::hours(20),
            },
            WhaleTransaction {
                hash: "0x5e2f0a8b93".into(),
                from: "0x5a52E96BAcdaBb82fd05763E25335261B270Efcb".into(),
                to: "0x28C6c06298d514Db089934071355E5743bf21d60".into(),
                symbol: "ETH".into(),
                amount: 3_000.0,
                value_usd: 10_538_400.0,
                kind: TransferKind::ExchangeInflow,
                timestamp: now - Duration::hours(27),
            },
        ];

        Self::new(trends, wallets, transactions)
    }

    pub fn trends(&self) -> &[AssetTrend] {
        &self.trends
    }

    /// Case-insensitive lookup; addresses are hex so checksum casing is ignored.
    pub fn wallet(&self, address: &str) -> Option<&WalletProfile> {
        self.wallets
            .iter()
            .find(|w| w.address.eq_ignore_ascii_case(address))
    }

    /// Up to `limit` transactions, newest first.
    pub fn recent_transactions(&self, limit: usize) -> &[WhaleTransaction] {
        &self.transactions[..limit.min(self.transactions.len())]
    }

    /// Net USD flowing into exchanges across all stored transactions.
    /// Positive means more inflow (sell pressure) than outflow.
    pub fn net_exchange_flow_usd(&self) -> f64 {
        self.transactions
            .iter()
            .map(|tx| match tx.kind {
                TransferKind::ExchangeInflow => tx.value_usd,
                TransferKind::ExchangeOutflow => -tx.value_usd,
                TransferKind::WalletToWallet => 0.0,
            })
            .sum()
    }
}

fn trend(symbol: &str, name: &str, price: f64, change: f64, volume: f64) -> AssetTrend {
    AssetTrend {
        symbol: symbol.into(),
        name: name.into(),
        price_usd: price,
        change_24h_pct: change,
        volume_24h_usd: volume,
    }
}

fn holding(symbol: &str, amount: f64, value_usd: f64) -> Holding {
    Holding {
        symbol: symbol.into(),
        amount,
        value_usd,
    }
}
