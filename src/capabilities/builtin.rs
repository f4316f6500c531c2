//! Built-in Smart Money capabilities.
//!
//! Four capabilities backed by the in-memory [`MarketStore`]. Their
//! registration order is the intent precedence: a query mentioning both
//! "price" and "wallet" resolves to `getMarketTrends`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::capability::{ArgSchema, Capability, CapabilityArgs, CapabilityHandler, HandlerError};
use super::registry::{CapabilityRegistry, RegistryError};
use crate::dispatch::args::{ArgExtractor, INSIGHT_TOPICS};
use crate::dispatch::intent::IntentPredicate;
use crate::storage::{MarketStore, Sentiment};

pub const MARKET_TRENDS: &str = "getMarketTrends";
pub const WALLET_INFO: &str = "getWalletInfo";
pub const TRANSACTION_INFO: &str = "getTransactionInfo";
pub const AI_INSIGHTS: &str = "getAIInsights";

const TOP_HOLDINGS: usize = 3;

/// The built-in capabilities in precedence order.
pub fn builtin_capabilities(store: Arc<MarketStore>) -> Vec<Capability> {
    vec![
        // Takes no arguments; its listed schema is empty.
        Capability::new(
            MARKET_TRENDS,
            "Current prices, 24h change and sentiment for tracked assets",
            Arc::new(MarketTrends {
                store: store.clone(),
            }),
        )
        .with_intent(IntentPredicate::any_of(["market", "trend", "price"])),
        Capability::new(
            WALLET_INFO,
            "Balance and top holdings for a wallet address",
            Arc::new(WalletInfo {
                store: store.clone(),
            }),
        )
        .with_intent(IntentPredicate::any_of(["wallet", "address", "balance"]))
        .with_extractor(ArgExtractor::Address)
        .with_arg(
            "address",
            ArgSchema::new("string")
                .required()
                .describe("0x-prefixed wallet address"),
        ),
        Capability::new(
            TRANSACTION_INFO,
            "Most recent whale transactions",
            Arc::new(TransactionInfo {
                store: store.clone(),
            }),
        )
        .with_intent(IntentPredicate::any_of(["transaction", "transfer", "sent", "received"]))
        .with_extractor(ArgExtractor::history())
        .with_arg(
            "limit",
            ArgSchema::new("integer").describe("Number of transactions to return"),
        ),
        Capability::new(
            AI_INSIGHTS,
            "Generated observations about prices, whales, market breadth and trend",
            Arc::new(AiInsights { store }),
        )
        .with_intent(IntentPredicate::any_of(["insight", "predict", "analysis", "ai"]))
        .with_extractor(ArgExtractor::insights())
        .with_arg("insights", insights_schema()),
    ]
}

/// Registry holding only the built-in capabilities.
pub fn builtin_registry(store: Arc<MarketStore>) -> Result<CapabilityRegistry, RegistryError> {
    Ok(CapabilityRegistry::builder()
        .register_all(builtin_capabilities(store))?
        .build())
}

fn insights_schema() -> ArgSchema {
    INSIGHT_TOPICS.iter().fold(
        ArgSchema::new("object").describe("Topics to cover"),
        |schema, topic| schema.property(*topic, ArgSchema::new("boolean")),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

struct MarketTrends {
    store: Arc<MarketStore>,
}

#[async_trait]
impl CapabilityHandler for MarketTrends {
    async fn run(&self, _args: &CapabilityArgs) -> Result<String, HandlerError> {
        let trends = self.store.trends();
        if trends.is_empty() {
            return Err(HandlerError::Unavailable("no market data loaded".into()));
        }

        let mut out = String::from("Market trends (24h):");
        for t in trends {
            out.push_str(&format!(
                "\n- {} ({}): {}, {} [{}]",
                t.symbol,
                t.name,
                usd(t.price_usd),
                pct(t.change_24h_pct),
                t.sentiment().as_str()
            ));
        }
        Ok(out)
    }
}

struct WalletInfo {
    store: Arc<MarketStore>,
}

#[async_trait]
impl CapabilityHandler for WalletInfo {
    async fn run(&self, args: &CapabilityArgs) -> Result<String, HandlerError> {
        let address = args
            .get("address")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| HandlerError::MissingArgument("address".into()))?;

        let wallet = match self.store.wallet(address) {
            Some(w) => w,
            None => return Ok(format!("No indexed activity found for wallet {}.", address)),
        };

        let mut holdings: Vec<_> = wallet.holdings.iter().collect();
        holdings.sort_by(|a, b| b.value_usd.total_cmp(&a.value_usd));

        let mut out = format!(
            "Wallet {} ({})\nBalance: {}\nTop holdings:",
            wallet.address,
            wallet.label,
            usd(wallet.balance_usd())
        );
        for h in holdings.into_iter().take(TOP_HOLDINGS) {
            out.push_str(&format!("\n- {} {} ({})", h.amount, h.symbol, usd(h.value_usd)));
        }
        out.push_str(&format!(
            "\nLast active: {}",
            wallet.last_active.format("%Y-%m-%d %H:%M UTC")
        ));
        Ok(out)
    }
}

struct TransactionInfo {
    store: Arc<MarketStore>,
}

#[async_trait]
impl CapabilityHandler for TransactionInfo {
    async fn run(&self, args: &CapabilityArgs) -> Result<String, HandlerError> {
        let limit = match args.get("limit") {
            None | Some(Value::Null) => 10,
            Some(v) => v.as_u64().ok_or_else(|| HandlerError::InvalidArgument {
                name: "limit".into(),
                reason: "expected a non-negative integer".into(),
            })?,
        };
        if limit == 0 {
            return Err(HandlerError::InvalidArgument {
                name: "limit".into(),
                reason: "must be at least 1".into(),
            });
        }

        let txs = self.store.recent_transactions(limit as usize);
        if txs.is_empty() {
            return Ok("No whale transactions recorded yet.".to_string());
        }

        let mut out = format!("Latest {} whale transactions:", txs.len());
        for tx in txs {
            out.push_str(&format!(
                "\n- {} {} ({}) {} -> {} [{}] at {}",
                tx.amount,
                tx.symbol,
                usd(tx.value_usd),
                short_address(&tx.from),
                short_address(&tx.to),
                tx.kind.label(),
                tx.timestamp.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        Ok(out)
    }
}

struct AiInsights {
    store: Arc<MarketStore>,
}

impl AiInsights {
    fn insight(&self, topic: &str) -> Option<String> {
        let trends = self.store.trends();
        match topic {
            "price" => {
                let best = trends
                    .iter()
                    .max_by(|a, b| a.change_24h_pct.total_cmp(&b.change_24h_pct))?;
                let worst = trends
                    .iter()
                    .min_by(|a, b| a.change_24h_pct.total_cmp(&b.change_24h_pct))?;
                Some(format!(
                    "Price: {} leads at {} over 24h while {} lags at {}.",
                    best.symbol,
                    pct(best.change_24h_pct),
                    worst.symbol,
                    pct(worst.change_24h_pct)
                ))
            }
            "whale" => {
                let net = self.store.net_exchange_flow_usd();
                let reading = if net > 0.0 {
                    "net exchange inflow, a sign of sell pressure"
                } else if net < 0.0 {
                    "net exchange outflow, a sign of accumulation"
                } else {
                    "balanced exchange flows"
                };
                Some(format!("Whales: {} of {}.", reading, usd(net.abs())))
            }
            "market" => {
                if trends.is_empty() {
                    return None;
                }
                let count = |s: Sentiment| trends.iter().filter(|t| t.sentiment() == s).count();
                Some(format!(
                    "Market: {} of {} tracked assets are bullish, {} bearish.",
                    count(Sentiment::Bullish),
                    trends.len(),
                    count(Sentiment::Bearish)
                ))
            }
            "trend" => {
                if trends.is_empty() {
                    return None;
                }
                let avg = trends.iter().map(|t| t.change_24h_pct).sum::<f64>() / trends.len() as f64;
                Some(format!(
                    "Trend: overall momentum is {} (average 24h change {}).",
                    Sentiment::from_change(avg).as_str(),
                    pct(avg)
                ))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl CapabilityHandler for AiInsights {
    async fn run(&self, args: &CapabilityArgs) -> Result<String, HandlerError> {
        let flags = args.get("insights").and_then(Value::as_object);
        let requested: Vec<&str> = INSIGHT_TOPICS
            .iter()
            .copied()
            .filter(|t| {
                flags
                    .and_then(|f| f.get(*t))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .collect();

        let (header, topics) = if requested.is_empty() {
            ("AI market overview:", INSIGHT_TOPICS.to_vec())
        } else {
            ("AI insights:", requested)
        };

        let lines: Vec<String> = topics.iter().filter_map(|t| self.insight(t)).collect();
        if lines.is_empty() {
            return Err(HandlerError::Unavailable("no market data loaded".into()));
        }

        let mut out = String::from(header);
        for line in lines {
            out.push_str("\n- ");
            out.push_str(&line);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `$1,234.56`
fn usd(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

fn pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

fn short_address(address: &str) -> String {
    match (address.get(..6), address.get(address.len().saturating_sub(4)..)) {
        (Some(head), Some(tail)) if address.len() > 12 => format!("{}…{}", head, tail),
        _ => address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn registry() -> CapabilityRegistry {
        builtin_registry(Arc::new(MarketStore::seeded(Utc::now()))).unwrap()
    }

    async fn run(name: &str, text: &str) -> Result<String, HandlerError> {
        let reg = registry();
        let cap = reg.get(name).unwrap();
        cap.run(&cap.extractor.extract(text)).await
    }

    #[test]
    fn test_registration_order() {
        assert_eq!(
            registry().names(),
            vec![MARKET_TRENDS, WALLET_INFO, TRANSACTION_INFO, AI_INSIGHTS]
        );
    }

    #[test]
    fn test_argument_schemas() {
        let reg = registry();
        assert!(reg.get(MARKET_TRENDS).unwrap().descriptor().args_schema.is_empty());
        assert!(reg.get(WALLET_INFO).unwrap().args_schema["address"].required);
        assert_eq!(reg.get(TRANSACTION_INFO).unwrap().args_schema["limit"].arg_type, "integer");
        let insights = &reg.get(AI_INSIGHTS).unwrap().args_schema["insights"];
        assert_eq!(insights.properties.len(), 4);
    }

    #[test]
    fn test_usd_formatting() {
        assert_eq!(usd(0.0), "$0.00");
        assert_eq!(usd(999.5), "$999.50");
        assert_eq!(usd(67_420.15), "$67,420.15");
        assert_eq!(usd(20_900_246.5), "$20,900,246.50");
        assert_eq!(usd(-1_000.0), "-$1,000.00");
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0x28C6c06298d514Db089934071355E5743bf21d60"),
            "0x28C6…1d60"
        );
        assert_eq!(short_address("0xABCDEF1234"), "0xABCDEF1234");
    }

    #[tokio::test]
    async fn test_market_trends_lists_assets() {
        let out = run(MARKET_TRENDS, "market update").await.unwrap();
        assert!(out.starts_with("Market trends (24h):"));
        assert!(out.contains("- BTC (Bitcoin): $67,420.15, +3.42% [bullish]"));
        assert!(out.contains("- SOL (Solana): $172.34, -4.15% [bearish]"));
        assert!(out.contains("- LINK (Chainlink): $17.92, +0.64% [neutral]"));
    }

    #[tokio::test]
    async fn test_wallet_known_address() {
        let out = run(WALLET_INFO, "wallet balance for 0xABCDEF1234").await.unwrap();
        assert!(out.starts_with("Wallet 0xABCDEF1234 (Demo wallet)"));
        assert!(out.contains("Balance: $67,507.05"));
        assert!(out.contains("- 12.5 ETH ($43,910.00)"));
    }

    #[tokio::test]
    async fn test_wallet_unknown_address() {
        let out = run(WALLET_INFO, "balance of 0xdeadbeef").await.unwrap();
        assert_eq!(out, "No indexed activity found for wallet 0xdeadbeef.");
    }

    #[tokio::test]
    async fn test_wallet_without_address_fails() {
        let err = run(WALLET_INFO, "what's my wallet balance?").await.unwrap_err();
        assert_eq!(err, HandlerError::MissingArgument("address".into()));
    }

    #[tokio::test]
    async fn test_transactions_respect_limit() {
        let recent = run(TRANSACTION_INFO, "recent transactions").await.unwrap();
        assert!(recent.starts_with("Latest 5 whale transactions:"));
        assert_eq!(recent.lines().count(), 6);

        let default = run(TRANSACTION_INFO, "show transactions").await.unwrap();
        assert!(default.starts_with("Latest 10 whale transactions:"));
    }

    #[tokio::test]
    async fn test_transactions_reject_bad_limit() {
        let reg = registry();
        let cap = reg.get(TRANSACTION_INFO).unwrap();
        let mut args = CapabilityArgs::new();
        args.insert("limit".into(), json!(0));
        assert!(matches!(
            cap.run(&args).await,
            Err(HandlerError::InvalidArgument { .. })
        ));
        args.insert("limit".into(), json!("five"));
        assert!(cap.run(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_insights_follow_flags() {
        let out = run(AI_INSIGHTS, "ai analysis of whale flows").await.unwrap();
        assert!(out.starts_with("AI insights:"));
        assert!(out.contains("Whales:"));
        assert!(!out.contains("Price:"));
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_insights_overview_when_unflagged() {
        let out = run(AI_INSIGHTS, "give me an insight").await.unwrap();
        assert!(out.starts_with("AI market overview:"));
        assert!(out.contains("Price: BTC leads at +3.42%"));
        assert!(out.contains("Market: 1 of 4 tracked assets are bullish, 1 bearish."));
        assert_eq!(out.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_empty_store_reports_unavailable() {
        let reg = builtin_registry(Arc::new(MarketStore::default())).unwrap();
        let cap = reg.get(MARKET_TRENDS).unwrap();
        assert!(matches!(
            cap.run(&CapabilityArgs::new()).await,
            Err(HandlerError::Unavailable(_))
        ));
    }
}
