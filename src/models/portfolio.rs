//! Portfolio positions and the statistics derived from them.
//!
//! Daily change is backed out from each asset's 24h percentage change:
//! `previous = value / (1 + change / 100)`. An asset whose change is -100%
//! or lower has no defined previous value; it still counts towards the total
//! value but is left out of the daily change and of the percentage base.

use crate::error::{ComputationError, ComputationResult};
use crate::models::CoinPrice;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount of a coin held, as configured by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub coin_id: String,
    pub amount: f64,
}

impl Holding {
    pub fn new(coin_id: impl Into<String>, amount: f64) -> Self {
        Self {
            coin_id: coin_id.into(),
            amount,
        }
    }
}

/// A held asset priced at the current market rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPosition {
    pub id: String,
    pub name: String,

    /// Upper-case ticker symbol
    pub symbol: String,

    /// Price per unit in USD
    pub price: f64,

    /// Percentage change over the last 24 hours
    pub change_24h: f64,

    /// Units held
    pub holdings: f64,
}

impl AssetPosition {
    /// Build a position from a market quote. A missing 24h change counts as 0%.
    pub fn from_price(price: &CoinPrice, holdings: f64) -> Self {
        Self {
            id: price.id.clone(),
            name: price.name.clone(),
            symbol: price.display_symbol(),
            price: price.current_price,
            change_24h: price.price_change_percentage_24h.unwrap_or(0.0),
            holdings,
        }
    }

    /// Current value of the position in USD.
    pub fn value(&self) -> f64 {
        self.price * self.holdings
    }

    /// Value 24 hours ago, or `None` when the change is -100% or lower.
    pub fn previous_value(&self) -> Option<f64> {
        let factor = 1.0 + self.change_24h / 100.0;
        if factor > 0.0 {
            Some(self.value() / factor)
        } else {
            None
        }
    }

    /// Static positions shown when no market data can be obtained.
    pub fn placeholder_portfolio() -> Vec<Self> {
        vec![
            AssetPosition {
                id: "bitcoin".to_string(),
                name: "Bitcoin".to_string(),
                symbol: "BTC".to_string(),
                price: 45000.0,
                change_24h: 2.5,
                holdings: 0.5,
            },
            AssetPosition {
                id: "ethereum".to_string(),
                name: "Ethereum".to_string(),
                symbol: "ETH".to_string(),
                price: 3200.0,
                change_24h: -1.2,
                holdings: 2.0,
            },
            AssetPosition {
                id: "cardano".to_string(),
                name: "Cardano".to_string(),
                symbol: "ADA".to_string(),
                price: 1.25,
                change_24h: 5.8,
                holdings: 1000.0,
            },
        ]
    }

    fn validate(&self) -> ComputationResult<()> {
        let checks = [
            ("price", self.price, true),
            ("holdings", self.holdings, true),
            ("24h change", self.change_24h, false),
        ];

        for (field, value, non_negative) in checks {
            if !value.is_finite() || (non_negative && value < 0.0) {
                return Err(ComputationError::InvalidInput {
                    asset: self.id.clone(),
                    field,
                    value,
                });
            }
        }

        Ok(())
    }
}

/// The asset with the best 24h performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPerformer {
    pub id: String,
    pub symbol: String,
    pub change_24h: f64,
}

/// Totals over a set of positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_value: f64,

    /// Value gained or lost over the last 24 hours
    pub daily_change: f64,

    /// Daily change relative to the value 24 hours ago; `None` when that base is not positive
    pub daily_percentage: Option<f64>,

    pub asset_count: usize,

    pub best_performer: Option<BestPerformer>,

    /// Ids of assets left out of the daily change because their previous value is undefined
    pub excluded_from_change: Vec<String>,
}

/// Compute totals, daily change and best performer for `positions`.
pub fn summarize(positions: &[AssetPosition]) -> ComputationResult<PortfolioSummary> {
    let mut total_value = 0.0;
    let mut daily_change = 0.0;
    let mut previous_total = 0.0;
    let mut excluded_from_change = Vec::new();
    let mut best_performer: Option<&AssetPosition> = None;

    for position in positions {
        position.validate()?;

        let value = position.value();
        total_value += value;

        match position.previous_value() {
            Some(previous) => {
                daily_change += value - previous;
                previous_total += previous;
            }
            None => {
                tracing::debug!(
                    asset = %position.id,
                    change_24h = position.change_24h,
                    "Previous value undefined, excluding from daily change"
                );
                excluded_from_change.push(position.id.clone());
            }
        }

        if best_performer.map_or(true, |best| position.change_24h > best.change_24h) {
            best_performer = Some(position);
        }
    }

    if !total_value.is_finite() {
        return Err(ComputationError::NonFiniteResult("total value"));
    }
    if !daily_change.is_finite() || !previous_total.is_finite() {
        return Err(ComputationError::NonFiniteResult("daily change"));
    }

    let daily_percentage = if previous_total > 0.0 {
        Some(daily_change / previous_total * 100.0)
    } else {
        None
    };

    Ok(PortfolioSummary {
        total_value,
        daily_change,
        daily_percentage,
        asset_count: positions.len(),
        best_performer: best_performer.map(|p| BestPerformer {
            id: p.id.clone(),
            symbol: p.symbol.clone(),
            change_24h: p.change_24h,
        }),
        excluded_from_change,
    })
}

/// Format an amount as US dollars with thousands separators, e.g. `$28,900.00`.
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Format a signed percentage, e.g. `+1.66%`; `n/a` when undefined.
pub fn format_percent(percentage: Option<f64>) -> String {
    match percentage {
        Some(p) if p >= 0.0 => format!("+{:.2}%", p),
        Some(p) => format!("{:.2}%", p),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total value:    {}", format_usd(self.total_value))?;
        writeln!(
            f,
            "24h change:     {} ({})",
            format_usd(self.daily_change),
            format_percent(self.daily_percentage)
        )?;
        writeln!(f, "Active assets:  {}", self.asset_count)?;
        match &self.best_performer {
            Some(best) => write!(
                f,
                "Best performer: {} ({})",
                best.symbol,
                format_percent(Some(best.change_24h))
            ),
            None => write!(f, "Best performer: n/a"),
        }
    }
}
