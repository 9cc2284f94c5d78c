// Strategy evaluation over successive price snapshots.
//
// Everything here is a pure function of its inputs; the engine owns all
// state. Price rules compare percentage change between the previous and the
// current snapshot, the time rule compares elapsed session time.

use std::time::Duration;

use crate::chain::price_feed::PriceSnapshot;

/// Which exit rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    TakeProfit,
    StopLoss,
    TimeExit,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TakeProfit => "take-profit",
            StrategyKind::StopLoss => "stop-loss",
            StrategyKind::TimeExit => "time-exit",
        }
    }
}

/// One exit rule. Active only when both fields are positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SellStrategy {
    /// Percent move for the price rules; minutes for the time rule
    pub threshold_percent: f64,
    /// Fraction of the position to sell, in (0, 1]
    pub sell_fraction: f64,
}

impl SellStrategy {
    pub fn is_active(&self) -> bool {
        self.threshold_percent > 0.0 && self.sell_fraction > 0.0
    }
}

/// The three exit rules evaluated each cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySet {
    pub take_profit: SellStrategy,
    pub stop_loss: SellStrategy,
    pub time_exit: SellStrategy,
}

impl StrategySet {
    pub fn has_active(&self) -> bool {
        self.take_profit.is_active() || self.stop_loss.is_active() || self.time_exit.is_active()
    }
}

/// Entry rule: buy when a watched token drops hard between two snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct DipBuyStrategy {
    pub dip_percent: f64,
    pub spend_lamports: u64,
}

impl DipBuyStrategy {
    pub fn is_active(&self) -> bool {
        self.dip_percent > 0.0 && self.spend_lamports > 0
    }
}

/// A token that tripped an exit rule this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SellTrigger {
    pub token_id: String,
    pub strategy: StrategyKind,
    pub sell_fraction: f64,
}

pub fn percent_change(previous: f64, current: f64) -> f64 {
    (current - previous) / previous * 100.0
}

/// Evaluate the exit rules over two successive snapshots.
///
/// Rules are checked per token in fixed priority order (take-profit,
/// stop-loss, time) and the first hit wins, so a token appears at most once
/// per cycle and sell fractions are never summed. Tokens missing from either
/// snapshot are skipped: missing data is not a zero-change observation.
pub fn evaluate(
    previous: &PriceSnapshot,
    current: &PriceSnapshot,
    strategies: &StrategySet,
    elapsed: Duration,
) -> Vec<SellTrigger> {
    let mut triggers = Vec::new();
    let elapsed_minutes = elapsed.as_secs_f64() / 60.0;

    for (token_id, &current_price) in current {
        let Some(&previous_price) = previous.get(token_id) else {
            continue;
        };
        if previous_price <= 0.0 {
            // cannot compute a change from a zero quote
            continue;
        }
        let change = percent_change(previous_price, current_price);

        let hit = if strategies.take_profit.is_active()
            && change >= strategies.take_profit.threshold_percent
        {
            Some((StrategyKind::TakeProfit, strategies.take_profit.sell_fraction))
        } else if strategies.stop_loss.is_active()
            && change <= -strategies.stop_loss.threshold_percent
        {
            Some((StrategyKind::StopLoss, strategies.stop_loss.sell_fraction))
        } else if strategies.time_exit.is_active()
            && elapsed_minutes >= strategies.time_exit.threshold_percent
        {
            Some((StrategyKind::TimeExit, strategies.time_exit.sell_fraction))
        } else {
            None
        };

        if let Some((strategy, sell_fraction)) = hit {
            triggers.push(SellTrigger {
                token_id: token_id.clone(),
                strategy,
                sell_fraction,
            });
        }
    }
    triggers
}

/// Tokens whose price fell by at least `dip_percent` between snapshots.
pub fn evaluate_dip_buys(
    previous: &PriceSnapshot,
    current: &PriceSnapshot,
    dip: &DipBuyStrategy,
) -> Vec<String> {
    if !dip.is_active() {
        return Vec::new();
    }
    let mut hits = Vec::new();
    for (token_id, &current_price) in current {
        let Some(&previous_price) = previous.get(token_id) else {
            continue;
        };
        if previous_price <= 0.0 {
            continue;
        }
        if percent_change(previous_price, current_price) <= -dip.dip_percent {
            hits.push(token_id.clone());
        }
    }
    hits
}
