// Strategy engine: the poll → evaluate → execute loop and its state machine.
//
// One engine instance owns one polling session. Start spawns the loop on a
// fresh cancellation token; stop cancels cooperatively at the next loop
// boundary and waits for the task to drain. Per-token trades run as
// independent spawned tasks, and a token whose previous submission is still
// in flight is skipped rather than resubmitted.

use dashmap::DashSet;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::evaluator::{self, DipBuyStrategy, SellTrigger, StrategySet};
use crate::chain::executor::TradeExecutor;
use crate::chain::price_feed::{PriceSnapshot, PriceSource};
use crate::error::{BotError, BotResult};

/// Lifecycle of one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Running,
    Stopping,
}

/// Engine wiring that stays fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub strategies: StrategySet,
    pub dip_buy: DipBuyStrategy,
    pub manual_mode: bool,
    pub token_ids: Vec<String>,
}

/// Counters updated by the loop and its spawned trade tasks.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub cycles: AtomicU64,
    pub skipped_cycles: AtomicU64,
    pub evaluations: AtomicU64,
    pub sell_triggers: AtomicU64,
    pub buy_triggers: AtomicU64,
    pub confirmed_bundles: AtomicU64,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct StrategyEngine {
    feed: Arc<dyn PriceSource>,
    executor: Arc<dyn TradeExecutor>,
    config: EngineConfig,
    state: RwLock<ExecutionState>,
    session: Mutex<Option<Session>>,
    in_flight: Arc<DashSet<String>>,
    sequence: AtomicU64,
    stats: Arc<EngineStats>,
}

impl StrategyEngine {
    pub fn new(
        feed: Arc<dyn PriceSource>,
        executor: Arc<dyn TradeExecutor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            feed,
            executor,
            config,
            state: RwLock::new(ExecutionState::Idle),
            session: Mutex::new(None),
            in_flight: Arc::new(DashSet::new()),
            sequence: AtomicU64::new(0),
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub async fn state(&self) -> ExecutionState {
        *self.state.read().await
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Begin a polling session. Rejected unless at least one strategy is
    /// active or manual mode was explicitly requested, and rejected while a
    /// session is already running.
    pub async fn start(self: &Arc<Self>) -> BotResult<()> {
        if !self.config.manual_mode
            && !self.config.strategies.has_active()
            && !self.config.dip_buy.is_active()
        {
            return Err(BotError::InvalidConfiguration(
                "no active strategy and manual mode not requested".to_string(),
            ));
        }

        let mut session = self.session.lock().await;
        {
            let mut state = self.state.write().await;
            if *state != ExecutionState::Idle {
                return Err(BotError::InvalidConfiguration(
                    "engine is already running".to_string(),
                ));
            }
            *state = ExecutionState::Running;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run_loop(cancel.clone()));
        *session = Some(Session { cancel, task });
        info!(
            "🚀 Strategy engine started: interval={:?}, watching {} tokens",
            self.config.poll_interval,
            self.config.token_ids.len()
        );
        Ok(())
    }

    /// End the session at the next loop boundary and wait for the loop to
    /// drain. Stopping an idle engine is a no-op.
    pub async fn stop(&self) {
        let session = {
            let mut guard = self.session.lock().await;
            guard.take()
        };
        let Some(session) = session else {
            debug!("Stop requested but engine is idle");
            return;
        };

        *self.state.write().await = ExecutionState::Stopping;
        info!("🛑 Stopping strategy engine");
        session.cancel.cancel();
        if let Err(e) = session.task.await {
            warn!("Polling task ended abnormally: {}", e);
            *self.state.write().await = ExecutionState::Idle;
        }
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut previous: Option<PriceSnapshot> = None;
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.stats.cycles.fetch_add(1, Ordering::Relaxed);
            let current = self.feed.fetch_prices(&self.config.token_ids).await;
            if current.is_empty() {
                // a feed outage must not read as a 100% price drop
                self.stats.skipped_cycles.fetch_add(1, Ordering::Relaxed);
                debug!("Empty price snapshot, skipping cycle");
                continue;
            }

            let Some(prev) = previous.as_ref() else {
                info!("📸 First snapshot captured for {} tokens", current.len());
                previous = Some(current);
                continue;
            };

            let mut triggered_ids: HashSet<String> = HashSet::new();
            if self.config.strategies.has_active() {
                self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
                let triggers = evaluator::evaluate(
                    prev,
                    &current,
                    &self.config.strategies,
                    started.elapsed(),
                );
                for trigger in triggers {
                    triggered_ids.insert(trigger.token_id.clone());
                    self.spawn_sell(trigger);
                }
            }

            if self.config.dip_buy.is_active() {
                let dips = evaluator::evaluate_dip_buys(prev, &current, &self.config.dip_buy);
                for token_id in dips {
                    // a token already selling this cycle is not bought back
                    if triggered_ids.contains(&token_id) {
                        continue;
                    }
                    self.spawn_buy(token_id);
                }
            }

            previous = Some(current);
        }

        *self.state.write().await = ExecutionState::Idle;
        info!(
            "🏁 Strategy engine stopped: cycles={}, skipped={}, sells={}, buys={}, confirmed={}",
            self.stats.cycles.load(Ordering::Relaxed),
            self.stats.skipped_cycles.load(Ordering::Relaxed),
            self.stats.sell_triggers.load(Ordering::Relaxed),
            self.stats.buy_triggers.load(Ordering::Relaxed),
            self.stats.confirmed_bundles.load(Ordering::Relaxed),
        );
    }

    fn spawn_sell(&self, trigger: SellTrigger) {
        if !self.in_flight.insert(trigger.token_id.clone()) {
            debug!(
                "Skipping {}: a submission is already in flight",
                trigger.token_id
            );
            return;
        }
        self.stats.sell_triggers.fetch_add(1, Ordering::Relaxed);
        let executor = Arc::clone(&self.executor);
        let in_flight = Arc::clone(&self.in_flight);
        let stats = Arc::clone(&self.stats);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let confirmed = executor
                .execute_sell(
                    &trigger.token_id,
                    trigger.sell_fraction,
                    trigger.strategy,
                    sequence,
                )
                .await;
            if confirmed {
                stats.confirmed_bundles.fetch_add(1, Ordering::Relaxed);
            }
            in_flight.remove(&trigger.token_id);
        });
    }

    fn spawn_buy(&self, token_id: String) {
        if !self.in_flight.insert(token_id.clone()) {
            debug!("Skipping {}: a submission is already in flight", token_id);
            return;
        }
        self.stats.buy_triggers.fetch_add(1, Ordering::Relaxed);
        let executor = Arc::clone(&self.executor);
        let in_flight = Arc::clone(&self.in_flight);
        let stats = Arc::clone(&self.stats);
        let spend = self.config.dip_buy.spend_lamports;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let confirmed = executor.execute_buy(&token_id, spend, sequence).await;
            if confirmed {
                stats.confirmed_bundles.fetch_add(1, Ordering::Relaxed);
            }
            in_flight.remove(&token_id);
        });
    }
}
