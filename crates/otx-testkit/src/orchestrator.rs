//! Minimum-viable runtime orchestrator (offline, deterministic).
//!
//! Composes the engines that exist as real workspace crates into a single
//! loop: bars -> integrity -> strategy -> execution -> paper broker -> risk.
//! No network I/O, no persistence — everything lives in memory for a single
//! `run()` call, which is enough to exercise the wiring end to end in tests.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use otx_execution::{targets_to_order_intents, PositionBook, Side as ExecSide};
use otx_risk::integrity::{
    evaluate_bar as integrity_evaluate_bar, tick_feed, Bar as IntegrityBar, BarKey, FeedId,
    IntegrityAction, IntegrityConfig, IntegrityState, Timeframe as IntegrityTimeframe,
};
use otx_risk::{
    evaluate as risk_evaluate, PdtContext, RequestKind, RiskAction, RiskConfig, RiskInput,
    RiskState,
};
use otx_strategy::{
    BarStub, RecentBarsWindow, ShadowMode, Strategy, StrategyContext, StrategyHost,
};

use crate::paper_broker::PaperBroker;

/// Input bar for the orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorBar {
    pub symbol: String,
    pub end_ts: i64,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
    pub is_complete: bool,
    pub day_id: u32,
}

/// Configuration for the orchestrator run.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub timeframe_secs: i64,
    pub initial_cash_micros: i64,
    pub bar_history_len: usize,
    pub integrity_enabled: bool,
    pub integrity_stale_threshold_ticks: u64,
    pub integrity_gap_tolerance_bars: u32,
    pub integrity_enforce_feed_disagreement: bool,
}

impl OrchestratorConfig {
    pub fn test_defaults() -> Self {
        Self {
            timeframe_secs: 60,
            initial_cash_micros: 100_000_000_000, // 100k
            bar_history_len: 50,
            integrity_enabled: false,
            integrity_stale_threshold_ticks: 0,
            integrity_gap_tolerance_bars: 0,
            integrity_enforce_feed_disagreement: false,
        }
    }
}

/// Report produced after an orchestrator run.
#[derive(Clone, Debug)]
pub struct OrchestratorReport {
    pub run_id: Uuid,
    pub bars_processed: usize,
    pub fills_count: usize,
    pub broker_acks: usize,
    pub broker_fills: usize,
    pub audit_events: usize,
    pub execution_blocked: bool,
    pub halted: bool,
    pub equity_curve: Vec<(i64, i64)>,
}

/// The orchestrator: composes the execution/risk/integrity/strategy engines
/// into one offline loop. Equity is tracked by a flat signed-position book
/// (cash +/- qty * last mark), deliberately simpler than a full lot-accounting
/// ledger since none of that machinery is wired into this workspace.
pub struct Orchestrator {
    config: OrchestratorConfig,
    run_id: Uuid,
    host: StrategyHost,
    cash_micros: i64,
    positions: BTreeMap<String, i64>,
    risk_config: RiskConfig,
    risk_state: Option<RiskState>,
    integrity_config: IntegrityConfig,
    integrity_state: IntegrityState,
    broker: PaperBroker,
    last_prices: BTreeMap<String, i64>,
    fills_count: usize,
    equity_curve: Vec<(i64, i64)>,
    recent_bars: Vec<BarStub>,
    bar_count: u64,
    halted: bool,
    execution_blocked: bool,
    audit_events: Vec<Value>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let host = StrategyHost::new(ShadowMode::Off);
        let risk_config = RiskConfig::sane_defaults();
        let integrity_config = IntegrityConfig {
            gap_tolerance_bars: config.integrity_gap_tolerance_bars,
            stale_threshold_ticks: config.integrity_stale_threshold_ticks,
            enforce_feed_disagreement: config.integrity_enforce_feed_disagreement,
        };

        Self {
            cash_micros: config.initial_cash_micros,
            config,
            run_id: Uuid::new_v4(),
            host,
            positions: BTreeMap::new(),
            risk_config,
            risk_state: None,
            integrity_config,
            integrity_state: IntegrityState::new(),
            broker: PaperBroker::new(),
            last_prices: BTreeMap::new(),
            fills_count: 0,
            equity_curve: Vec::new(),
            recent_bars: Vec::new(),
            bar_count: 0,
            halted: false,
            execution_blocked: false,
            audit_events: Vec::new(),
        }
    }

    /// Register a strategy (must be called before run).
    pub fn add_strategy(&mut self, s: Box<dyn Strategy>) -> Result<()> {
        self.host
            .register(s)
            .map_err(|e| anyhow::anyhow!("strategy registration failed: {:?}", e))
    }

    /// Seed an integrity feed (for multi-feed stale detection).
    pub fn seed_integrity_feed(&mut self, feed_name: &str, tick: u64) {
        let feed = FeedId::new(feed_name);
        tick_feed(
            &self.integrity_config,
            &mut self.integrity_state,
            &feed,
            tick,
        );
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_execution_blocked(&self) -> bool {
        self.execution_blocked
    }

    pub fn integrity_state(&self) -> &IntegrityState {
        &self.integrity_state
    }

    pub fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    fn equity_micros(&self) -> i64 {
        let mut total = self.cash_micros;
        for (sym, qty) in &self.positions {
            if let Some(px) = self.last_prices.get(sym) {
                total += qty * px;
            }
        }
        total
    }

    fn build_position_book(&self) -> PositionBook {
        let mut book = PositionBook::new();
        for (sym, qty) in &self.positions {
            if *qty != 0 {
                book.insert(sym.clone(), *qty);
            }
        }
        book
    }

    fn is_intent_risk_reducing(&self, intent: &otx_execution::OrderIntent) -> bool {
        let current_qty = self.positions.get(&intent.symbol).copied().unwrap_or(0);
        match intent.side {
            ExecSide::Buy => current_qty < 0,
            ExecSide::Sell => current_qty > 0,
        }
    }

    /// Run the full orchestrator loop over the given bars.
    pub fn run(&mut self, bars: &[OrchestratorBar]) -> Result<OrchestratorReport> {
        self.audit_events.push(serde_json::json!({
            "kind": "run_start",
            "bar_count": bars.len(),
        }));

        let mut bars_processed = 0usize;

        for bar in bars {
            if self.halted {
                break;
            }

            if self.config.integrity_enabled {
                let feed = FeedId::new("orchestrator");
                let now_tick = bar.end_ts as u64;
                let int_bar = IntegrityBar::new(
                    BarKey::new(
                        bar.symbol.clone(),
                        IntegrityTimeframe::secs(self.config.timeframe_secs),
                        bar.end_ts,
                    ),
                    bar.is_complete,
                    bar.close_micros,
                    bar.volume,
                );
                let decision = integrity_evaluate_bar(
                    &self.integrity_config,
                    &mut self.integrity_state,
                    &feed,
                    now_tick,
                    &int_bar,
                );
                match decision.action {
                    IntegrityAction::Disarm | IntegrityAction::Halt | IntegrityAction::Reject => {
                        if !self.execution_blocked {
                            self.audit_events.push(serde_json::json!({
                                "kind": "execution_blocked",
                                "action": format!("{:?}", decision.action),
                                "reason": format!("{:?}", decision.reason),
                                "bar_end_ts": bar.end_ts,
                            }));
                        }
                        self.execution_blocked = true;
                    }
                    IntegrityAction::Allow => {}
                }
            }

            self.last_prices
                .insert(bar.symbol.clone(), bar.close_micros);

            if self.risk_state.is_none() {
                self.risk_state = Some(RiskState::new(bar.day_id, self.equity_micros(), 0));
            }

            self.bar_count += 1;
            let stub = BarStub::new(bar.end_ts, bar.is_complete, bar.close_micros, bar.volume);
            self.recent_bars.push(stub);
            if self.recent_bars.len() > self.config.bar_history_len {
                let start = self.recent_bars.len() - self.config.bar_history_len;
                self.recent_bars = self.recent_bars.split_off(start);
            }

            if !self.host.is_registered() {
                self.equity_curve.push((bar.end_ts, self.equity_micros()));
                bars_processed += 1;
                continue;
            }

            let recent =
                RecentBarsWindow::new(self.config.bar_history_len, self.recent_bars.clone());
            let ctx = StrategyContext::new(self.config.timeframe_secs, self.bar_count, recent);

            let bar_result = self
                .host
                .on_bar(&ctx)
                .map_err(|e| anyhow::anyhow!("strategy on_bar failed: {:?}", e))?;

            if !bar_result.intents.should_execute() || self.execution_blocked {
                self.equity_curve.push((bar.end_ts, self.equity_micros()));
                bars_processed += 1;
                continue;
            }

            let position_book = self.build_position_book();
            let exec_decision =
                targets_to_order_intents(&position_book, &bar_result.intents.output);

            for intent in &exec_decision.intents {
                if self.halted {
                    break;
                }

                let is_risk_reducing = self.is_intent_risk_reducing(intent);
                let risk_input = RiskInput {
                    day_id: bar.day_id,
                    equity_micros: self.equity_micros(),
                    reject_window_id: 0,
                    request: RequestKind::NewOrder,
                    is_risk_reducing,
                    pdt: PdtContext::ok(),
                    kill_switch: None,
                };

                let risk_state = self.risk_state.as_mut().unwrap();
                let risk_decision = risk_evaluate(&self.risk_config, risk_state, &risk_input);

                match risk_decision.action {
                    RiskAction::Allow => {
                        let side_str = match intent.side {
                            ExecSide::Buy => "BUY",
                            ExecSide::Sell => "SELL",
                        };

                        let (ack, fill) = self.broker.submit_order(
                            &intent.symbol,
                            side_str,
                            intent.qty,
                            bar.close_micros,
                        );
                        self.audit_events
                            .push(serde_json::json!({"kind": "order_ack", "ack": ack}));
                        self.audit_events
                            .push(serde_json::json!({"kind": "fill", "fill": fill}));

                        let signed_qty = match intent.side {
                            ExecSide::Buy => intent.qty,
                            ExecSide::Sell => -(intent.qty),
                        };
                        *self.positions.entry(intent.symbol.clone()).or_insert(0) += signed_qty;
                        self.fills_count += 1;
                    }
                    RiskAction::Reject => {}
                    RiskAction::Halt | RiskAction::FlattenAndHalt => {
                        self.halted = true;
                    }
                }
            }

            self.equity_curve.push((bar.end_ts, self.equity_micros()));
            bars_processed += 1;
        }

        self.audit_events.push(serde_json::json!({
            "kind": "run_end",
            "bars_processed": bars_processed,
            "fills": self.fills_count,
            "halted": self.halted,
            "execution_blocked": self.execution_blocked,
        }));

        Ok(OrchestratorReport {
            run_id: self.run_id,
            bars_processed,
            fills_count: self.fills_count,
            broker_acks: self.broker.ack_count(),
            broker_fills: self.broker.fill_count(),
            audit_events: self.audit_events.len(),
            execution_blocked: self.execution_blocked,
            halted: self.halted,
            equity_curve: self.equity_curve.clone(),
        })
    }
}
