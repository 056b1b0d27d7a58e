//! Orchestrator integrity-disarm scenario.
//!
//! A large gap between bar timestamps on a feed with integrity enabled must
//! flip the orchestrator to execution-blocked, and that state is sticky for
//! the rest of the run even once bars resume on a normal cadence.

use anyhow::Result;
use otx_testkit::{Orchestrator, OrchestratorBar, OrchestratorConfig};

fn bar(symbol: &str, day_id: u32, end_ts: i64, close_micros: i64) -> OrchestratorBar {
    OrchestratorBar {
        symbol: symbol.to_string(),
        day_id,
        end_ts,
        open_micros: close_micros,
        high_micros: close_micros,
        low_micros: close_micros,
        close_micros,
        volume: 1,
        is_complete: true,
    }
}

fn gapped_config() -> OrchestratorConfig {
    let mut cfg = OrchestratorConfig::test_defaults();
    cfg.integrity_enabled = true;
    cfg.integrity_gap_tolerance_bars = 1;
    cfg
}

#[test]
fn large_time_gap_does_not_crash_and_blocks_execution() -> Result<()> {
    let bars = vec![
        bar("SPY", 20250101, 1_700_000_000, 100_000_000),
        bar("SPY", 20250101, 1_700_000_060, 100_100_000),
        // big jump forward — should trip the gap detector.
        bar("SPY", 20250101, 1_700_010_000, 100_200_000),
        bar("SPY", 20250101, 1_700_010_060, 100_300_000),
    ];

    let mut orch = Orchestrator::new(gapped_config());
    let report = orch.run(&bars)?;

    assert_eq!(report.bars_processed, 4);
    assert!(report.execution_blocked, "gap should block execution");
    assert!(!report.halted, "gap disarms execution, it does not halt the run");

    Ok(())
}

#[test]
fn execution_stays_blocked_once_gap_detected() -> Result<()> {
    let mut bars = vec![bar("SPY", 20250101, 1_700_000_000, 100_000_000)];
    bars.push(bar("SPY", 20250101, 1_700_100_000, 101_000_000));
    for i in 0..20i64 {
        bars.push(bar(
            "SPY",
            20250101,
            1_700_100_060 + i * 60,
            101_000_000 + i * 10_000,
        ));
    }

    let mut orch = Orchestrator::new(gapped_config());
    let report = orch.run(&bars)?;

    assert_eq!(report.bars_processed, bars.len());
    assert!(
        report.execution_blocked,
        "execution must stay blocked for the rest of the run once tripped"
    );

    Ok(())
}
