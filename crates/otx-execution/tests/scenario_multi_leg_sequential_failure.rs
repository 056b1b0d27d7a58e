use std::sync::Mutex;
use std::time::Duration;

use otx_execution::{execute_group, LegPlan, OrderFillTracker};
use otx_schemas::{ExecutionJournalEntry, ExecutionOperation, LegStatus, Side};
use uuid::Uuid;

fn leg(token: i64, side: Side, quantity: i64) -> LegPlan {
    LegPlan { instrument_token: token, side, quantity, tag: format!("tag-{token}") }
}

#[test]
fn second_of_three_legs_fails_skips_the_third_and_rolls_back_the_first() {
    let strategy_id = Uuid::new_v4();
    let group_id = Uuid::new_v4();
    let legs = vec![
        leg(111, Side::Sell, 50),
        leg(222, Side::Sell, 50),
        leg(333, Side::Buy, 50),
    ];

    let mut journal: Vec<ExecutionJournalEntry> = Vec::new();
    let rolled_back_tags: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let result = execute_group(
        strategy_id,
        group_id,
        ExecutionOperation::Sequential,
        &legs,
        1_700_000_000_000,
        &mut journal,
        |leg| {
            if leg.tag.starts_with("ROLLBACK-") {
                rolled_back_tags.lock().unwrap().push(leg.tag.clone());
                return Ok(());
            }
            if leg.instrument_token == 222 {
                Err("order rejected by broker".to_string())
            } else {
                Ok(())
            }
        },
        &OrderFillTracker::new(),
        Duration::from_millis(100),
        None,
    );

    assert_eq!(result.completed, vec![111]);
    assert_eq!(
        result.failed_leg,
        Some((222, "order rejected by broker".to_string()))
    );
    assert_eq!(result.rolled_back, vec![111]);
    assert_eq!(rolled_back_tags.into_inner().unwrap(), vec!["ROLLBACK-tag-111".to_string()]);

    // Every leg gets a PENDING entry up front, before any leg is routed —
    // crash recovery must see all three legs, not just the ones reached.
    let pending_count = journal.iter().filter(|e| e.status == LegStatus::Pending).count();
    assert_eq!(pending_count, 3);

    // Leg 333 is never dispatched, but it IS journaled as skipped so replay
    // can distinguish "skipped after a prior failure" from "lost".
    let leg_333_final = journal.iter().filter(|e| e.instrument_token == 333).next_back().unwrap();
    assert_eq!(leg_333_final.status, LegStatus::Failed);
    assert_eq!(
        leg_333_final.failure_reason.as_deref(),
        Some("skipped due to prior leg failure")
    );

    let leg_111_final = journal.iter().filter(|e| e.instrument_token == 111).next_back().unwrap();
    assert_eq!(leg_111_final.status, LegStatus::Completed);

    let leg_222_final = journal.iter().filter(|e| e.instrument_token == 222).next_back().unwrap();
    assert_eq!(leg_222_final.status, LegStatus::Failed);
    assert_eq!(
        leg_222_final.failure_reason.as_deref(),
        Some("order rejected by broker")
    );
}
