//! Property-based tests for the session pipeline.

use proptest::prelude::*;
use sense_core::defaults::builtin_profiles;
use sense_core::{GoalsConfig, MAX_TRUST, MIN_TRUST};
use sense_persona::{apply_trust_change, TrainingSession};
use sense_reasoning::ScriptedOracle;
use std::sync::Arc;

// ============================================================================
// Trust clamp
// ============================================================================

proptest! {
    #[test]
    fn trust_update_stays_in_range(current in MIN_TRUST..=MAX_TRUST, delta in any::<i32>()) {
        let next = apply_trust_change(current, delta);
        prop_assert!((MIN_TRUST..=MAX_TRUST).contains(&next));
    }

    #[test]
    fn trust_stays_in_range_across_turns(deltas in proptest::collection::vec(-50i32..50, 1..15)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let mut goals = GoalsConfig::default();
            goals.end_conditions.max_turns = 100;
            goals.end_conditions.min_trust_to_continue = -1;
            let mut session = TrainingSession::new(
                Arc::new(builtin_profiles()[3].clone()),
                None,
                None,
                &goals,
            );
            let oracle = ScriptedOracle::new(deltas.iter().map(|d| {
                format!(r#"{{"response": "嗯", "trust_change": {d}}}"#)
            }));
            for _ in &deltas {
                if session.is_ended() {
                    break;
                }
                session.respond(&oracle, "继续").await.unwrap();
                prop_assert!((MIN_TRUST..=MAX_TRUST).contains(&session.trust_level()));
            }
            Ok(())
        })?;
    }

    #[test]
    fn end_reason_is_terminal(deltas in proptest::collection::vec(-3i32..=3, 1..25)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let mut session = TrainingSession::new(
                Arc::new(builtin_profiles()[4].clone()),
                None,
                None,
                &GoalsConfig::default(),
            );
            let oracle = ScriptedOracle::new(deltas.iter().map(|d| {
                format!(r#"{{"response": "嗯", "trust_change": {d}, "ready_to_open_account": {}}}"#, d > &2)
            }));
            let mut seen = None;
            for _ in &deltas {
                let result = session.respond(&oracle, "继续").await;
                match seen {
                    Some(reason) => {
                        prop_assert!(result.is_err());
                        prop_assert_eq!(session.end_reason(), Some(reason));
                    }
                    None => {
                        prop_assert!(result.is_ok());
                        seen = session.end_reason();
                    }
                }
            }
            Ok(())
        })?;
    }
}
