//! End-to-end turn pipeline tests against a scripted oracle.

use rand::rngs::StdRng;
use rand::SeedableRng;
use sense_core::defaults::builtin_profiles;
use sense_core::{GoalsConfig, Profile, Scenario};
use sense_persona::{EndReason, SessionError, Speaker, TrainingSession};
use sense_reasoning::{ChatRole, ScriptedOracle};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

/// Base success conditions only: ready + trust ≥ profile threshold.
fn plain_goals() -> GoalsConfig {
    GoalsConfig {
        success_conditions_by_difficulty: BTreeMap::new(),
        ..GoalsConfig::default()
    }
}

fn profile(threshold: i32, concerns: &[&str]) -> Arc<Profile> {
    let mut p = builtin_profiles()[0].clone();
    p.trust_threshold = threshold;
    p.concerns = concerns.iter().map(|c| c.to_string()).collect();
    Arc::new(p)
}

fn session(threshold: i32, goals: &GoalsConfig) -> TrainingSession {
    TrainingSession::new(
        profile(threshold, &["担心被骗", "害怕亏钱", "不会用App"]),
        None,
        None,
        goals,
    )
}

fn reply(trust_change: i32, concern: Option<&str>, willing: bool, ready: bool) -> String {
    serde_json::json!({
        "response": "嗯，我再想想",
        "inner_thought": "还行",
        "trust_change": trust_change,
        "concern_addressed": concern,
        "willing_to_continue": willing,
        "ready_to_open_account": ready,
    })
    .to_string()
}

// ============================================================================
// Trust and concerns
// ============================================================================

#[tokio::test]
async fn test_trust_and_concern_updates() {
    let mut s = session(8, &plain_goals());
    let oracle = ScriptedOracle::new([reply(2, Some("担心被骗"), true, false)]);

    let out = s.respond(&oracle, "资金由银行第三方存管").await.unwrap();
    assert!(out.parsed);
    assert_eq!(out.trust_change, 2);
    assert_eq!(s.trust_level(), 3);
    assert_eq!(s.concerns_addressed(), ["担心被骗".to_string()]);
    assert!(!out.is_ended);
}

#[tokio::test]
async fn test_same_concern_twice_is_recorded_once() {
    let mut s = session(8, &plain_goals());
    let oracle = ScriptedOracle::new([
        reply(1, Some("担心被骗"), true, false),
        reply(1, Some("担心被骗"), true, false),
    ]);
    s.respond(&oracle, "第一轮").await.unwrap();
    s.respond(&oracle, "第二轮").await.unwrap();
    assert_eq!(s.concerns_addressed().len(), 1);
}

#[tokio::test]
async fn test_malformed_reply_leaves_state_unchanged() {
    let mut s = session(8, &plain_goals());
    let oracle = ScriptedOracle::new([
        reply(2, Some("担心被骗"), true, false),
        "我觉得还行吧，不过你说的我没太懂".to_string(),
    ]);
    s.respond(&oracle, "第一轮").await.unwrap();
    let (trust, concerns) = (s.trust_level(), s.concerns_addressed().to_vec());

    let out = s.respond(&oracle, "第二轮").await.unwrap();
    assert!(!out.parsed);
    assert_eq!(out.trust_change, 0);
    assert_eq!(out.inner_thought, "（解析失败）");
    assert_eq!(out.response, "我觉得还行吧，不过你说的我没太懂");
    assert_eq!(s.trust_level(), trust);
    assert_eq!(s.concerns_addressed(), concerns.as_slice());
    assert!(!out.is_ended);
    // Raw text still lands in history.
    assert_eq!(s.history().last().unwrap().content, out.response);
}

#[tokio::test]
async fn test_oracle_diagnostic_is_absorbed() {
    let mut s = session(8, &plain_goals());
    let oracle = ScriptedOracle::new(["[API请求超时，请重试]"]);
    let out = s.respond(&oracle, "你好").await.unwrap();
    assert!(!out.parsed);
    assert_eq!(s.trust_level(), 1);
    assert!(!out.is_ended);
}

// ============================================================================
// End conditions
// ============================================================================

#[tokio::test]
async fn test_success_beats_user_quit() {
    let mut s = session(2, &plain_goals());
    let oracle = ScriptedOracle::new([reply(2, None, false, true)]);
    let out = s.respond(&oracle, "现在开户送体验金").await.unwrap();
    assert!(s.is_convinced());
    assert_eq!(out.end_reason, Some(EndReason::Success));
}

#[tokio::test]
async fn test_user_quit_detail() {
    let mut s = session(8, &plain_goals());
    let oracle = ScriptedOracle::new([serde_json::json!({
        "response": "我还是去问问儿子吧",
        "trust_change": 1,
        "willing_to_continue": false,
        "quit_reason": "needs_family_approval",
    })
    .to_string()]);
    let out = s.respond(&oracle, "您考虑一下").await.unwrap();
    assert_eq!(out.end_reason, Some(EndReason::UserQuit));
    assert_eq!(out.end_detail.quit_reason.as_deref(), Some("needs_family_approval"));
    assert_eq!(out.end_detail.final_trust, Some(2));
    assert_eq!(out.end_detail.last_trust_change, Some(1));
    assert_eq!(out.end_detail.turn, Some(1));
}

#[tokio::test]
async fn test_trust_full() {
    let mut s = session(10, &plain_goals());
    let oracle = ScriptedOracle::new([reply(15, None, true, false)]);
    let out = s.respond(&oracle, "完美的回答").await.unwrap();
    assert_eq!(s.trust_level(), 10);
    assert_eq!(out.end_reason, Some(EndReason::TrustFull));
    assert_eq!(out.end_detail.final_trust, Some(10));
}

#[tokio::test]
async fn test_concerns_full() {
    let mut s = TrainingSession::new(
        profile(9, &["担心被骗", "害怕亏钱"]),
        None,
        None,
        &plain_goals(),
    );
    let oracle = ScriptedOracle::new([
        reply(1, Some("担心被骗"), true, false),
        reply(1, Some("害怕亏钱"), true, false),
    ]);
    assert!(!s.respond(&oracle, "一").await.unwrap().is_ended);
    let out = s.respond(&oracle, "二").await.unwrap();
    assert_eq!(out.end_reason, Some(EndReason::ConcernsFull));
    assert_eq!(out.end_detail.concerns_addressed, Some(2));
    assert_eq!(out.end_detail.total_concerns, Some(2));
}

#[tokio::test]
async fn test_max_turns() {
    let mut goals = plain_goals();
    goals.end_conditions.max_turns = 3;
    let mut s = session(9, &goals);
    let oracle = ScriptedOracle::new((0..3).map(|_| reply(0, None, true, false)));
    for i in 1..=3 {
        let out = s.respond(&oracle, "继续").await.unwrap();
        assert_eq!(out.is_ended, i == 3);
    }
    assert_eq!(s.end_reason(), Some(EndReason::MaxTurns));
    assert_eq!(s.end_detail().turn, Some(3));
}

#[tokio::test]
async fn test_ended_session_rejects_turns() {
    let mut s = session(2, &plain_goals());
    let oracle = ScriptedOracle::new([reply(2, None, true, true), reply(-5, None, false, false)]);
    s.respond(&oracle, "开户吧").await.unwrap();
    let detail = s.end_detail().clone();

    let err = s.respond(&oracle, "还在吗").await.unwrap_err();
    assert_eq!(err, SessionError::Ended(EndReason::Success));
    assert_eq!(s.end_reason(), Some(EndReason::Success));
    assert_eq!(s.end_detail(), &detail);
    assert_eq!(s.turn_count(), 1);
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn test_medium_difficulty_does_not_require_ready() {
    // Default medium override: no explicit "ready", two concerns, profile threshold.
    let mut s = session(7, &GoalsConfig::default());
    let oracle = ScriptedOracle::new([
        reply(3, Some("担心被骗"), true, false),
        reply(3, Some("害怕亏钱"), true, false),
    ]);
    s.respond(&oracle, "一").await.unwrap();
    assert!(!s.is_convinced());
    let out = s.respond(&oracle, "二").await.unwrap();
    assert_eq!(s.trust_level(), 7);
    assert_eq!(out.end_reason, Some(EndReason::Success));
}

// ============================================================================
// Events and prompts
// ============================================================================

fn interest_scenario() -> Arc<Scenario> {
    let scenario: Scenario = serde_json::from_value(serde_json::json!({
        "id": "rate_cut",
        "name": "降息",
        "summary": "央行刚刚降息",
        "events": [{
            "id": "interest_question",
            "name": "想起存款利息",
            "description": "突然想起银行利息又降了",
            "trigger": {"turn_gte": 3, "keyword_any": ["利息"]},
            "impact": {"add_context": "你开始认真比较存款和理财"}
        }]
    }))
    .unwrap();
    Arc::new(scenario)
}

#[tokio::test]
async fn test_event_fires_on_turn_and_keyword_then_stays() {
    let mut s = TrainingSession::new(
        profile(9, &["担心被骗"]),
        Some(interest_scenario()),
        None,
        &plain_goals(),
    )
    .with_rng(StdRng::seed_from_u64(7));
    let oracle = ScriptedOracle::new((0..5).map(|_| reply(0, None, true, false)));

    s.respond(&oracle, "这个利息高吗").await.unwrap();
    assert!(s.active_events().is_empty());
    s.respond(&oracle, "你好").await.unwrap();
    s.respond(&oracle, "收益怎么样").await.unwrap();
    assert!(s.active_events().is_empty());

    let out = s.respond(&oracle, "比银行LiXi利息高").await.unwrap();
    assert_eq!(out.triggered_events, vec!["interest_question".to_string()]);

    let out = s.respond(&oracle, "好的").await.unwrap();
    assert!(out.triggered_events.is_empty());
    assert_eq!(s.active_events(), ["interest_question".to_string()]);

    let calls = oracle.calls().await;
    let system_at = |i: usize| calls[i].0[0].content.clone();
    assert!(!system_at(2).contains("你开始认真比较存款和理财"));
    assert!(system_at(3).contains("你开始认真比较存款和理财"));
    assert!(system_at(4).contains("你开始认真比较存款和理财"));
}

#[tokio::test]
async fn test_history_alternates_and_feeds_oracle() {
    let mut s = session(8, &plain_goals());
    let oracle = ScriptedOracle::new([
        r#"{"response": "你好，我刚退休", "inner_thought": "紧张"}"#.to_string(),
        reply(1, None, true, false),
    ]);
    let opening = s.opening(&oracle).await;
    assert!(opening.generated);
    assert_eq!(opening.response, "你好，我刚退休");

    s.respond(&oracle, "阿姨好").await.unwrap();
    let speakers: Vec<_> = s.history().iter().map(|h| h.speaker).collect();
    assert_eq!(speakers, vec![Speaker::Persona, Speaker::Trainee, Speaker::Persona]);

    let calls = oracle.calls().await;
    let roles: Vec<_> = calls[1].0.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::System, ChatRole::Assistant, ChatRole::User]
    );
    assert!(calls[1].0[0].content.contains("信任度: 1/10"));
}

#[tokio::test]
async fn test_status_snapshot() {
    let mut s = session(9, &plain_goals());
    let oracle = ScriptedOracle::new([reply(2, Some("害怕亏钱"), true, false)]);
    s.respond(&oracle, "保本理财了解一下").await.unwrap();

    let status = serde_json::to_value(s.status()).unwrap();
    assert_eq!(status["turn_count"], 1);
    assert_eq!(status["trust_level"], 3);
    assert_eq!(status["trust_threshold"], 9);
    assert_eq!(status["total_concerns"], 3);
    assert_eq!(status["difficulty_level"], "hard");
    assert_eq!(status["messages"].as_array().unwrap().len(), 2);
    assert!(status["end_reason"].is_null());
}
