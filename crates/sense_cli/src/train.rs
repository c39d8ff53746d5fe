//! Terminal front end: one session against the configured oracle.

use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sense_core::{SenseConfig, TrainingConfig, TrainingConfigProvider};
use sense_persona::{TrainingSession, TurnOutcome};
use sense_reasoning::{HttpOracle, OracleBudget};
use sense_scoring::{EvaluationInput, EvaluationResult, Evaluator};
use std::sync::Arc;

pub struct TrainOptions {
    pub profile_id: u32,
    pub scenario_id: Option<String>,
    pub mental_state_id: Option<String>,
}

pub fn print_profiles(config: &TrainingConfig) {
    for p in &config.profiles {
        let difficulty = p.difficulty();
        println!(
            "{:>3}  {}（{}岁，{}）  难度: {} {}  信任阈值: {}",
            p.id,
            p.name,
            p.age,
            p.occupation,
            difficulty.label(),
            "★".repeat(difficulty.stars() as usize),
            p.trust_threshold
        );
    }
}

pub async fn run(
    config: &SenseConfig,
    training: &TrainingConfigProvider,
    opts: TrainOptions,
) -> Result<()> {
    let catalog = training.resolve();
    let profile = catalog
        .find_profile(opts.profile_id)
        .ok_or_else(|| anyhow!("Unknown profile id {} (see `sense profiles`)", opts.profile_id))?;

    let (scenario, mental_state) = {
        let mut rng = rand::thread_rng();
        (
            catalog.select_scenario(opts.scenario_id.as_deref(), profile, &mut rng),
            catalog.select_mental_state(opts.mental_state_id.as_deref(), profile, &mut rng),
        )
    };

    let oracle = HttpOracle::new(&config.llm)?;
    let budget = OracleBudget::from_config(&config.llm);
    let mut session = TrainingSession::new(
        Arc::new(profile.clone()),
        scenario.map(Arc::new),
        mental_state.map(Arc::new),
        &catalog.goals,
    )
    .with_budget(budget);

    println!("=== {} · {} ===", profile.name, profile.occupation);
    if let Some(s) = session.scenario() {
        println!("场景: {}（{}）", s.name, s.summary);
    }
    if let Some(m) = session.mental_state() {
        println!("心理状态: {}", m.name);
    }
    println!("输入 /status 查看状态，/quit 提前结算。\n");

    let opening = session.opening(&oracle).await;
    println!("{}: {}\n", profile.name, opening.response);

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match tokio::task::block_in_place(|| editor.readline("你> ")) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let message = line.trim();
        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/status" => {
                print_status(&session);
                continue;
            }
            _ => {}
        }
        let _ = editor.add_history_entry(message);

        match session.respond(&oracle, message).await {
            Ok(turn) => print_turn(&profile.name, &turn),
            Err(e) => println!("[{e}]"),
        }
        if session.is_ended() {
            break;
        }
    }

    println!("\n正在评估本次训练...\n");
    let evaluator = Evaluator::from_config(&catalog).with_params(budget.evaluation);
    let result = evaluator
        .evaluate(&oracle, &EvaluationInput::from_session(&session))
        .await;
    print_evaluation(&result);
    Ok(())
}

fn print_status(session: &TrainingSession) {
    println!(
        "[第{}轮] 信任度 {}/10（阈值 {}） 已解答顾虑 {}/{}",
        session.turn_count(),
        session.trust_level(),
        session.profile().trust_threshold,
        session.concerns_addressed().len(),
        session.profile().total_concerns()
    );
}

fn print_turn(name: &str, turn: &TurnOutcome) {
    println!("\n{name}: {}", turn.response);
    println!("  （内心：{}）", turn.inner_thought);
    let mut notes = vec![format!("信任 {:+}", turn.trust_change)];
    if let Some(concern) = &turn.concern_addressed {
        notes.push(format!("解答顾虑：{concern}"));
    }
    if !turn.triggered_events.is_empty() {
        notes.push(format!("触发事件：{}", turn.triggered_events.join("、")));
    }
    println!("  [{}]\n", notes.join(" | "));
    if let Some(reason) = turn.end_reason {
        println!("=== 对话结束（{reason}）===");
    }
}

fn print_evaluation(result: &EvaluationResult) {
    println!("总分: {}/{}", result.total_score, result.scoring_breakdown.max_total_score);
    for part in &result.scoring_breakdown.parts {
        match &part.detail {
            Some(detail) => println!("  {:+4}  {}（{}）", part.delta, part.name, detail),
            None => println!("  {:+4}  {}", part.delta, part.name),
        }
    }
    println!("\n维度评分（加权 {:.1}）:", result.llm_weighted_score);
    for (dim, score) in &result.scores {
        println!("  {dim}: {score:.0}");
    }
    println!("\n结束原因: {}", result.end_explanation);
    if !result.highlights.is_empty() {
        println!("亮点: {}", result.highlights.join("；"));
    }
    if !result.improvements.is_empty() {
        println!("改进: {}", result.improvements.join("；"));
    }
    if !result.key_insights.is_empty() {
        println!("洞察: {}", result.key_insights);
    }
    if !result.overall_comment.is_empty() {
        println!("总评: {}", result.overall_comment);
    }
}
