use crate::oracle::{ChatMessage, ChatRole};
use sense_core::{Criterion, MentalState, Profile, Scenario, ScenarioEvent, SuccessConditions};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Product the persona has just opened.
pub const PRODUCT_NAME: &str = "腾讯自选股App";

/// What the persona prompt needs to know about the live session.
pub struct PersonaContext<'a> {
    pub profile: &'a Profile,
    pub scenario: Option<&'a Scenario>,
    pub mental_state: Option<&'a MentalState>,
    pub active_events: &'a [&'a ScenarioEvent],
    pub trust_level: i32,
    pub concerns_addressed: &'a [String],
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// System prompt for every persona call: who to play, where, in what
    /// mood, what just happened, current trust, and the reply schema.
    pub fn persona_system(ctx: &PersonaContext<'_>) -> String {
        let p = ctx.profile;
        let mut out = String::new();

        let _ = writeln!(out, "你将扮演一位刚接触{PRODUCT_NAME}的潜在用户，陪产品经理做角色扮演训练。");
        let _ = writeln!(out);
        let _ = writeln!(out, "## 你是谁");
        let _ = writeln!(out, "- 姓名: {}", p.name);
        let _ = writeln!(out, "- 年龄: {}岁", p.age);
        let _ = writeln!(out, "- 职业: {}", p.occupation);
        let _ = writeln!(out, "- 背景: {}", p.background);
        let _ = writeln!(out, "- 投资目标: {}", p.investment_goal);
        let _ = writeln!(out, "- 风险承受能力: {}", p.risk_tolerance);
        let _ = writeln!(out, "- 主要顾虑: {}", p.concerns.join(", "));
        let _ = writeln!(out, "- 为什么打开App: {}", p.trigger_scenario);
        let _ = writeln!(out, "- 性格: {}", p.personality);

        if let Some(s) = ctx.scenario {
            let _ = writeln!(out);
            let _ = writeln!(out, "## 当前场景（务必代入）");
            let _ = writeln!(out, "- 场景: {}", s.name);
            let _ = writeln!(out, "- 概述: {}", s.summary);
            let _ = writeln!(out, "- 上下文: {}", s.context);
            let _ = writeln!(out, "- 市场状态: {}", s.market_state);
            let _ = writeln!(out, "- 你此刻想要的: {}", s.user_goal_in_this_moment);
            let _ = writeln!(out, "- 约束: {}", s.constraints.join(", "));
        }

        if let Some(m) = ctx.mental_state {
            let _ = writeln!(out);
            let _ = writeln!(out, "## 当前心理状态（务必代入）");
            let _ = writeln!(out, "- 状态: {}", m.name);
            let _ = writeln!(out, "- 描述: {}", m.description);
            let _ = writeln!(out, "- 行为指引: {}", m.behavior_guidelines.join(", "));
        }

        if !ctx.active_events.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## 刚刚发生的事（会影响你的态度和提问）");
            for ev in ctx.active_events {
                let extra = ev.impact.add_context.trim();
                if extra.is_empty() {
                    let _ = writeln!(out, "- {}: {}", ev.name, ev.description);
                } else {
                    let _ = writeln!(out, "- {}: {}；{}", ev.name, ev.description, extra);
                }
            }
        }

        let concerns = if ctx.concerns_addressed.is_empty() {
            "暂无".to_string()
        } else {
            ctx.concerns_addressed.join("、")
        };

        let _ = write!(
            out,
            r#"
## 扮演规则
1. 你几乎不懂股票投资，困惑和担忧要真实
2. 提问方式要符合一个{age}岁{occupation}的身份
3. 不要一上来就被说服，信任要看对方回答的质量一点点建立
4. 可以问顾虑清单里的问题，也可以顺着对话问新问题
5. 对方讲得不清楚或太专业，就追问或者直说听不懂
6. 觉得疑虑真的被解答了，态度可以软化
7. 始终保持角色一致，用角色的口吻说话

## 当前状态
- 信任度: {trust}/10（达到{threshold}才会考虑开户）
- 已解答的顾虑: {concerns}

## 回复格式
只用JSON回复，字段如下：
{{
    "response": "你作为用户说的话",
    "inner_thought": "你的真实内心想法（产品经理看不到，用于评估）",
    "trust_change": 信任度变化，-2到+2之间的整数,
    "concern_addressed": "本轮被解答的顾虑名称，没有则为null",
    "willing_to_continue": true或false，是否还愿意继续聊,
    "ready_to_open_account": true或false，是否准备好开户
}}

全程保持角色，用第一人称回复。"#,
            age = p.age,
            occupation = p.occupation,
            trust = ctx.trust_level,
            threshold = p.trust_threshold,
        );

        out
    }

    /// User-side instruction asking for the persona's first line.
    pub fn opening_instruction(profile: &Profile) -> String {
        format!(
            r#"你是{name}，刚刚打开{PRODUCT_NAME}，原因是“{trigger}”。

请说出你的第一句话，表达你的困惑或需求。记住你是投资小白。

只用JSON回复：
{{
    "response": "你的开场白",
    "inner_thought": "你的真实内心想法"
}}"#,
            name = profile.name,
            trigger = profile.trigger_scenario,
        )
    }

    /// Deterministic opening used when the oracle reply cannot be parsed.
    pub fn opening_fallback(profile: &Profile) -> String {
        format!(
            "你好，我想问一下...我是{}，{}，但是我不太懂这些...",
            profile.occupation, profile.trigger_scenario
        )
    }

    pub fn evaluation_system() -> &'static str {
        "你是资深的产品经理培训评估专家，负责对产品经理与用户的对话做专业评估。"
    }

    pub fn evaluation(brief: &EvaluationBrief<'_>) -> String {
        let p = brief.profile;
        let transcript = brief
            .transcript
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let speaker = match m.role {
                    ChatRole::Assistant => "用户(小白)",
                    _ => "产品经理",
                };
                format!("{speaker}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let scenario = brief
            .scenario
            .map(|s| format!("{}：{}", s.name, s.summary))
            .unwrap_or_else(|| "无（未配置）".to_string());
        let mental = brief
            .mental_state
            .map(|m| format!("{}：{}", m.name, m.description))
            .unwrap_or_else(|| "无（未配置）".to_string());
        let concerns = if brief.concerns_addressed.is_empty() {
            "无".to_string()
        } else {
            brief.concerns_addressed.join("、")
        };
        let end_detail = brief
            .end_detail
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .unwrap_or_else(|| "无".to_string());
        let pass_conditions = pass_conditions(brief.success, p.trust_threshold)
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut dimensions = String::new();
        let mut schema = String::new();
        for (i, (key, criterion)) in brief.criteria.iter().enumerate() {
            let _ = writeln!(
                dimensions,
                "{}. {}（{}）: {}",
                i + 1,
                criterion.name,
                key,
                criterion.description
            );
            let sep = if i + 1 == brief.criteria.len() { "" } else { "," };
            let _ = writeln!(schema, "        \"{key}\": 分数{sep}");
        }

        format!(
            r#"请评估下面这段产品经理与潜在用户的对话。

## 用户背景
- 姓名: {name}
- 年龄: {age}岁
- 职业: {occupation}
- 背景: {background}
- 投资目标: {goal}
- 主要顾虑: {pain_points}
- 说服难度: 信任度需达到{threshold}/10才会开户
- 场景: {scenario}
- 心理状态: {mental}

## 对话内容
{transcript}

## 对话结果
- 对话轮数: {turns}轮
- 最终信任度: {trust}/10
- 是否成功说服开户: {convinced}
- 解答的顾虑: {concerns}
- 结束原因: {end_reason}
- 结束补充信息: {end_detail}

## 通关条件
{pass_conditions}

## 评估维度
请按以下维度打分（每项0-100分）：
{dimensions}
只用JSON返回评估结果：
{{
    "scores": {{
{schema}    }},
    "highlights": ["做得好的地方1", "做得好的地方2"],
    "improvements": ["需要改进的地方1", "需要改进的地方2"],
    "key_insights": "关于用户sense的关键洞察",
    "overall_comment": "总体评价",
    "end_explanation": "用通俗的话解释对话为什么在这里结束（尤其是用户中途退出时，说明用户为何失去兴趣）"
}}"#,
            name = p.name,
            age = p.age,
            occupation = p.occupation,
            background = p.background,
            goal = p.investment_goal,
            pain_points = p.concerns.join(", "),
            threshold = p.trust_threshold,
            turns = brief.turn_count,
            trust = brief.final_trust,
            convinced = if brief.is_convinced { "是" } else { "否" },
            end_reason = brief.end_reason.unwrap_or("未知"),
        )
    }

    pub fn evaluation_messages(brief: &EvaluationBrief<'_>) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(Self::evaluation_system()),
            ChatMessage::user(Self::evaluation(brief)),
        ]
    }
}

/// Everything the evaluation prompt shows the oracle.
pub struct EvaluationBrief<'a> {
    pub profile: &'a Profile,
    pub scenario: Option<&'a Scenario>,
    pub mental_state: Option<&'a MentalState>,
    /// Trainee turns as `User`, persona turns as `Assistant`.
    pub transcript: &'a [ChatMessage],
    pub turn_count: u32,
    pub final_trust: i32,
    pub is_convinced: bool,
    pub concerns_addressed: &'a [String],
    pub end_reason: Option<&'a str>,
    pub end_detail: Option<&'a serde_json::Value>,
    pub success: &'a SuccessConditions,
    pub criteria: &'a BTreeMap<String, Criterion>,
}

/// Human-readable pass conditions for the evaluation prompt.
pub fn pass_conditions(success: &SuccessConditions, profile_threshold: i32) -> Vec<String> {
    let ready = if success.requires_ready_to_open_account {
        "用户明确表示准备开户".to_string()
    } else {
        "不要求用户明确表示准备开户".to_string()
    };
    let trust = match success.min_trust_level {
        Some(min) => format!("信任度 ≥ {min}"),
        None if success.trust_at_least_profile_threshold => {
            format!("信任度 ≥ {profile_threshold}")
        }
        None => "不要求信任度达到阈值".to_string(),
    };
    vec![
        format!("解答顾虑数量 ≥ {}", success.min_concerns_addressed),
        ready,
        trust,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sense_core::defaults::{builtin_criteria, builtin_profiles};
    use sense_core::EventImpact;

    #[test]
    fn test_persona_prompt_includes_state_and_events() {
        let profile = &builtin_profiles()[0];
        let event = ScenarioEvent {
            id: "crash".into(),
            name: "大盘暴跌".into(),
            description: "今天大盘跌了3%".into(),
            impact: EventImpact {
                add_context: "你现在更担心亏钱".into(),
            },
            ..ScenarioEvent::default()
        };
        let events = [&event];
        let concerns = vec!["担心被骗".to_string()];
        let ctx = PersonaContext {
            profile,
            scenario: None,
            mental_state: None,
            active_events: &events,
            trust_level: 4,
            concerns_addressed: &concerns,
        };
        let prompt = PromptBuilder::persona_system(&ctx);
        assert!(prompt.contains("张阿姨"));
        assert!(prompt.contains("信任度: 4/10（达到8才会考虑开户）"));
        assert!(prompt.contains("大盘暴跌: 今天大盘跌了3%；你现在更担心亏钱"));
        assert!(prompt.contains("已解答的顾虑: 担心被骗"));
        assert!(!prompt.contains("当前场景"));
    }

    #[test]
    fn test_opening_fallback_uses_profile() {
        let profile = &builtin_profiles()[1];
        let text = PromptBuilder::opening_fallback(profile);
        assert!(text.contains("互联网程序员"));
        assert!(text.contains(&profile.trigger_scenario));
    }

    #[test]
    fn test_pass_conditions_prefer_min_trust_level() {
        let mut success = SuccessConditions::default();
        success.min_trust_level = Some(3);
        let conds = pass_conditions(&success, 9);
        assert_eq!(conds[2], "信任度 ≥ 3");

        success.min_trust_level = None;
        success.trust_at_least_profile_threshold = false;
        let conds = pass_conditions(&success, 9);
        assert_eq!(conds[2], "不要求信任度达到阈值");
    }

    #[test]
    fn test_evaluation_prompt_lists_transcript_and_dimensions() {
        let profile = &builtin_profiles()[0];
        let criteria = builtin_criteria();
        let success = SuccessConditions::default();
        let transcript = vec![
            ChatMessage::assistant("这个安全吗？"),
            ChatMessage::user("阿姨您放心，资金有银行存管。"),
        ];
        let concerns = Vec::new();
        let brief = EvaluationBrief {
            profile,
            scenario: None,
            mental_state: None,
            transcript: &transcript,
            turn_count: 1,
            final_trust: 2,
            is_convinced: false,
            concerns_addressed: &concerns,
            end_reason: Some("max_turns"),
            end_detail: None,
            success: &success,
            criteria: &criteria,
        };
        let messages = PromptBuilder::evaluation_messages(&brief);
        assert_eq!(messages.len(), 2);
        let prompt = &messages[1].content;
        assert!(prompt.contains("用户(小白): 这个安全吗？"));
        assert!(prompt.contains("产品经理: 阿姨您放心"));
        assert!(prompt.contains("\"communication_skills\": 分数,"));
        assert!(prompt.contains("\"professionalism\": 分数\n"));
        assert!(prompt.contains("结束原因: max_turns"));
    }
}
