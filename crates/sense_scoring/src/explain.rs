use sense_persona::{EndDetail, EndReason, LOW_TRUST_QUIT};

/// Fixed-template sentence for why the session stopped. Never needs the
/// oracle; for `user_quit` a recorded quit explanation is used verbatim.
pub fn end_explanation(
    reason: Option<EndReason>,
    detail: &EndDetail,
    final_trust: i32,
    turn_count: u32,
) -> String {
    match reason {
        Some(EndReason::Success) => "用户被成功说服并愿意开户，本局以成功结束。".to_string(),
        Some(EndReason::TrustFull) => format!(
            "用户对你的信任已达到满分（{final_trust}/10），训练目标达成，系统直接进入结算。"
        ),
        Some(EndReason::ConcernsFull) => match (detail.concerns_addressed, detail.total_concerns) {
            (Some(addressed), Some(total)) => format!(
                "用户的主要顾虑已全部解答（{addressed}/{total}），训练目标达成，系统直接进入结算。"
            ),
            _ => "用户的主要顾虑已全部解答，训练目标达成，系统直接进入结算。".to_string(),
        },
        Some(EndReason::MaxTurns) => {
            format!("对话已达到轮数上限（{turn_count} 轮），系统自动结束并进入结算。")
        }
        Some(EndReason::UserQuit) => {
            if let Some(text) = non_blank(detail.quit_explanation.as_deref()) {
                return text.to_string();
            }
            if non_blank(detail.quit_reason.as_deref()) == Some(LOW_TRUST_QUIT) {
                format!("用户信任度已降至 {final_trust}/10，用户对继续沟通失去兴趣，选择结束对话。")
            } else {
                "用户在对话过程中失去兴趣/不愿继续，因此提前结束对话。".to_string()
            }
        }
        None => "对话已结束，进入结算。".to_string(),
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
