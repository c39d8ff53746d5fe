//! Built-in catalog used whenever no training config file can be read.

use crate::model::Profile;
use crate::training::Criterion;
use std::collections::BTreeMap;

#[allow(clippy::too_many_arguments)]
fn profile(
    id: u32,
    name: &str,
    age: u32,
    occupation: &str,
    background: &str,
    investment_goal: &str,
    risk_tolerance: &str,
    concerns: [&str; 4],
    trigger_scenario: &str,
    trust_threshold: i32,
    personality: &str,
) -> Profile {
    Profile {
        id,
        name: name.to_string(),
        age,
        occupation: occupation.to_string(),
        background: background.to_string(),
        investment_goal: investment_goal.to_string(),
        risk_tolerance: risk_tolerance.to_string(),
        concerns: concerns.iter().map(|c| c.to_string()).collect(),
        trigger_scenario: trigger_scenario.to_string(),
        trust_threshold,
        personality: personality.to_string(),
        default_scenario_id: None,
        default_mental_state_id: None,
    }
}

pub fn builtin_profiles() -> Vec<Profile> {
    vec![
        profile(
            1,
            "张阿姨",
            55,
            "退休教师",
            "刚退休，有一笔积蓄想保值增值，对股票完全不懂，孩子建议她学习理财",
            "稳健保值，跑赢银行存款利率",
            "极低",
            ["担心被骗", "不会用手机App", "对专业术语恐惧", "害怕亏钱"],
            "儿子推荐她下载了腾讯自选股",
            8,
            "谨慎、爱问问题、需要反复确认安全性",
        ),
        profile(
            2,
            "小王",
            26,
            "互联网程序员",
            "工作3年攒了一些钱，看到同事炒股赚钱了也想试试，但怕亏",
            "想快速积累财富，对高收益有兴趣",
            "中等",
            ["不知道从哪开始", "担心入场时机不对", "没时间盯盘", "对股票术语不熟"],
            "看到比特币暴涨的新闻，想了解什么是比特币和如何投资",
            6,
            "好奇心强、学习能力强、但容易被FOMO情绪影响",
        ),
        profile(
            3,
            "李姐",
            38,
            "全职妈妈",
            "以前在银行工作过，对理财有基础认知，现在全职带娃，想利用碎片时间投资",
            "为孩子教育基金做长期投资",
            "中低",
            ["时间碎片化", "担心影响家庭开支", "需要老公同意", "想要简单易操作"],
            "朋友推荐说腾讯自选股可以定投基金",
            7,
            "理性、有主见、但需要家人支持",
        ),
        profile(
            4,
            "老刘",
            48,
            "个体户老板",
            "做生意多年，手里有闲钱，以前炒过股亏过，对股市有阴影",
            "分散投资，不想把鸡蛋放一个篮子里",
            "中等",
            ["曾经被套牢的心理阴影", "不相信推荐", "怕被割韭菜", "对券商有不信任感"],
            "听说现在的智能投顾不一样了，想再了解一下",
            9,
            "多疑、爱抬杠、需要看到实际数据",
        ),
        profile(
            5,
            "小陈",
            22,
            "大四学生",
            "即将毕业，有一点实习赚的钱想试试投资，看了很多财经博主的视频",
            "学习投资，积累经验，小额尝试",
            "较高（因为本金少）",
            ["本金少", "怕被嘲笑不懂", "信息来源混乱", "容易被网红观点影响"],
            "刷到一个财经博主说现在是入场好时机",
            5,
            "冲动、好学、但缺乏判断力",
        ),
    ]
}

/// The five qualitative dimensions and their default weights (sum 1.0).
pub fn builtin_criteria() -> BTreeMap<String, Criterion> {
    [
        ("communication_skills", "沟通技巧", "是否能用通俗易懂的语言解释专业概念", 0.25),
        ("empathy", "同理心", "是否能理解用户的担忧和需求", 0.25),
        ("problem_solving", "问题解决", "是否能有效解答用户疑虑", 0.2),
        ("persuasion", "说服力", "是否能逐步建立信任并引导开户", 0.2),
        ("professionalism", "专业度", "对产品和投资知识的掌握程度", 0.1),
    ]
    .into_iter()
    .map(|(key, name, description, weight)| {
        (
            key.to_string(),
            Criterion {
                name: name.to_string(),
                description: description.to_string(),
                weight,
            },
        )
    })
    .collect()
}
