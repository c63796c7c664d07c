//! Daily meal-advice prompt construction.
//!
//! Pure and deterministic: the same timestamp always produces a
//! byte-identical prompt. Timestamps are normalized to Taiwan time (UTC+8)
//! regardless of host timezone before the weekday is computed.

use chrono::{DateTime, Datelike, FixedOffset, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Keyword that addresses the bot in a chat message.
pub const TRIGGER_KEYWORD: &str = "@雞蛋鳥健康助手";

/// Sub-phrase that requests today's meal advice after the trigger keyword.
pub const TEST_PHRASE: &str = "測試";

/// Reply when the trigger keyword arrives with no further text.
pub const GREETING_REPLY: &str = "雞蛋鳥健康助手登場！";

/// Reply when the bot joins a chat.
pub const WELCOME_MESSAGE: &str =
    "摯愛的母親早安！我是雞蛋鳥健康助手，以後每天早上 8 點會準時提醒您吃飯喔！";

/// Prefix for the scheduled morning broadcast.
pub const BROADCAST_GREETING: &str = "早安！";

/// How the weekday schedule reminder is rendered into the prompt.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Interpolate today's schedule clause (default).
    #[default]
    Dynamic,
    /// One fixed instruction listing every weekday; the model picks.
    Static,
}

/// Shared template head: persona/format line plus the dietary constraints.
const TEMPLATE_HEAD: &str = "請在 200 字以內給我母親今天的三餐飲食建議。\n\
你的回覆格式要是「摯愛的母親早安！雞蛋鳥今天建議你早餐吃XXX，午餐吃XXX，晚餐吃XXX，保持健康愉快好心情，就跟我吃杏仁一樣！」。\n\
\n\
請根據以下條件給出建議：\n\
IMPORTANT : 請用台灣常用語句、繁體中文回答。\n\
1. 母親今年 60 歲，BMI 較低，需要吃較多蛋白質和熱量\n\
2. 母親早餐較常吃吐司、蛋餅、漢堡、三明治等西式麵包類食物，午晚餐類別豐富，可以是便當，可以是日本料理或韓式料理，也可以是西餐。\n\
3. 請考慮健康狀況自由組合她合適的三餐，並且按照我給你的格式回覆就好，不要講額外的話。\n";

/// Static-mode closing bullet: all weekday branches in one instruction.
const STATIC_SCHEDULE_LINE: &str = "4. 此外，可以在最後根據當天是禮拜幾，加上額外行程通知：\
禮拜一她要去針灸，禮拜二禮拜三禮拜四要打太極拳，禮拜六禮拜天提醒她要出門走走。";

/// Schedule reminder clause for a given weekday. Exhaustive by construction.
pub fn schedule_clause(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "今天是禮拜一，提醒媽媽今天要去推拿。",
        Weekday::Tue => "今天是禮拜二，提醒媽媽早上要針灸，晚上要打太極拳。",
        Weekday::Wed => "今天是禮拜三，提醒媽媽晚上要打太極拳。",
        Weekday::Thu => "今天是禮拜四，提醒媽媽早上要針灸，晚上要打太極拳。",
        Weekday::Fri => "今天是禮拜五，又是開心的一天！",
        Weekday::Sat => "今天是禮拜六，週末愉快！提醒媽媽要出門走走，曬曬太陽。",
        Weekday::Sun => "今天是禮拜天，提醒媽媽要出門走走，放鬆心情。",
    }
}

/// Taiwan offset. Always valid; chrono only rejects offsets beyond +-24h.
fn taiwan_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}

/// Build the daily meal-advice prompt for the given instant.
pub fn daily_prompt(now: DateTime<Utc>, mode: PromptMode) -> String {
    match mode {
        PromptMode::Dynamic => {
            let weekday = now.with_timezone(&taiwan_offset()).weekday();
            let clause = schedule_clause(weekday);
            format!("{TEMPLATE_HEAD}4. 此外，請務必在最後加上這句行程提醒：「{clause}」\n")
        }
        PromptMode::Static => format!("{TEMPLATE_HEAD}{STATIC_SCHEDULE_LINE}\n"),
    }
}
