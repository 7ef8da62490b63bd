use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-day counters, keyed by ISO date in [`ProgressDocument::history`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    #[serde(default, alias = "pomodoros")]
    pub focus_sessions: u64,
    #[serde(default, alias = "focusTime")]
    pub focus_minutes: u64,
    #[serde(default, alias = "breakTime")]
    pub break_minutes: u64,
    #[serde(default)]
    pub tasks_completed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub cost: u64,
    #[serde(default)]
    pub redeemed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// The persisted ledger: coins, daily history, rewards and tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    #[serde(default)]
    pub coins: u64,
    #[serde(default)]
    pub history: BTreeMap<NaiveDate, DailyStats>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ProgressDocument {
    pub fn new(initial_coins: u64) -> Self {
        Self {
            coins: initial_coins,
            history: BTreeMap::new(),
            rewards: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Counters for `date`, created zeroed if missing.
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DailyStats {
        self.history.entry(date).or_default()
    }

    pub fn day(&self, date: NaiveDate) -> DailyStats {
        self.history.get(&date).copied().unwrap_or_default()
    }

    pub fn reward(&self, id: &str) -> Option<&Reward> {
        self.rewards.iter().find(|r| r.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn redeemed_rewards(&self) -> impl Iterator<Item = &Reward> {
        self.rewards.iter().filter(|r| r.redeemed)
    }
}

/// All-time totals for the progress page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub coins: u64,
    pub total_focus_sessions: u64,
    pub total_focus_minutes: u64,
    pub total_break_minutes: u64,
    pub total_tasks_completed: u64,
    pub active_days: usize,
    pub rewards_redeemed: usize,
    pub coins_spent_on_rewards: u64,
    pub open_tasks: usize,
}

impl From<&ProgressDocument> for ProgressSummary {
    fn from(doc: &ProgressDocument) -> Self {
        let mut summary = ProgressSummary {
            coins: doc.coins,
            ..Default::default()
        };
        for day in doc.history.values() {
            summary.total_focus_sessions =
                summary.total_focus_sessions.saturating_add(day.focus_sessions);
            summary.total_focus_minutes =
                summary.total_focus_minutes.saturating_add(day.focus_minutes);
            summary.total_break_minutes =
                summary.total_break_minutes.saturating_add(day.break_minutes);
            summary.total_tasks_completed =
                summary.total_tasks_completed.saturating_add(day.tasks_completed);
            if *day != DailyStats::default() {
                summary.active_days += 1;
            }
        }
        for reward in doc.redeemed_rewards() {
            summary.rewards_redeemed += 1;
            summary.coins_spent_on_rewards =
                summary.coins_spent_on_rewards.saturating_add(reward.cost);
        }
        summary.open_tasks = doc.tasks.iter().filter(|t| !t.completed).count();
        summary
    }
}
