//! Progress ledger: coins, daily history, rewards and tasks.
//!
//! Every operation re-reads the whole progress document from the store,
//! mutates it, and writes it back before returning. There is no merge; the
//! last writer wins. Reading the document immediately before each write keeps
//! sibling operations in the same turn (a finished session and a completed
//! task, say) from clobbering each other.

mod document;

pub use document::{DailyStats, ProgressDocument, ProgressSummary, Reward, Task};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{self, keys, KvStore, LedgerConfig};

/// Outcome of [`ProgressLedger::redeem_reward`]. Only `Redeemed` changes
/// the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Redemption {
    Redeemed,
    InsufficientCoins,
    AlreadyRedeemed,
    UnknownReward,
}

/// Longest window [`ProgressLedger::recent_days`] will build.
pub const MAX_HISTORY_DAYS: u32 = 3660;

/// One day of activity, for history views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub stats: DailyStats,
}

#[derive(Clone)]
pub struct ProgressLedger {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl ProgressLedger {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current document. Created and persisted with the starting balance on
    /// first access; an unparsable document is replaced the same way. A store
    /// read error is returned as is and nothing is written.
    pub fn document(&self) -> Result<ProgressDocument> {
        if let Some(doc) = storage::read_document(self.store.as_ref(), keys::PROGRESS)? {
            return Ok(doc);
        }
        let doc = ProgressDocument::new(self.config.initial_coins);
        tracing::info!(coins = doc.coins, "initialising progress document");
        self.persist(&doc)?;
        Ok(doc)
    }

    fn persist(&self, doc: &ProgressDocument) -> Result<()> {
        storage::write_document(self.store.as_ref(), keys::PROGRESS, doc)
    }

    /// Read-modify-persist. The closure reports whether it changed anything;
    /// unchanged documents are not rewritten.
    fn update<T>(&self, f: impl FnOnce(&mut ProgressDocument, NaiveDate) -> (bool, T)) -> Result<T> {
        let mut doc = self.document()?;
        let (changed, out) = f(&mut doc, self.clock.today());
        if changed {
            self.persist(&doc)?;
        }
        Ok(out)
    }

    /// Counts one finished focus session for today and awards coins.
    pub fn record_focus_session(&self, minutes: u64, coins_earned: u64) -> Result<ProgressDocument> {
        self.update(|doc, today| {
            let day = doc.day_mut(today);
            day.focus_sessions = day.focus_sessions.saturating_add(1);
            day.focus_minutes = day.focus_minutes.saturating_add(minutes);
            doc.coins = doc.coins.saturating_add(coins_earned);
            tracing::debug!(minutes, coins_earned, coins = doc.coins, "focus session recorded");
            (true, doc.clone())
        })
    }

    pub fn record_break(&self, minutes: u64) -> Result<ProgressDocument> {
        self.update(|doc, today| {
            let day = doc.day_mut(today);
            day.break_minutes = day.break_minutes.saturating_add(minutes);
            tracing::debug!(minutes, "break recorded");
            (true, doc.clone())
        })
    }

    /// Counts a completed task for today, awards the completion bonus and
    /// marks the task with `task_id` (if present) completed.
    pub fn record_task_completion(&self, task_id: &str) -> Result<ProgressDocument> {
        let bonus = self.config.task_completion_bonus;
        self.update(|doc, today| {
            let day = doc.day_mut(today);
            day.tasks_completed = day.tasks_completed.saturating_add(1);
            doc.coins = doc.coins.saturating_add(bonus);
            if let Some(task) = doc.tasks.iter_mut().find(|t| t.id == task_id) {
                task.completed = true;
            }
            tracing::debug!(task_id, bonus, "task completion recorded");
            (true, doc.clone())
        })
    }

    /// Redeem a reward by id. Rejected without mutation if the reward is
    /// unknown, already redeemed, or costs more than the balance.
    pub fn redeem_reward(&self, reward_id: &str) -> Result<Redemption> {
        let now = self.clock.now();
        self.update(|doc, _| {
            let coins = doc.coins;
            let Some(reward) = doc.rewards.iter_mut().find(|r| r.id == reward_id) else {
                return (false, Redemption::UnknownReward);
            };
            if reward.redeemed {
                return (false, Redemption::AlreadyRedeemed);
            }
            if coins < reward.cost {
                return (false, Redemption::InsufficientCoins);
            }
            reward.redeemed = true;
            reward.redeemed_at = Some(now);
            let cost = reward.cost;
            doc.coins -= cost;
            tracing::info!(reward_id, cost, coins = doc.coins, "reward redeemed");
            (true, Redemption::Redeemed)
        })
    }

    /// Deduct `amount` if the balance covers it. Returns whether it applied.
    pub fn spend_coins(&self, amount: u64) -> Result<bool> {
        self.update(|doc, _| {
            if doc.coins >= amount {
                doc.coins -= amount;
                (true, true)
            } else {
                (false, false)
            }
        })
    }

    pub fn create_task(&self, title: &str) -> Result<Task> {
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            completed: false,
            created_at: Some(self.clock.now()),
        };
        self.update(|doc, _| {
            doc.tasks.push(task.clone());
            (true, ())
        })?;
        Ok(task)
    }

    pub fn create_reward(&self, name: &str, cost: u64) -> Result<Reward> {
        let reward = Reward {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            cost,
            redeemed: false,
            redeemed_at: None,
        };
        self.update(|doc, _| {
            doc.rewards.push(reward.clone());
            (true, ())
        })?;
        Ok(reward)
    }

    /// Today's counters (zeroed if nothing was recorded yet).
    pub fn today(&self) -> Result<DailyStats> {
        Ok(self.document()?.day(self.clock.today()))
    }

    pub fn summary(&self) -> Result<ProgressSummary> {
        Ok(ProgressSummary::from(&self.document()?))
    }

    /// The last `days` days ending today, newest first, zero-filled. At most
    /// [`MAX_HISTORY_DAYS`] days are returned, and never any before the
    /// earliest representable date.
    pub fn recent_days(&self, days: u32) -> Result<Vec<DayActivity>> {
        let doc = self.document()?;
        let today = self.clock.today();
        Ok((0..i64::from(days.min(MAX_HISTORY_DAYS)))
            .map_while(|offset| today.checked_sub_signed(Duration::days(offset)))
            .map(|date| DayActivity {
                date,
                stats: doc.day(date),
            })
            .collect())
    }
}
