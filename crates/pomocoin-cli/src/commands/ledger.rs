use clap::Subcommand;
use pomocoin_core::{Clock, Config, CoreError, SystemClock};
use serde_json::json;

use super::{print_json, settled_ledger, CommandResult};

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Print the whole progress document
    Show,
    /// Today's counters
    Today,
    /// All-time totals
    Summary,
    /// Per-day counters, newest first
    History {
        /// Number of days to show (at most 3660)
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Spend coins outside of a reward
    Spend {
        amount: u64,
    },
}

pub fn run(action: LedgerAction, config: &Config) -> CommandResult {
    let ledger = settled_ledger(config)?;
    match action {
        LedgerAction::Show => {
            print_json(&ledger.document()?)?;
        }
        LedgerAction::Today => {
            let stats = ledger.today()?;
            print_json(&json!({
                "date": SystemClock.today(),
                "stats": stats,
            }))?;
        }
        LedgerAction::Summary => {
            print_json(&ledger.summary()?)?;
        }
        LedgerAction::History { days } => {
            print_json(&ledger.recent_days(days)?)?;
        }
        LedgerAction::Spend { amount } => {
            if !ledger.spend_coins(amount)? {
                let coins = ledger.document()?.coins;
                return Err(CoreError::Custom(format!(
                    "insufficient coins: need {amount}, have {coins}"
                ))
                .into());
            }
            print_json(&json!({ "coins": ledger.document()?.coins }))?;
        }
    }
    Ok(())
}
