use clap::Subcommand;
use pomocoin_core::{Config, CoreError, Redemption, ValidationError};
use serde_json::json;

use super::{print_json, settled_ledger, CommandResult};

#[derive(Subcommand)]
pub enum RewardAction {
    /// Create a reward
    Add {
        name: String,
        /// Price in coins
        cost: u64,
    },
    /// List rewards
    List,
    /// Buy a reward with coins
    Redeem {
        /// Reward ID
        id: String,
    },
}

pub fn run(action: RewardAction, config: &Config) -> CommandResult {
    let ledger = settled_ledger(config)?;
    match action {
        RewardAction::Add { name, cost } => {
            print_json(&ledger.create_reward(&name, cost)?)?;
        }
        RewardAction::List => {
            print_json(&ledger.document()?.rewards)?;
        }
        RewardAction::Redeem { id } => match ledger.redeem_reward(&id)? {
            Redemption::Redeemed => {
                let doc = ledger.document()?;
                print_json(&json!({
                    "reward": doc.reward(&id),
                    "coins": doc.coins,
                }))?;
            }
            Redemption::UnknownReward => {
                return Err(CoreError::from(ValidationError::NotFound { kind: "reward", id }).into());
            }
            Redemption::AlreadyRedeemed => {
                return Err(CoreError::Custom(format!("reward '{id}' was already redeemed")).into());
            }
            Redemption::InsufficientCoins => {
                let coins = ledger.document()?.coins;
                return Err(CoreError::Custom(format!(
                    "not enough coins for reward '{id}' (have {coins})"
                ))
                .into());
            }
        },
    }
    Ok(())
}
