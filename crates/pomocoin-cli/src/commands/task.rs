//! Task management commands for CLI.

use clap::Subcommand;
use pomocoin_core::{Config, CoreError, ValidationError};
use serde_json::json;

use super::{print_json, settled_ledger, CommandResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Mark a task completed and collect the bonus
    Complete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction, config: &Config) -> CommandResult {
    let ledger = settled_ledger(config)?;
    match action {
        TaskAction::Add { title } => {
            if title.trim().is_empty() {
                return Err(CoreError::from(ValidationError::InvalidValue {
                    field: "title".into(),
                    message: "must not be empty".into(),
                })
                .into());
            }
            print_json(&ledger.create_task(title.trim())?)?;
        }
        TaskAction::List { all } => {
            let doc = ledger.document()?;
            let tasks: Vec<_> = doc.tasks.iter().filter(|t| all || !t.completed).collect();
            print_json(&tasks)?;
        }
        TaskAction::Complete { id } => {
            let doc = ledger.document()?;
            let Some(task) = doc.task(&id) else {
                return Err(CoreError::from(ValidationError::NotFound { kind: "task", id }).into());
            };
            if task.completed {
                return Err(CoreError::Custom(format!("task '{id}' is already completed")).into());
            }
            let doc = ledger.record_task_completion(&id)?;
            print_json(&json!({
                "task": doc.task(&id),
                "bonus": ledger.config().task_completion_bonus,
                "coins": doc.coins,
            }))?;
        }
    }
    Ok(())
}
