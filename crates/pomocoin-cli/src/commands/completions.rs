use clap_complete::{generate, Shell};

use super::CommandResult;

pub fn run(shell: Shell, command: &mut clap::Command) -> CommandResult {
    let name = command.get_name().to_string();
    generate(shell, command, name, &mut std::io::stdout());
    Ok(())
}
