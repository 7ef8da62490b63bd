use clap::{CommandFactory, Parser, Subcommand};
use pomocoin_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pomocoin", version, about = "Pomodoro timer that pays coins for focus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Timer settings (durations, coins, auto-start)
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Coins and daily history
    Ledger {
        #[command(subcommand)]
        action: commands::ledger::LedgerAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Rewards bought with coins
    Reward {
        #[command(subcommand)]
        action: commands::reward::RewardAction,
    },
    /// Application configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("POMOCOIN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_logging(&config);

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, &config),
        Commands::Settings { action } => commands::settings::run(action, &config),
        Commands::Ledger { action } => commands::ledger::run(action, &config),
        Commands::Task { action } => commands::task::run(action, &config),
        Commands::Reward { action } => commands::reward::run(action, &config),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
