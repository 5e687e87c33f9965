use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxconv::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxconv::AppCommand {
    fn from(cmd: Commands) -> fxconv::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => {
                fxconv::AppCommand::Convert { amount, from, to }
            }
            Commands::Rates { from } => fxconv::AppCommand::Rates { from },
            Commands::Spotlight { from } => fxconv::AppCommand::Spotlight { from },
            Commands::Interactive { from, to } => fxconv::AppCommand::Interactive { from, to },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert
        #[arg(allow_hyphen_values = true)]
        amount: Option<String>,
        /// Currency to convert from
        #[arg(short, long)]
        from: Option<String>,
        /// Currency to convert to
        #[arg(short, long)]
        to: Option<String>,
    },
    /// List every currency with its rate against the base
    Rates {
        /// Base currency
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Display rates of popular currencies against the base
    Spotlight {
        /// Base currency
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Start an interactive converter session
    Interactive {
        /// Currency to convert from
        #[arg(short, long)]
        from: Option<String>,
        /// Currency to convert to
        #[arg(short, long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxconv::cli::setup::setup(),
        Some(cmd) => fxconv::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
