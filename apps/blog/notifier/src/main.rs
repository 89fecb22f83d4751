//! Blog Notifier
//!
//! Delivers change notifications, publishes scheduled posts and sends the
//! daily digest. Runs as a long-lived service or as a one-shot job.

use blog_notifier::{Mode, run};
use clap::{Parser, Subcommand};
use core_config::tracing::install_color_eyre;
use eyre::Result;

#[derive(Parser)]
#[command(name = "blog-notifier")]
#[command(about = "Deliver blog notifications, publish scheduled posts and send the daily digest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cron jobs and delivery workers until interrupted
    Serve {
        /// Cron expression for the publication sweep (default: SWEEP_CRON or every minute)
        #[arg(long)]
        sweep_cron: Option<String>,

        /// Cron expression for the daily digest (default: DIGEST_CRON or 09:00 daily)
        #[arg(long)]
        digest_cron: Option<String>,
    },

    /// Publish due posts once and deliver their notifications
    Sweep,

    /// Send the daily digest once
    Digest,
}

impl From<Commands> for Mode {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Serve {
                sweep_cron,
                digest_cron,
            } => Mode::Serve {
                sweep_cron,
                digest_cron,
            },
            Commands::Sweep => Mode::Sweep,
            Commands::Digest => Mode::Digest,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    run(cli.command.into()).await
}
