use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use devpilot::chat::ChatSession;
use devpilot::config::Settings;
use devpilot::monitor::{Monitor, MonitorError};

mod prompt;
mod session;

use prompt::rustyline::RustylinePrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to the assistant interactively (the default)
    Chat,

    /// Answer a single request and exit
    Ask {
        /// What to ask, e.g. "list my public repos"
        text: String,

        /// Print each tool the agent called before the answer
        #[arg(long)]
        steps: bool,
    },

    /// Check Supabase for slow queries once and email an alert if needed
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let chat = ChatSession::start(&settings).await;
            let mut session = Session::new(chat, Box::new(RustylinePrompt::new()?));
            session.start().await?;
        }
        Command::Ask { text, steps } => {
            let chat = ChatSession::start(&settings).await;
            let mut session = Session::new(chat, Box::new(RustylinePrompt::new()?));
            let output = session.headless_start(&text, steps).await?;
            println!("{}", output);
        }
        Command::Watch => watch(&settings).await?,
    }
    Ok(())
}

async fn watch(settings: &Settings) -> Result<()> {
    let monitor = match Monitor::from_settings(settings) {
        Ok(monitor) => monitor,
        Err(MonitorError::MissingCredentials(reason)) => {
            tracing::error!("Supabase URL and Key must be set in the .env file: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let outcome = monitor.run_once().await;
    tracing::debug!(?outcome, "monitoring pass finished");
    Ok(())
}
