use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use sourcebot::analyzer::QueryNormalizer;
use sourcebot::config::Config;
use sourcebot::data_models::InboundMessage;
use sourcebot::dialogue::Dialogue;
use sourcebot::logging::{self, ConversationLog};
use sourcebot::search::GoogleSearchClient;
use sourcebot::smalltalk::{RandomPicker, SmalltalkMatcher, SmalltalkTable};
use sourcebot::telegram::TelegramClient;
use sourcebot::telegram::poller::UpdatePoller;
use sourcebot::transport::{ChatTransport, ConsoleTransport};

#[derive(Parser)]
#[command(version, about = "Answers women's health questions with web search summaries")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot (default)
    Serve,
    /// Answer a single question on stdout
    Ask {
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    logging::init(&config.log)?;
    tracing::debug!(?config, "configuration loaded");

    let log = ConversationLog::new();
    let table = SmalltalkTable::load(&config.smalltalk_data)
        .with_context(|| format!("failed to load {}", config.smalltalk_data.display()))?;
    let smalltalk = SmalltalkMatcher::new(table, Box::new(RandomPicker));
    let search = GoogleSearchClient::from_config(&config, log)
        .context("failed to build search client")?;

    let dialogue = Arc::new(
        Dialogue::new(QueryNormalizer::default(), smalltalk, Arc::new(search), log)
            .with_result_limit(config.search_result_limit),
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, dialogue).await,
        Command::Ask { text } => {
            let message = InboundMessage::new(0, 0, text.join(" "));
            let transport: Arc<dyn ChatTransport> = Arc::new(ConsoleTransport);
            let outcome = dialogue.dispatch(message, transport).await?;
            tracing::debug!(?outcome, "ask finished");
            Ok(())
        }
    }
}

async fn serve(config: &Config, dialogue: Arc<Dialogue>) -> anyhow::Result<()> {
    let token = config.telegram_token()?;
    let client = Arc::new(
        TelegramClient::new(&config.telegram_api_url, token)
            .context("failed to build Telegram client")?,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                cancel.cancel();
            }
        });
    }

    tracing::info!("Bot is starting...");
    UpdatePoller::new(client, dialogue).run(cancel).await;
    Ok(())
}
