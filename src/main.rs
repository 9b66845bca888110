use std::io::Stdout;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};

use challenge_chat::application::ports::{CompletionClient, MessageRepository};
use challenge_chat::application::services::ChatSession;
use challenge_chat::domain::ConversationId;
use challenge_chat::infrastructure::backend::{MockChatBackend, create_http_chat_backend};
use challenge_chat::infrastructure::observability::{TracingConfig, init_tracing};
use challenge_chat::presentation::{Environment, ScaffoldConfig, Settings, TranscriptPrinter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(TracingConfig::from_settings(
        environment.as_str(),
        &settings.logging,
    ));

    let conversation_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CHAT_CONVERSATION_ID").ok())
        .map(ConversationId::new)
        .ok_or_else(|| anyhow!("usage: challenge-chat <challenge-id>"))?;

    let scaffold = ScaffoldConfig::default();
    if scaffold.enabled {
        tracing::info!("Scaffold mode: using in-memory backend");
        let backend = MockChatBackend::new().with_response_delay(scaffold.response_delay);
        run(Arc::new(backend), conversation_id, &settings).await
    } else {
        let backend = create_http_chat_backend(&settings.backend, settings.chat.stream_framing)?;
        tracing::info!(base_url = %settings.backend.base_url, "Using HTTP backend");
        run(Arc::new(backend), conversation_id, &settings).await
    }
}

async fn run<B>(
    backend: Arc<B>,
    conversation_id: ConversationId,
    settings: &Settings,
) -> anyhow::Result<()>
where
    B: MessageRepository + CompletionClient + 'static,
{
    let session = ChatSession::open(conversation_id, backend, settings.chat.partial_reply).await?;

    let mut printer = TranscriptPrinter::new(std::io::stdout());
    printer.print_history(&session.messages())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !submit_line(&session, &mut printer, line.trim_end()).await? {
            break;
        }
    }

    session.close();
    Ok(())
}

/// Submits one line and streams the reply. Returns `false` once the user interrupts.
async fn submit_line<B>(
    session: &ChatSession<B>,
    printer: &mut TranscriptPrinter<Stdout>,
    line: &str,
) -> anyhow::Result<bool>
where
    B: MessageRepository + CompletionClient + 'static,
{
    let mut log_updates = session.subscribe_messages();
    let submit = session.submit(line);
    tokio::pin!(submit);

    let result = loop {
        tokio::select! {
            result = &mut submit => break Some(result),
            changed = log_updates.changed() => {
                if changed.is_ok() {
                    let log = log_updates.borrow_and_update().clone();
                    printer.render(&log)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.close();
                break None;
            }
        }
    };

    let log = log_updates.borrow_and_update().clone();
    printer.render(&log)?;

    match result {
        Some(Ok(_)) => printer.finish_reply()?,
        Some(Err(e)) if e.is_retryable() => {
            printer.finish_reply()?;
            printer.notice(&format!("{e} (retry by sending it again)"))?;
            let restored = session.input();
            if !restored.is_empty() {
                printer.notice(&format!("not sent: {restored}"))?;
            }
        }
        Some(Err(e)) => {
            printer.finish_reply()?;
            printer.notice(&e.to_string())?;
        }
        None => {
            printer.finish_reply()?;
            printer.notice("interrupted")?;
            return Ok(false);
        }
    }

    Ok(true)
}
