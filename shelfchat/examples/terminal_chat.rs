//! Terminal chat example.
//!
//! Reads lines from stdin, streams each reply through the provider chain and
//! types it out in the terminal. Without any provider configured it runs
//! against a scripted offline provider.
//!
//! Run with:
//! ```bash
//! CHAT_GATEWAY_KEY=your-key RUST_LOG=shelfchat=debug cargo run --example terminal_chat
//! ```
//!
//! Commands: `/new`, `/list`, `/search <text>`, `/clear`, `/quit`.

use shelfchat::prelude::*;
use shelfchat::{MessageId, MockAdapter};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

fn offline_session(config: &ShelfchatConfig) -> anyhow::Result<ChatSession> {
    let scripted = MockAdapter::sse_tokens(
        "offline",
        [
            "You can add a book ",
            "from the Shelf page: ",
            "press \"Add\", ",
            "fill in the title and author, ",
            "then save. 📚",
        ],
    )
    .with_chunk_delay(Duration::from_millis(120));

    let renderer = TypingRenderer::new(config.typing.clone());
    let orchestrator = FallbackOrchestrator::new(vec![Arc::new(scripted)], renderer);
    let store = config.store(Arc::new(StaticAuth::anonymous()))?;
    Ok(ChatSession::new(orchestrator, store))
}

/// Print typed text as it is revealed.
fn spawn_printer(renderer: TypingRenderer, cursor: String) {
    let mut views = renderer.subscribe();
    tokio::spawn(async move {
        let mut current: Option<MessageId> = None;
        let mut printed = 0usize;

        loop {
            let view = match views.recv().await {
                Ok(view) => view,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Printer fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if current != Some(view.message_id) {
                current = Some(view.message_id);
                printed = 0;
                print!("\nassistant> ");
            }

            let text = view
                .content
                .strip_suffix(cursor.as_str())
                .unwrap_or(&view.content);
            match view.phase {
                TypingPhase::Retracted => {
                    println!(" [withdrawn]");
                    printed = 0;
                    current = None;
                }
                _ => {
                    if let Some(fresh) = text.get(printed..) {
                        print!("{fresh}");
                        printed = text.len();
                    }
                    if view.phase == TypingPhase::Final {
                        println!();
                    }
                }
            }
            let _ = std::io::stdout().flush();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = ShelfchatConfig::from_env()?;
    let mut session = match config.build_session(Arc::new(StaticAuth::anonymous())) {
        Ok(session) => session,
        Err(ChatError::Configuration(reason)) => {
            eprintln!("({reason}; using the offline provider)");
            offline_session(&config)?
        }
        Err(e) => return Err(e.into()),
    };

    spawn_printer(session.renderer(), config.typing.cursor.clone());
    println!("Shelf assistant. Type a question, or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/new" => {
                session.new_chat();
                println!("(new conversation)");
            }
            "/list" => {
                for item in session.conversations(Some(20)).await? {
                    println!("  {}  {}", item.id, item.title);
                }
            }
            "/clear" => {
                session.delete_all().await?;
                println!("(all conversations deleted)");
            }
            _ if line.starts_with("/search ") => {
                let query = line.trim_start_matches("/search ");
                for item in session.search(query).await? {
                    println!("  {}  {}", item.id, item.title);
                }
            }
            input => match session.send(input).await {
                Ok(reply) => {
                    tracing::debug!(provider = %reply.provider_id, "Reply received");
                    if let Some(view) = session.renderer().finished().await {
                        tracing::trace!(chars = view.total, "Typing finished");
                    }
                }
                Err(e) => eprintln!("\nerror: {e}"),
            },
        }
    }

    Ok(())
}
