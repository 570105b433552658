//! Terminal front-end for the inline chat and search dialogs.
//!
//! Reads lines from stdin and feeds them to the selected dialog as key
//! presses. Streamed assistant text is printed as it arrives.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use inline_chat::chat::{ChatBackend, ChatController, HttpChatBackend, StreamOutcome};
use inline_chat::config::{AppConfig, DialogMode};
use inline_chat::dialog::{
    CompactSearch, DialogHost, DialogView, InlineChat, KeyPress, NO_RECENTS_LABEL, ReplyHandle,
    SearchDialog, SearchSettings,
};
use inline_chat::session::{ListEvent, MessageRole};

/// Host that records dismissal so the input loop can exit.
#[derive(Debug, Default)]
struct TerminalHost {
    closed: AtomicBool,
}

impl TerminalHost {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl DialogHost for TerminalHost {
    fn on_close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn on_expand(&self, expanded: bool) {
        debug!(name: "dialog.expand", expanded, "Compact search expanded");
    }
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Text(String),
    Suggestion(usize),
    Recent,
    Stop,
    Reload,
    Close,
}

impl Command {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "/close" | "/quit" => Self::Close,
            "/stop" => Self::Stop,
            "/reload" => Self::Reload,
            "/recent" => Self::Recent,
            other => other
                .strip_prefix('/')
                .and_then(|n| n.parse().ok())
                .map_or_else(|| Self::Text(line.to_string()), Self::Suggestion),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before configuration reads the environment
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED); stdout carries the transcript
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Configuration error")?;

    info!(
        name: "config.loaded",
        base_url = %config.chat.base_url,
        mode = ?config.mode,
        "Configuration loaded"
    );

    let host = Arc::new(TerminalHost::default());
    match config.mode {
        DialogMode::Search => run_search(&config, host).await,
        DialogMode::Inline => run_inline(&config, host).await,
    }
}

async fn run_search(config: &AppConfig, host: Arc<TerminalHost>) -> anyhow::Result<()> {
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpChatBackend::new(
        &config.chat.base_url,
        &config.chat.search_endpoint,
    )?);

    let dialog_host: Arc<dyn DialogHost> = Arc::<TerminalHost>::clone(&host);
    let mut launcher =
        CompactSearch::new(config.dialog.placeholder.clone(), Arc::clone(&dialog_host));
    launcher.click();

    let mut dialog = SearchDialog::new(
        backend,
        config.chat.search_options(),
        SearchSettings::from(&config.dialog),
        dialog_host,
    );
    dialog.open();
    print_view(&dialog.view());

    let (printer, mut printed) = spawn_printer(Arc::clone(dialog.controller()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = match Command::parse(&line) {
            Command::Close => {
                dialog.close();
                None
            }
            Command::Stop => {
                dialog.controller().stop();
                None
            }
            Command::Reload => {
                println!("(reload is only available in inline mode)");
                None
            }
            Command::Suggestion(n) => dialog.click_suggestion(n.saturating_sub(1)),
            Command::Recent => dialog.click_recent(),
            Command::Text(text) => {
                for c in text.chars() {
                    dialog.handle_key(KeyPress::char(c));
                }
                dialog.handle_key(KeyPress::enter())
            }
        };

        if let Some(reply) = reply {
            await_reply(reply, dialog.controller(), &mut printed).await?;
        }
        if host.is_closed() {
            break;
        }
    }

    printer.abort();
    Ok(())
}

async fn run_inline(config: &AppConfig, host: Arc<TerminalHost>) -> anyhow::Result<()> {
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpChatBackend::new(
        &config.chat.base_url,
        &config.chat.chat_endpoint,
    )?);

    let mut chat = InlineChat::new(
        "terminal",
        backend,
        config.chat.inline_options(&config.dialog.initial_value),
        host,
    );
    chat.set_open(true);
    info!(name: "chat.session.created", session_id = %chat.session_id(), "Inline chat opened");
    print_view(&chat.view());

    let (printer, mut printed) = spawn_printer(Arc::clone(chat.controller()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = match Command::parse(&line) {
            Command::Close => break,
            Command::Stop => {
                chat.stop();
                None
            }
            Command::Reload => Some(chat.reload()),
            Command::Suggestion(_) | Command::Recent => {
                println!("(suggestions are only available in search mode)");
                None
            }
            Command::Text(text) => {
                for c in text.chars() {
                    chat.handle_key(KeyPress::char(c));
                }
                chat.handle_key(KeyPress::enter())
            }
        };

        if let Some(reply) = reply {
            await_reply(reply, chat.controller(), &mut printed).await?;
        }
    }

    printer.abort();
    if let Some(deletion) = chat.close() {
        // Let the best-effort DELETE go out before the runtime shuts down.
        let _ = deletion.await;
    }
    Ok(())
}

/// Wait for a reply; Ctrl-C stops it instead of exiting.
///
/// Returns once the printer has caught up with the transcript, so the
/// closing newline lands after the last streamed text.
async fn await_reply(
    mut reply: ReplyHandle,
    controller: &ChatController,
    printed: &mut watch::Receiver<u64>,
) -> anyhow::Result<StreamOutcome> {
    let outcome = tokio::select! {
        joined = &mut reply => joined?,
        _ = tokio::signal::ctrl_c() => {
            controller.stop();
            reply.await?
        }
    };
    let target = controller.message_list().revision();
    // The printer only goes away with the transcript.
    let _ = printed.wait_for(|seen| *seen >= target).await;
    println!();
    debug!(name: "chat.reply.finished", outcome = ?outcome, "Reply finished");
    Ok(outcome)
}

/// Print assistant text incrementally as the transcript changes.
///
/// The watch channel carries the last list revision the printer handled.
fn spawn_printer(controller: Arc<ChatController>) -> (JoinHandle<()>, watch::Receiver<u64>) {
    let mut events = controller.subscribe();
    let (seen_tx, seen_rx) = watch::channel(controller.message_list().revision());
    let handle = tokio::spawn(async move {
        let mut printed: Option<(String, usize)> = None;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            if let ListEvent::Appended { index, .. } | ListEvent::Updated { index, .. } = event {
                if let Some(tail) = next_tail(&controller, index, &mut printed) {
                    print!("{tail}");
                    let _ = std::io::stdout().flush();
                }
            }
            seen_tx.send_replace(event.revision());
        }
    });
    (handle, seen_rx)
}

/// Assistant text at `index` not yet printed.
fn next_tail(
    controller: &ChatController,
    index: usize,
    printed: &mut Option<(String, usize)>,
) -> Option<String> {
    let message = controller.messages().into_iter().nth(index)?;
    if message.role != MessageRole::Assistant {
        return None;
    }
    let start = match printed {
        Some((id, len)) if *id == message.id => *len,
        _ => 0,
    };
    let tail = message.content.get(start..).map(ToString::to_string);
    *printed = Some((message.id, message.content.len()));
    tail
}

fn print_view(view: &DialogView) {
    match view {
        DialogView::Hidden => {}
        DialogView::Initial(initial) => {
            println!("== {} ==", initial.title);
            println!("Recents");
            if initial.recents.is_empty() {
                println!("  {NO_RECENTS_LABEL}  (/recent)");
            } else {
                for recent in &initial.recents {
                    println!("  {recent}  (/recent)");
                }
            }
            println!("Suggested Prompts");
            for (i, prompt) in initial.suggestions.iter().enumerate() {
                println!("  /{} {prompt}", i + 1);
            }
            println!("{}", initial.placeholder);
        }
        DialogView::Transcript(transcript) => {
            println!("== {} ==", transcript.title);
            for message in &transcript.messages {
                let who = match message.role {
                    MessageRole::User => "you",
                    MessageRole::Assistant => "assistant",
                };
                println!("[{who}] {}", message.content);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inline_chat::chat::ChatOptions;
    use inline_chat::session::Message;

    fn controller() -> Arc<ChatController> {
        let backend: Arc<dyn ChatBackend> =
            Arc::new(HttpChatBackend::new("http://127.0.0.1:9", "/api/chat").unwrap());
        Arc::new(ChatController::new(backend, ChatOptions::new("m")))
    }

    #[tokio::test]
    async fn test_printer_catches_up_with_transcript() {
        let controller = controller();
        let (printer, mut printed) = spawn_printer(Arc::clone(&controller));

        let list = controller.message_list();
        list.push_user("q", Vec::new());
        let generation = list.generation();
        list.apply_fragment(generation, "Hi");
        list.apply_fragment(generation, "Hi there");

        let target = list.revision();
        printed.wait_for(|seen| *seen >= target).await.unwrap();
        assert_eq!(*printed.borrow(), 3);
        printer.abort();
    }

    #[test]
    fn test_next_tail_prints_only_new_text() {
        let controller = controller();
        let reply = Message::assistant("Hi");
        controller.set_messages(vec![Message::user("q"), reply.clone()]);

        let mut printed = None;
        assert_eq!(next_tail(&controller, 0, &mut printed), None);
        assert_eq!(next_tail(&controller, 1, &mut printed).as_deref(), Some("Hi"));

        let mut longer = reply;
        longer.content = "Hi there".into();
        controller.set_messages(vec![Message::user("q"), longer]);
        assert_eq!(next_tail(&controller, 1, &mut printed).as_deref(), Some(" there"));
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/2"), Command::Suggestion(2));
        assert_eq!(Command::parse(" /stop "), Command::Stop);
        assert_eq!(Command::parse("/close"), Command::Close);
        assert_eq!(Command::parse("hello"), Command::Text("hello".into()));
        assert_eq!(Command::parse("/unknown"), Command::Text("/unknown".into()));
    }
}
