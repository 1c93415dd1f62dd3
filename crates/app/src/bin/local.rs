// Parley - Local terminal chat client

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use parley_common::Config;
use parley_conversations::{
    AnswerView, ConversationManager, Message, MessageRole, Thread, TurnOutcome,
};
use parley_gateway::GatewayConfig;

const HELP: &str = "\
Commands:
  /threads              list your threads
  /new [title]          create a thread and select it
  /select <n>           select thread n from the last listing
  /rename <n> <title>   rename thread n
  /delete <n>           delete thread n
  /reload               reload the selected thread
  /help                 show this help
  /quit                 exit
Anything else is sent to the selected thread.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Parley local client");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let gateway_config = GatewayConfig::from_env()?;

    info!(?config, "Configuration loaded successfully");

    let manager = Arc::new(parley_app::create_manager(&config, gateway_config).await?);
    let watcher = tokio::spawn(watch_status(manager.clone()));

    println!("{}", HELP);

    let mut threads: Vec<Thread> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/threads" => {
                threads = manager.list_threads().await;
                if threads.is_empty() {
                    println!("No threads yet. Start one with /new.");
                }
                for (i, thread) in threads.iter().enumerate() {
                    println!(
                        "{:>3}. {}  ({})",
                        i + 1,
                        thread.display_title(),
                        thread.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            "/new" => {
                let title = (!rest.is_empty()).then_some(rest);
                match manager.create_thread(title).await {
                    Ok(thread) => println!("Created and selected \"{}\"", thread.display_title()),
                    Err(e) => println!("Could not create thread: {}", e),
                }
            }
            "/select" => {
                if let Some(thread) = pick(&threads, rest) {
                    manager.select_thread(Some(thread.clone())).await;
                    render_history(&manager);
                }
            }
            "/rename" => {
                let (index, title) = rest.split_once(' ').unwrap_or((rest, ""));
                if let Some(thread) = pick(&threads, index) {
                    match manager.rename_thread(thread, title.trim()).await {
                        Ok(renamed) => println!("Renamed to \"{}\"", renamed.display_title()),
                        Err(e) => println!("Could not rename thread: {}", e),
                    }
                }
            }
            "/delete" => {
                if let Some(thread) = pick(&threads, rest) {
                    match manager.delete_thread(thread.id).await {
                        Ok(_) => println!("Deleted \"{}\"", thread.display_title()),
                        Err(e) => println!("Could not delete thread: {}", e),
                    }
                }
            }
            "/reload" => {
                manager.reload_messages().await;
                render_history(&manager);
            }
            _ => send(&manager, line).await,
        }
    }

    watcher.abort();
    info!("Parley local client shutdown complete");
    Ok(())
}

fn pick<'a>(threads: &'a [Thread], arg: &str) -> Option<&'a Thread> {
    let thread = arg
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| threads.get(i));
    if thread.is_none() {
        println!("No such thread. Run /threads to list them.");
    }
    thread
}

async fn send(manager: &ConversationManager, text: &str) {
    match manager.send_message(text).await {
        Ok(TurnOutcome::Ignored) => {
            if manager.snapshot().selected_thread.is_none() {
                println!("Select or create a thread first.");
            }
        }
        Ok(TurnOutcome::Completed { assistant, .. }) => render_message(&assistant),
        Ok(TurnOutcome::Failed { reason, .. }) => {
            println!("Something went wrong. Please try again. ({})", reason)
        }
        Ok(TurnOutcome::Superseded { .. }) => {}
        Err(e) if e.is_remote() => {
            error!(error = %e, "Failed to send message");
            println!("Failed to send message. Please try again.");
        }
        Err(e) => println!("{}", e),
    }
}

fn render_history(manager: &ConversationManager) {
    let session = manager.snapshot();
    if let Some(thread) = &session.selected_thread {
        println!("--- {} ---", thread.display_title());
    }
    for message in &session.messages {
        render_message(message);
    }
}

fn render_message(message: &Message) {
    match message.role {
        MessageRole::User => {
            println!("you> {}", message.content.as_deref().unwrap_or_default())
        }
        MessageRole::Assistant => {
            match AnswerView::from_content(message.content.as_deref()) {
                AnswerView::Sections(sections) => {
                    if let Some(answer) = sections.final_answer {
                        println!("ai>  {}", answer);
                    }
                    if let Some(analysis) = sections.analysis {
                        println!("     [analysis]\n{}", analysis);
                    }
                    if let Some(code) = sections.code {
                        println!("     [code]\n{}", code);
                    }
                }
                AnswerView::Raw(text) => println!("ai>  {}", text),
                AnswerView::Empty => println!("ai>  (no content)"),
            }
            for (i, _) in message.images.iter().enumerate() {
                println!("     [plot {} attached]", i + 1);
            }
        }
    }
}

/// Prints a thinking indicator while a reply is pending
async fn watch_status(manager: Arc<ConversationManager>) {
    let mut rx = manager.subscribe();
    let mut was_loading = false;
    while rx.changed().await.is_ok() {
        let is_loading = rx.borrow_and_update().is_loading;
        if is_loading && !was_loading {
            println!("     thinking...");
        }
        was_loading = is_loading;
    }
}
