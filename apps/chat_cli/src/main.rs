mod commands;

use std::{
    collections::{HashMap, HashSet},
    fmt::Write as _,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{load_settings, ChatMessage, CoordinatorEvent, ImageUpload, RequestCoordinator};
use shared::{
    domain::{MessageId, Sender, SessionId},
    protocol::SessionSummary,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use commands::{parse_command, Command, HELP};

#[derive(Parser, Debug)]
#[command(about = "Terminal client for the multilingual chat service")]
struct Args {
    /// Base URL of the chat API. Overrides the config file and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// TOML settings file (defaults to ./chat_client.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref());
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    let api_base_url = settings.api_base_url.clone();
    let coordinator =
        RequestCoordinator::connect(settings).context("failed to set up the chat client")?;
    println!("Chat API: {api_base_url}");

    match coordinator.refresh_sessions().await {
        Ok(count) => println!("{count} stored session(s). Type /help for commands."),
        Err(err) => println!("Could not load chat history: {err}"),
    }

    let events = coordinator.subscribe_events();
    let renderer = tokio::spawn(render_transcript(Arc::clone(&coordinator), events));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(err) = run_command(&coordinator, command).await {
            println!("error: {err:#}");
        }
    }

    coordinator.cancel_all().await;
    renderer.abort();
    Ok(())
}

async fn run_command(coordinator: &Arc<RequestCoordinator>, command: Command) -> Result<()> {
    match command {
        Command::Chat(text) => {
            coordinator.submit_chat(text).await?;
        }
        Command::Image { path, prompt } => {
            let upload = ImageUpload::from_path(&path).await?;
            coordinator.submit_image(upload, prompt).await?;
        }
        Command::NewChat => {
            coordinator.start_new_chat().await;
            println!("Started a new chat.");
        }
        Command::Sessions => {
            if let Err(err) = coordinator.refresh_sessions().await {
                println!("Showing cached sessions ({err}).");
            }
            let selected = coordinator.selected_session().await;
            print_sessions(&coordinator.sessions().await, selected.as_ref());
        }
        Command::Open(index) => {
            let session_id = nth_session(coordinator, index).await?;
            coordinator.select_session(&session_id).await?;
        }
        Command::Delete(index) => {
            let session_id = nth_session(coordinator, index).await?;
            coordinator.delete_session(&session_id).await?;
            println!("Deleted session {session_id}.");
        }
        Command::ClearAll => {
            coordinator.delete_all_history().await?;
            println!("All chat history deleted.");
        }
        Command::Feedback { index, kind, text } => {
            let messages = coordinator.messages().await;
            let Some(message) = messages.get(index - 1) else {
                bail!("no message {index}; see /messages");
            };
            if message.sender != Sender::Ai {
                bail!("feedback applies to AI replies only");
            }
            let interaction_id = message
                .interaction_id
                .clone()
                .context("this reply cannot be rated")?;
            coordinator
                .submit_feedback(&interaction_id, kind, text)
                .await?;
        }
        Command::Messages => {
            for (index, message) in coordinator.messages().await.iter().enumerate() {
                println!("{}", format_message(index + 1, message));
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn nth_session(coordinator: &RequestCoordinator, index: usize) -> Result<SessionId> {
    let sessions = coordinator.sessions().await;
    match sessions.get(index - 1) {
        Some(session) => Ok(session.session_id.clone()),
        None => bail!("no session {index}; see /sessions"),
    }
}

fn print_sessions(sessions: &[SessionSummary], selected: Option<&SessionId>) {
    if sessions.is_empty() {
        println!("No stored sessions.");
        return;
    }
    for (index, session) in sessions.iter().enumerate() {
        let marker = if Some(&session.session_id) == selected { "*" } else { " " };
        let mut line = format!(
            "{marker}{}. {} ({} messages",
            index + 1,
            session.session_title,
            session.message_count
        );
        if let Some(timestamp) = &session.latest_timestamp {
            let _ = write!(line, ", last {timestamp}");
        }
        line.push(')');
        println!("{line}");
    }
}

fn format_message(index: usize, message: &ChatMessage) -> String {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Ai => "ai",
    };
    let mut line = format!("[{index}] {who}: {}", message.text);
    if let Some(language) = &message.language_name {
        match message.confidence {
            Some(confidence) => {
                let _ = write!(line, " ({language}, {:.0}%)", confidence * 100.0);
            }
            None => {
                let _ = write!(line, " ({language})");
            }
        }
    }
    if let Some(kind) = message.feedback_submitted {
        let _ = write!(line, " [rated {kind}]");
    }
    line
}

/// Prints messages as they settle. A message is reprinted only when its text changes.
async fn render_transcript(
    coordinator: Arc<RequestCoordinator>,
    mut events: broadcast::Receiver<CoordinatorEvent>,
) {
    let mut printed: HashMap<MessageId, String> = HashMap::new();
    let mut announced: HashSet<MessageId> = HashSet::new();

    loop {
        match events.recv().await {
            Ok(CoordinatorEvent::MessagesChanged) => {
                let messages = coordinator.messages().await;
                if messages.is_empty() {
                    printed.clear();
                    announced.clear();
                    continue;
                }
                for (index, message) in messages.iter().enumerate() {
                    if message.is_loading {
                        if announced.insert(message.id) {
                            println!("    ...");
                        }
                        continue;
                    }
                    if printed.get(&message.id) != Some(&message.text) {
                        printed.insert(message.id, message.text.clone());
                        println!("{}", format_message(index + 1, message));
                    }
                }
            }
            Ok(CoordinatorEvent::FeedbackRecorded { interaction_id }) => {
                let notice = coordinator
                    .messages()
                    .await
                    .into_iter()
                    .find(|m| m.interaction_id.as_ref() == Some(&interaction_id))
                    .and_then(|m| m.feedback_message);
                if let Some(notice) = notice {
                    println!("{notice}");
                }
            }
            Ok(CoordinatorEvent::SessionsChanged) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "transcript renderer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
