use std::collections::HashSet;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_collaboration::CollaborationRun;
use parley_config::{load as load_config, AppConfig};
use parley_conversation::{ConversationView, Message, MessageId, SenderKind};
use parley_runtime::{telemetry, ParleyServices};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

mod render;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley assistant conversation (console by default)")]
struct Cli {
    /// Conversation scope to use instead of the configured one
    #[arg(long, global = true)]
    scope: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive console (default)
    Console,
    /// Print the stored conversation
    History {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete the stored conversation
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;

    let mut config = load_config().context("failed to load configuration")?;
    if let Some(scope) = cli.scope {
        config.conversation.scope = scope;
    }

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Console => run_console(&config).await,
        Commands::History { json } => dump_history(&config, json).await,
        Commands::Clear => clear_history(&config).await,
    }
}

async fn initialise(config: &AppConfig) -> anyhow::Result<ParleyServices> {
    ParleyServices::initialise(config)
        .await
        .context("failed to initialise parley services")
}

async fn dump_history(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let services = initialise(config).await?;
    let scope = services.conversation.scope();

    let messages = services
        .messages
        .find_by_scope(scope)
        .await
        .context("failed to fetch messages")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&messages).context("failed to encode messages")?
        );
        return Ok(());
    }

    println!("=== CONVERSATION {scope} ===");
    if messages.is_empty() {
        println!("No messages found in database");
        return Ok(());
    }

    println!("Found {} messages:", messages.len());
    println!("{}", render::history_header());
    println!("{}", "-".repeat(130));
    for message in &messages {
        println!("{}", render::history_row(message));
    }
    Ok(())
}

async fn clear_history(config: &AppConfig) -> anyhow::Result<()> {
    let services = initialise(config).await?;
    let scope = services.conversation.scope();

    let removed = services
        .messages
        .clear(scope)
        .await
        .context("failed to delete messages")?;

    println!("Conversation {scope} cleared: {removed} messages deleted");
    Ok(())
}

/// Tracks which messages have already been printed.
#[derive(Default)]
struct Printed {
    ids: HashSet<MessageId>,
}

impl Printed {
    fn show_new(&mut self, view: &ConversationView) {
        for message in &view.messages {
            if self.ids.insert(message.id.clone()) {
                println!("{}", render::message_line(message));
            }
        }
    }
}

fn show_run(run: &CollaborationRun, last: &mut Option<CollaborationRun>) {
    let previous = last.replace(run.clone());

    if previous.as_ref().map(|previous| previous.phase) != Some(run.phase) {
        println!("{}", render::phase_line(run));
    }
    if previous.map_or(true, |previous| previous.logs != run.logs) {
        if let Some(line) = run.logs.last() {
            println!("    {line}");
        }
    }
}

async fn run_console(config: &AppConfig) -> anyhow::Result<()> {
    info!("starting interactive console");

    let services = initialise(config).await?;
    let conversation = services.conversation.clone();

    let mut view_updates = conversation.store().subscribe();
    let mut run_updates = services.collaboration.subscribe();

    let view = conversation.fetch_history().await;
    let subscription = conversation.subscribe();

    println!("Parley Interactive Console ({})", conversation.scope());
    println!("Type a message to send it, or '/help' for commands");
    println!("Use Ctrl+C or '/quit' to exit");
    println!("---");

    if let Some(error) = &view.fetch_error {
        println!("(history unavailable: {error})");
    }
    let mut printed = Printed::default();
    printed.show_new(&view);
    let mut last_run: Option<CollaborationRun> = None;

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let shutdown = parley_runtime::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = view_updates.recv() => match update {
                Ok(view) => printed.show_new(&view),
                Err(RecvError::Lagged(_)) => printed.show_new(&conversation.view()),
                Err(RecvError::Closed) => break,
            },
            update = run_updates.recv() => match update {
                Ok(run) => show_run(&run, &mut last_run),
                Err(RecvError::Lagged(_)) => {
                    show_run(&services.collaboration.snapshot(), &mut last_run)
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break; // EOF
                };
                if !handle_line(&services, line.trim(), &mut printed).await? {
                    break;
                }
            }
        }
    }

    subscription.close();
    services.collaboration.stop_processing();
    println!("Goodbye!");
    Ok(())
}

/// Text of a `/reply` command: `None` when `input` is not one, `Some(None)`
/// when the reply is blank.
fn reply_content(input: &str) -> Option<Option<&str>> {
    let rest = input.strip_prefix("/reply")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let reply = rest.trim();
    Some((!reply.is_empty()).then_some(reply))
}

/// Returns `false` when the console should exit.
async fn handle_line(
    services: &ParleyServices,
    input: &str,
    printed: &mut Printed,
) -> anyhow::Result<bool> {
    if input.is_empty() {
        return Ok(true);
    }

    match input {
        "/quit" | "/exit" | "/q" => return Ok(false),
        "/help" | "/h" => {
            println!("Available commands:");
            println!("  <text>             - Send a message");
            println!("  /reply <text>      - Store an assistant reply");
            println!("  /stop, /s          - Stop the running collaboration");
            println!("  /history, /hi      - Show the conversation view");
            println!("  /quit, /exit, /q   - Exit console");
        }
        "/stop" | "/s" => {
            if !services.collaboration.is_processing() {
                println!("(no collaboration running)");
            }
            services.collaboration.stop_processing();
        }
        "/history" | "/hi" => {
            let view = services.conversation.view();
            println!("{} messages", view.len());
            for message in &view.messages {
                println!("{}", render::message_line(message));
                printed.ids.insert(message.id.clone());
            }
        }
        _ => {
            if let Some(reply) = reply_content(input) {
                let Some(reply) = reply else {
                    println!("(not sent: message is empty)");
                    return Ok(true);
                };
                let message = Message::new(
                    services.conversation.scope().clone(),
                    reply,
                    SenderKind::Assistant,
                );
                services
                    .messages
                    .record(&message)
                    .await
                    .context("failed to store assistant reply")?;
            } else if input.starts_with('/') {
                println!("Unknown command: {input}");
                println!("Type '/help' for available commands");
            } else {
                match services.submit(input).await {
                    Ok(_) => {}
                    Err(error) if error.is_rejection() => println!("(not sent: {error})"),
                    Err(error) => {
                        warn!(%error, "message could not be stored");
                        println!("(send failed: {error})");
                    }
                }
            }
        }
    }

    Ok(true)
}
