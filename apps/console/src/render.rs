//! Plain-text rendering of conversation and collaboration snapshots.

use parley_collaboration::{CollaborationRun, Phase};
use parley_conversation::{Message, SenderKind};

const CONTENT_WIDTH: usize = 60;

pub fn message_line(message: &Message) -> String {
    let who = match message.sender {
        SenderKind::Viewer => "you",
        SenderKind::Assistant => "assistant",
    };
    format!(
        "[{}] {:>9}: {}",
        message.created_at.format("%H:%M:%S"),
        who,
        message.content
    )
}

pub fn history_row(message: &Message) -> String {
    format!(
        "{:<26} {:<10} {:<32} {}",
        message.id.as_str(),
        message.sender.as_str(),
        message.created_at.to_rfc3339(),
        truncate(&message.content, CONTENT_WIDTH)
    )
}

pub fn history_header() -> String {
    format!(
        "{:<26} {:<10} {:<32} {}",
        "ID", "Sender", "Created At", "Content (truncated)"
    )
}

pub fn phase_line(run: &CollaborationRun) -> String {
    if run.phase == Phase::Closed {
        return format!("[{}] input available", run.phase);
    }

    let team = run
        .participants
        .iter()
        .map(|participant| format!("{} {}", participant.emoji, participant.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}] {}", run.phase, team)
}

pub fn truncate(content: &str, width: usize) -> String {
    if content.chars().count() <= width {
        return content.to_string();
    }
    let kept: String = content.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
