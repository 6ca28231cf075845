use serde::Serialize;

/// An agent that can join a collaboration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    pub emoji: &'static str,
}

/// Agents in join order. A run with `n` participants uses the first `n`.
pub const PARTICIPANT_POOL: [Participant; 4] = [
    Participant {
        id: "mgr",
        name: "Accounting Manager",
        role: "Coordinator",
        emoji: "🤖",
    },
    Participant {
        id: "analyst",
        name: "Client Analyst",
        role: "Analytics",
        emoji: "📊",
    },
    Participant {
        id: "finance",
        name: "Financier",
        role: "Finance",
        emoji: "💰",
    },
    Participant {
        id: "warehouse",
        name: "Warehouse Keeper",
        role: "Warehouse",
        emoji: "📦",
    },
];

/// Status lines cycled through while a run is live
pub const STATUS_LINES: [&str; 9] = [
    "Analyzing request...",
    "Searching for relevant data...",
    "Connecting analytics module...",
    "Processing tables...",
    "Reconciling financial records...",
    "Generating report...",
    "Composing answer...",
    "Checking warehouse data...",
    "Aggregating results...",
];

pub const START_LINE: &str = "Accepting task...";
pub const COMPLETION_LINE: &str = "✓ Task completed";
pub const STOP_LINE: &str = "⛔ Process stopped";

/// Lines kept from the rolling log when a run closes
pub const CLOSING_CONTEXT: usize = 2;

/// Status line for the given cursor position
pub fn status_line(cursor: u64) -> &'static str {
    let index = (cursor % STATUS_LINES.len() as u64) as usize;
    STATUS_LINES[index]
}

/// The first `count` agents of the pool
pub fn participants(count: usize) -> Vec<Participant> {
    PARTICIPANT_POOL
        .iter()
        .take(count)
        .copied()
        .collect()
}
