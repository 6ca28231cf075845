//! Snapshot state of a collaboration run and its transitions.

use serde::Serialize;

use crate::agents::{
    self, Participant, CLOSING_CONTEXT, COMPLETION_LINE, START_LINE, STOP_LINE,
};

/// Stage of a collaboration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Initial and terminal state
    Closed,
    Solo,
    Tandem,
    Team,
}

impl Phase {
    pub fn is_live(&self) -> bool {
        !matches!(self, Phase::Closed)
    }

    /// Number of participants present in this phase
    pub fn participant_count(&self) -> usize {
        match self {
            Phase::Closed => 0,
            Phase::Solo => 1,
            Phase::Tandem => 2,
            Phase::Team => 3,
        }
    }

    /// Next phase along the forward path
    pub fn successor(&self) -> Option<Phase> {
        match self {
            Phase::Closed => None,
            Phase::Solo => Some(Phase::Tandem),
            Phase::Tandem => Some(Phase::Team),
            Phase::Team => Some(Phase::Closed),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Closed => "closed",
            Phase::Solo => "solo",
            Phase::Tandem => "tandem",
            Phase::Team => "team",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the viewer may submit new input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputState {
    Available,
    Processing,
}

/// Observable state of the scheduler's current run.
///
/// Readers only ever hold copies; the scheduler owns the live value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaborationRun {
    pub phase: Phase,
    pub input: InputState,
    /// Active participants in join order
    pub participants: Vec<Participant>,
    /// Most recent status lines, oldest first
    pub logs: Vec<String>,
    /// Number of status lines emitted by this run
    pub log_cursor: u64,
    /// Generation of the run this snapshot belongs to
    pub epoch: u64,
}

impl Default for CollaborationRun {
    fn default() -> Self {
        Self {
            phase: Phase::Closed,
            input: InputState::Available,
            participants: Vec::new(),
            logs: Vec::new(),
            log_cursor: 0,
            epoch: 0,
        }
    }
}

impl CollaborationRun {
    pub fn is_live(&self) -> bool {
        self.phase.is_live()
    }

    /// Whether a step issued under `epoch` may still touch this run
    pub fn accepts(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.is_live()
    }

    /// Reset into a fresh `Solo` run under a new generation.
    pub(crate) fn begin(&mut self, epoch: u64) {
        *self = Self {
            phase: Phase::Solo,
            input: InputState::Processing,
            participants: agents::participants(Phase::Solo.participant_count()),
            logs: vec![START_LINE.to_string()],
            log_cursor: 0,
            epoch,
        };
    }

    /// Append the next status line, keeping at most `window` lines.
    pub(crate) fn record_status(&mut self, epoch: u64, window: usize) -> bool {
        if !self.accepts(epoch) {
            return false;
        }

        self.logs.push(agents::status_line(self.log_cursor).to_string());
        self.log_cursor += 1;
        trim_front(&mut self.logs, window.max(1));
        true
    }

    /// Move one step forward to a live phase.
    pub(crate) fn advance(&mut self, epoch: u64, phase: Phase) -> bool {
        if !self.accepts(epoch) || !phase.is_live() || self.phase.successor() != Some(phase) {
            return false;
        }

        self.phase = phase;
        self.participants = agents::participants(phase.participant_count());
        true
    }

    /// Finish the run normally from `Team`.
    pub(crate) fn complete(&mut self, epoch: u64) -> bool {
        if !self.accepts(epoch) || self.phase.successor() != Some(Phase::Closed) {
            return false;
        }

        self.close_with(COMPLETION_LINE);
        true
    }

    /// Abort the run from any live phase. No-op once closed.
    pub(crate) fn terminate(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }

        self.close_with(STOP_LINE);
        true
    }

    fn close_with(&mut self, line: &str) {
        self.phase = Phase::Closed;
        self.input = InputState::Available;
        self.participants.clear();
        trim_front(&mut self.logs, CLOSING_CONTEXT);
        self.logs.push(line.to_string());
    }
}

fn trim_front(logs: &mut Vec<String>, keep: usize) {
    if logs.len() > keep {
        let excess = logs.len() - keep;
        logs.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::STATUS_LINES;

    fn started(epoch: u64) -> CollaborationRun {
        let mut run = CollaborationRun::default();
        run.begin(epoch);
        run
    }

    #[test]
    fn begin_enters_solo_with_a_single_line() {
        let run = started(1);

        assert_eq!(run.phase, Phase::Solo);
        assert_eq!(run.input, InputState::Processing);
        assert_eq!(run.participants.len(), 1);
        assert_eq!(run.participants[0].id, "mgr");
        assert_eq!(run.logs, vec![START_LINE]);
    }

    #[test]
    fn status_log_keeps_the_most_recent_window() {
        let mut run = started(1);
        for _ in 0..7 {
            assert!(run.record_status(1, 5));
        }

        assert_eq!(run.log_cursor, 7);
        assert_eq!(run.logs, STATUS_LINES[2..7].to_vec());
    }

    #[test]
    fn phases_only_move_forward_one_step() {
        let mut run = started(1);

        assert!(!run.advance(1, Phase::Team));
        assert!(!run.complete(1));
        assert!(run.advance(1, Phase::Tandem));
        assert!(!run.advance(1, Phase::Tandem));
        assert!(run.advance(1, Phase::Team));
        assert_eq!(run.participants.len(), 3);
        assert!(run.complete(1));

        assert_eq!(run.phase, Phase::Closed);
        assert_eq!(run.input, InputState::Available);
        assert!(run.participants.is_empty());
        assert_eq!(run.logs.last().map(String::as_str), Some(COMPLETION_LINE));
    }

    #[test]
    fn stale_epoch_steps_are_ignored() {
        let mut run = started(2);

        assert!(!run.advance(1, Phase::Tandem));
        assert!(!run.record_status(1, 5));
        assert_eq!(run, started(2));
    }

    #[test]
    fn terminate_keeps_two_lines_of_context() {
        let mut run = started(1);
        run.record_status(1, 5);
        run.record_status(1, 5);

        assert!(run.terminate());
        assert_eq!(
            run.logs,
            vec![STATUS_LINES[0], STATUS_LINES[1], STOP_LINE]
        );

        assert!(!run.terminate());
        assert!(!run.record_status(1, 5));
        assert_eq!(run.logs.len(), 3);
    }

    #[test]
    fn snapshot_serializes_for_display() {
        let run = started(1);
        let json = serde_json::to_value(&run).unwrap();

        assert_eq!(json["phase"], "SOLO");
        assert_eq!(json["input"], "PROCESSING");
        assert_eq!(json["participants"][0]["emoji"], "🤖");
    }
}
