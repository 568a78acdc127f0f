use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Lifecycle of one turn.
///
/// composing → submitted → streaming → finalized, with failed reachable
/// from submitted or streaming. Finalized and failed are terminal; the next
/// submission starts over from composing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Composing,
    Submitted,
    Streaming,
    Finalized,
    Failed,
}

impl TurnPhase {
    /// A turn in this phase owns the in-progress assistant message.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitted | Self::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Composing => "composing",
            Self::Submitted => "submitted",
            Self::Streaming => "streaming",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-turn bookkeeping the reducer threads alongside the timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnContext {
    /// 1-based turn counter within the session.
    pub turn: u32,
    /// The assistant placeholder this turn writes into.
    pub assistant_id: MessageId,
    pub phase: TurnPhase,
    /// Whether at least one content fragment has been applied.
    pub saw_content: bool,
    /// Payloads dropped as decode failures.
    pub discarded: u32,
}

impl TurnContext {
    pub fn submitted(turn: u32, assistant_id: MessageId) -> Self {
        Self {
            turn,
            assistant_id,
            phase: TurnPhase::Submitted,
            saw_content: false,
            discarded: 0,
        }
    }

    /// Whether events should still be applied to the assistant message.
    pub fn accepts_events(&self) -> bool {
        self.phase == TurnPhase::Streaming
    }

    /// submitted → streaming. Returns false if the turn was not submitted.
    pub fn mark_streaming(&mut self) -> bool {
        if self.phase != TurnPhase::Submitted {
            return false;
        }
        self.phase = TurnPhase::Streaming;
        true
    }

    /// streaming → finalized. Returns false if the turn was not streaming.
    pub fn mark_finalized(&mut self) -> bool {
        if self.phase != TurnPhase::Streaming {
            return false;
        }
        self.phase = TurnPhase::Finalized;
        true
    }

    /// submitted|streaming → failed. Returns false if already terminal.
    pub fn mark_failed(&mut self) -> bool {
        if !self.phase.is_active() {
            return false;
        }
        self.phase = TurnPhase::Failed;
        true
    }
}
