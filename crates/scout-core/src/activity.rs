//! Side-channel progress for one assistant message.
//!
//! Tool activity (currently: web search) is tracked independently of the
//! message text. The automaton is
//!
//! ```text
//! idle → searching → reading → (writing) → done
//!          ↑___________|
//! any non-done phase → error
//! ```
//!
//! `writing` is only ever observed as a stage label: the terminal transition
//! appends it and lands in `done` in one step.

use serde::{Deserialize, Serialize};

/// Stage labels shown to the user, in the order they were entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Searching,
    Reading,
    Writing,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Reading => "reading",
            Self::Writing => "writing",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityPhase {
    Idle,
    Searching,
    Reading,
    Done,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {signal} while activity is {from:?}")]
pub struct InvalidTransition {
    pub from: ActivityPhase,
    pub signal: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityState {
    pub stages: Vec<Stage>,
    pub query: String,
    pub results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub phase: ActivityPhase,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityState {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            query: String::new(),
            results: Vec::new(),
            error: None,
            phase: ActivityPhase::Idle,
        }
    }

    /// The state attached to a user-visible failure notice: a lone `error`
    /// stage with no query, results or detail.
    pub fn failed() -> Self {
        Self {
            stages: vec![Stage::Error],
            phase: ActivityPhase::Error,
            ..Self::new()
        }
    }

    pub fn last_stage(&self) -> Option<Stage> {
        self.stages.last().copied()
    }

    /// `search_start`: enter `searching` and record the query. Allowed from
    /// every phase except `done`, so a producer may cycle through several
    /// searches in one turn.
    pub fn begin_search(&mut self, query: impl Into<String>) -> Result<(), InvalidTransition> {
        self.guard_not_done("search_start")?;
        self.push_stage(Stage::Searching);
        self.query = query.into();
        self.phase = ActivityPhase::Searching;
        Ok(())
    }

    /// `search_results`: enter `reading` and replace the result list.
    pub fn receive_results(&mut self, results: Vec<String>) -> Result<(), InvalidTransition> {
        match self.phase {
            ActivityPhase::Idle | ActivityPhase::Searching | ActivityPhase::Reading => {
                self.push_stage(Stage::Reading);
                self.results = results;
                self.phase = ActivityPhase::Reading;
                Ok(())
            }
            from => Err(InvalidTransition {
                from,
                signal: "search_results",
            }),
        }
    }

    /// `search_error`: enter `error`. Results gathered so far are kept.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.guard_not_done("search_error")?;
        self.push_stage(Stage::Error);
        self.error = Some(error.into());
        self.phase = ActivityPhase::Error;
        Ok(())
    }

    /// Turn end. Appends `writing` and settles in `done`, unless the
    /// activity already failed or finished.
    pub fn finish(&mut self) {
        if matches!(self.phase, ActivityPhase::Error | ActivityPhase::Done) {
            return;
        }
        self.push_stage(Stage::Writing);
        self.phase = ActivityPhase::Done;
    }

    fn guard_not_done(&self, signal: &'static str) -> Result<(), InvalidTransition> {
        if self.phase == ActivityPhase::Done {
            return Err(InvalidTransition {
                from: ActivityPhase::Done,
                signal,
            });
        }
        Ok(())
    }

    // Consecutive repeats collapse; non-consecutive repeats are kept.
    fn push_stage(&mut self, stage: Stage) {
        if self.last_stage() != Some(stage) {
            self.stages.push(stage);
        }
    }
}
