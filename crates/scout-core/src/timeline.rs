//! The conversation timeline and the reducer that folds stream events into it.

use std::sync::Arc;

use crate::activity::{ActivityState, InvalidTransition};
use crate::checkpoint::CheckpointToken;
use crate::errors::DecodeFailure;
use crate::events::StreamEvent;
use crate::ids::MessageId;
use crate::messages::Message;
use crate::turn::TurnContext;

/// Read-only, ordered copy of the timeline handed to observers.
pub type TimelineSnapshot = Arc<[Message]>;

/// What applying one event did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reduction {
    /// The in-progress assistant message changed.
    Applied,
    /// A checkpoint token to hand to the checkpoint store. Timeline untouched.
    Checkpoint(CheckpointToken),
    /// The turn reached its end event and is now finalized.
    Finished,
    /// Activity event that is not a legal transition from the current phase.
    Rejected(InvalidTransition),
    /// Payload dropped as a decode failure. Timeline untouched.
    Discarded,
    /// The turn is not streaming (or its message is gone); nothing applied.
    Ignored,
}

impl Reduction {
    /// Whether observers need a fresh snapshot.
    pub fn changed_timeline(&self) -> bool {
        matches!(self, Self::Applied | Self::Finished)
    }
}

/// Ordered, append-only list of messages.
#[derive(Clone, Debug)]
pub struct Timeline {
    messages: Vec<Message>,
    next_id: MessageId,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: MessageId::FIRST,
        }
    }

    /// Timeline seeded with a settled assistant greeting as message 1.
    pub fn with_greeting(text: impl Into<String>) -> Self {
        let mut timeline = Self::new();
        let id = timeline.allocate_id();
        timeline.messages.push(Message::assistant_text(id, text));
        timeline
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        Arc::from(self.messages.as_slice())
    }

    /// Append the user's input and an assistant placeholder with the next
    /// consecutive id. The returned context points at the placeholder.
    pub fn begin_turn(&mut self, input: &str, turn: u32) -> TurnContext {
        let user_id = self.allocate_id();
        self.messages.push(Message::user(user_id, input));
        let assistant_id = self.allocate_id();
        self.messages.push(Message::assistant_placeholder(assistant_id));
        TurnContext::submitted(turn, assistant_id)
    }

    /// Fold one decoded event into the turn's assistant message.
    ///
    /// Content and activity are independent append-only axes; they apply in
    /// arrival order with no ordering constraint between them.
    pub fn reduce(&mut self, turn: &mut TurnContext, event: StreamEvent) -> Reduction {
        if !turn.accepts_events() {
            return Reduction::Ignored;
        }
        let Some(message) = self.assistant_mut(turn.assistant_id) else {
            return Reduction::Ignored;
        };

        match event {
            StreamEvent::Checkpoint { checkpoint_id } => Reduction::Checkpoint(checkpoint_id),
            StreamEvent::Content { content } => {
                message.content.push_str(&content);
                message.loading = false;
                turn.saw_content = true;
                Reduction::Applied
            }
            StreamEvent::SearchStart { query } => {
                apply_activity(message, |state| state.begin_search(query))
            }
            StreamEvent::SearchResults { urls } => {
                apply_activity(message, |state| state.receive_results(urls))
            }
            StreamEvent::SearchError { error } => {
                apply_activity(message, |state| state.fail(error))
            }
            StreamEvent::End => {
                if let Some(activity) = message.activity.as_mut() {
                    activity.finish();
                }
                message.loading = false;
                turn.mark_finalized();
                Reduction::Finished
            }
        }
    }

    /// Record a payload that failed to decode. Only the turn's diagnostic
    /// counter moves; no message is touched.
    pub fn absorb(&mut self, turn: &mut TurnContext, _failure: &DecodeFailure) -> Reduction {
        turn.discarded += 1;
        Reduction::Discarded
    }

    /// Fail the turn. If no text has streamed yet the placeholder is replaced
    /// by `notice` with an `error` activity; otherwise the partial answer is
    /// kept as is. Returns whether the notice was injected.
    pub fn fail_turn(&mut self, turn: &mut TurnContext, notice: &str) -> bool {
        if !turn.mark_failed() {
            return false;
        }
        let saw_content = turn.saw_content;
        let Some(message) = self.assistant_mut(turn.assistant_id) else {
            return false;
        };
        message.loading = false;
        if saw_content {
            return false;
        }
        message.content = notice.to_string();
        message.activity = Some(ActivityState::failed());
        true
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    fn assistant_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.id == id && !m.is_user())
    }
}

fn apply_activity(
    message: &mut Message,
    transition: impl FnOnce(&mut ActivityState) -> Result<(), InvalidTransition>,
) -> Reduction {
    let mut next = message.activity.clone().unwrap_or_default();
    match transition(&mut next) {
        Ok(()) => {
            message.activity = Some(next);
            message.loading = false;
            Reduction::Applied
        }
        Err(err) => Reduction::Rejected(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Stage;
    use crate::messages::{Author, CHANNEL_FAILURE_NOTICE, DEFAULT_GREETING};
    use crate::turn::TurnPhase;

    fn streaming_turn(timeline: &mut Timeline) -> TurnContext {
        let mut turn = timeline.begin_turn("question", 1);
        turn.mark_streaming();
        turn
    }

    fn content(text: &str) -> StreamEvent {
        StreamEvent::Content { content: text.into() }
    }

    fn assistant(timeline: &Timeline, turn: &TurnContext) -> Message {
        timeline.get(turn.assistant_id).cloned().unwrap()
    }

    #[test]
    fn begin_turn_allocates_consecutive_ids() {
        let mut timeline = Timeline::with_greeting(DEFAULT_GREETING);
        let turn = timeline.begin_turn("hi", 1);

        let ids: Vec<u64> = timeline.messages().iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(turn.assistant_id.get(), 3);
        assert_eq!(timeline.messages()[1].author, Author::User);
        assert!(timeline.messages()[2].loading);
    }

    #[test]
    fn ids_keep_increasing_across_turns() {
        let mut timeline = Timeline::new();
        let first = timeline.begin_turn("a", 1);
        let second = timeline.begin_turn("b", 2);
        assert_eq!(first.assistant_id.get(), 2);
        assert_eq!(second.assistant_id.get(), 4);
        let ids: Vec<u64> = timeline.messages().iter().map(|m| m.id.get()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn content_fragments_concatenate() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);

        assert_eq!(timeline.reduce(&mut turn, content("Hel")), Reduction::Applied);
        timeline.reduce(&mut turn, content("lo"));

        let msg = assistant(&timeline, &turn);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.loading);
        assert!(msg.activity.is_none());
        assert!(turn.saw_content);
    }

    #[test]
    fn checkpoint_is_forwarded_not_stored() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        let before = timeline.snapshot();

        let reduction = timeline.reduce(
            &mut turn,
            StreamEvent::Checkpoint { checkpoint_id: CheckpointToken::new("abc") },
        );
        assert_eq!(reduction, Reduction::Checkpoint(CheckpointToken::new("abc")));
        assert!(!reduction.changed_timeline());
        assert_eq!(timeline.snapshot(), before);
    }

    #[test]
    fn activity_and_content_interleave() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);

        timeline.reduce(&mut turn, StreamEvent::SearchStart { query: "x".into() });
        timeline.reduce(&mut turn, content("an"));
        timeline.reduce(&mut turn, StreamEvent::SearchResults { urls: vec!["u1".into()] });
        timeline.reduce(&mut turn, content("swer"));
        assert_eq!(timeline.reduce(&mut turn, StreamEvent::End), Reduction::Finished);

        let msg = assistant(&timeline, &turn);
        assert_eq!(msg.content, "answer");
        let activity = msg.activity.unwrap();
        assert_eq!(activity.stages, vec![Stage::Searching, Stage::Reading, Stage::Writing]);
        assert_eq!(activity.results, vec!["u1"]);
        assert_eq!(turn.phase, TurnPhase::Finalized);
    }

    #[test]
    fn activity_clears_loading() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, StreamEvent::SearchStart { query: "x".into() });
        assert!(!assistant(&timeline, &turn).loading);
        assert!(!turn.saw_content);
    }

    #[test]
    fn end_without_activity_leaves_activity_absent() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, content("plain"));
        timeline.reduce(&mut turn, StreamEvent::End);

        let msg = assistant(&timeline, &turn);
        assert!(msg.activity.is_none());
        assert_eq!(msg.content, "plain");
    }

    #[test]
    fn events_after_end_are_ignored() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, StreamEvent::End);

        assert_eq!(timeline.reduce(&mut turn, content("late")), Reduction::Ignored);
        assert!(assistant(&timeline, &turn).content.is_empty());
    }

    #[test]
    fn events_before_streaming_are_ignored() {
        let mut timeline = Timeline::new();
        let mut turn = timeline.begin_turn("q", 1);
        assert_eq!(timeline.reduce(&mut turn, content("early")), Reduction::Ignored);
    }

    #[test]
    fn rejected_transition_leaves_message_untouched() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, StreamEvent::SearchError { error: "down".into() });
        let before = timeline.snapshot();

        let reduction =
            timeline.reduce(&mut turn, StreamEvent::SearchResults { urls: vec!["u".into()] });
        assert!(matches!(reduction, Reduction::Rejected(_)));
        assert_eq!(timeline.snapshot(), before);
    }

    #[test]
    fn search_error_keeps_streaming() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, StreamEvent::SearchStart { query: "x".into() });
        timeline.reduce(&mut turn, StreamEvent::SearchError { error: "quota".into() });
        timeline.reduce(&mut turn, content("from memory"));
        timeline.reduce(&mut turn, StreamEvent::End);

        let msg = assistant(&timeline, &turn);
        assert_eq!(msg.content, "from memory");
        let activity = msg.activity.unwrap();
        assert_eq!(activity.stages, vec![Stage::Searching, Stage::Error]);
        assert_eq!(activity.error.as_deref(), Some("quota"));
    }

    #[test]
    fn absorb_only_counts() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        let before = timeline.snapshot();

        let reduction = timeline.absorb(&mut turn, &DecodeFailure::MissingTag);
        assert_eq!(reduction, Reduction::Discarded);
        assert_eq!(turn.discarded, 1);
        assert_eq!(timeline.snapshot(), before);
    }

    #[test]
    fn failure_without_content_injects_notice() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, StreamEvent::SearchStart { query: "x".into() });

        assert!(timeline.fail_turn(&mut turn, CHANNEL_FAILURE_NOTICE));
        let msg = assistant(&timeline, &turn);
        assert_eq!(msg.content, CHANNEL_FAILURE_NOTICE);
        assert!(!msg.loading);
        let activity = msg.activity.unwrap();
        assert_eq!(activity.stages, vec![Stage::Error]);
        assert!(activity.query.is_empty());
        assert_eq!(turn.phase, TurnPhase::Failed);
    }

    #[test]
    fn failure_after_content_keeps_partial_answer() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, content("partial"));

        assert!(!timeline.fail_turn(&mut turn, CHANNEL_FAILURE_NOTICE));
        let msg = assistant(&timeline, &turn);
        assert_eq!(msg.content, "partial");
        assert!(msg.activity.is_none());
        assert_eq!(turn.phase, TurnPhase::Failed);
    }

    #[test]
    fn failing_a_finished_turn_is_a_no_op() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, StreamEvent::End);

        assert!(!timeline.fail_turn(&mut turn, CHANNEL_FAILURE_NOTICE));
        assert_eq!(turn.phase, TurnPhase::Finalized);
        assert!(assistant(&timeline, &turn).content.is_empty());
    }

    #[test]
    fn user_message_never_mutated() {
        let mut timeline = Timeline::new();
        let mut turn = streaming_turn(&mut timeline);
        timeline.reduce(&mut turn, content("reply"));
        timeline.fail_turn(&mut turn, CHANNEL_FAILURE_NOTICE);

        assert_eq!(timeline.messages()[0].content, "question");
        assert!(timeline.messages()[0].activity.is_none());
    }
}
