//! Session controller: drives turns end to end.
//!
//! One [`Session`] owns the timeline for its lifetime and shares a
//! [`CheckpointStore`] with whoever created it. Turns run one at a time:
//! `begin_turn` refuses new input while a turn is submitted or streaming.
//!
//! Two ways to drive it:
//! - [`Session::run_turn`] opens the channel and pumps it to completion.
//! - The step methods (`begin_turn`, `channel_opened`, `handle_payload`,
//!   `channel_failed`, `setup_failed`) for callers that own the channel.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use scout_core::checkpoint::CheckpointStore;
use scout_core::errors::{ChannelError, SetupFailure, SubmitRejected};
use scout_core::events::StreamEvent;
use scout_core::ids::{MessageId, SessionId};
use scout_core::messages::{CHANNEL_FAILURE_NOTICE, SETUP_FAILURE_NOTICE};
use scout_core::text::truncate_str;
use scout_core::timeline::{Reduction, Timeline, TimelineSnapshot};
use scout_core::turn::{TurnContext, TurnPhase};

use crate::address::Endpoint;
use crate::channel::{ChannelOpener, OpenError};

const RAW_PREVIEW_CHARS: usize = 120;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    /// Seeded as the first assistant message when present.
    pub greeting: Option<String>,
}

/// What the caller should do after [`Session::begin_turn`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnStart {
    /// Open a channel to this address, then call [`Session::channel_opened`].
    Connect(Url),
    /// Setup failed; the timeline already carries the failure notice.
    Failed(SetupFailure),
}

/// Summary of a turn once it reached a terminal phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub turn: u32,
    pub assistant_id: Option<MessageId>,
    pub phase: Option<TurnPhase>,
    pub saw_content: bool,
    /// Payloads dropped as decode failures.
    pub discarded: u32,
}

impl From<&TurnContext> for TurnReport {
    fn from(ctx: &TurnContext) -> Self {
        Self {
            turn: ctx.turn,
            assistant_id: Some(ctx.assistant_id),
            phase: Some(ctx.phase),
            saw_content: ctx.saw_content,
            discarded: ctx.discarded,
        }
    }
}

pub struct Session {
    id: SessionId,
    endpoint: Endpoint,
    timeline: Timeline,
    turn: Option<TurnContext>,
    turns: u32,
    checkpoints: Arc<CheckpointStore>,
    publisher: watch::Sender<TimelineSnapshot>,
}

impl Session {
    pub fn new(config: SessionConfig, checkpoints: Arc<CheckpointStore>) -> Self {
        let timeline = match config.greeting {
            Some(greeting) => Timeline::with_greeting(greeting),
            None => Timeline::new(),
        };
        let (publisher, _) = watch::channel(timeline.snapshot());
        Self {
            id: SessionId::new(),
            endpoint: config.endpoint,
            timeline,
            turn: None,
            turns: 0,
            checkpoints,
            publisher,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Phase of the current (or most recent) turn; `composing` before the first.
    pub fn phase(&self) -> TurnPhase {
        self.turn
            .as_ref()
            .map_or(TurnPhase::Composing, |t| t.phase)
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        self.timeline.snapshot()
    }

    /// Receive a fresh snapshot after every change to the timeline.
    pub fn subscribe(&self) -> watch::Receiver<TimelineSnapshot> {
        self.publisher.subscribe()
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointStore> {
        &self.checkpoints
    }

    /// Report for the current (or most recent) turn.
    pub fn report(&self) -> Option<TurnReport> {
        self.turn.as_ref().map(TurnReport::from)
    }

    /// composing → submitted. Appends the user message and the assistant
    /// placeholder and builds the request address from the stored checkpoint.
    pub fn begin_turn(&mut self, input: &str) -> Result<TurnStart, SubmitRejected> {
        if input.trim().is_empty() {
            debug!(session_id = %self.id, "ignoring empty input");
            return Err(SubmitRejected::EmptyInput);
        }
        let phase = self.phase();
        if phase.is_active() {
            warn!(session_id = %self.id, %phase, "submission refused while a turn is in progress");
            return Err(SubmitRejected::TurnInProgress { phase });
        }

        self.turns += 1;
        let ctx = self.timeline.begin_turn(input, self.turns);
        debug!(
            session_id = %self.id,
            turn = ctx.turn,
            message_id = %ctx.assistant_id,
            "turn submitted"
        );
        self.turn = Some(ctx);
        self.publish();

        let checkpoint = self.checkpoints.current();
        match self.endpoint.request_url(input, checkpoint.as_ref()) {
            Ok(url) => {
                info!(
                    session_id = %self.id,
                    turn = self.turns,
                    resumed = checkpoint.is_some(),
                    "opening event channel"
                );
                Ok(TurnStart::Connect(url))
            }
            Err(failure) => {
                self.setup_failed(failure.clone());
                Ok(TurnStart::Failed(failure))
            }
        }
    }

    /// submitted → streaming.
    pub fn channel_opened(&mut self) {
        if let Some(ctx) = self.turn.as_mut() {
            if ctx.mark_streaming() {
                debug!(session_id = %self.id, turn = ctx.turn, "turn streaming");
            }
        }
    }

    /// Decode one raw payload and fold it into the timeline.
    ///
    /// Returns [`Reduction::Finished`] once the end event lands; the caller
    /// should close the channel then.
    pub fn handle_payload(&mut self, raw: &str) -> Reduction {
        let Some(ctx) = self.turn.as_mut() else {
            return Reduction::Ignored;
        };
        if !ctx.accepts_events() {
            debug!(session_id = %self.id, phase = %ctx.phase, "payload outside streaming turn");
            return Reduction::Ignored;
        }

        let event = match StreamEvent::decode(raw) {
            Ok(event) => event,
            Err(failure) => {
                warn!(
                    session_id = %self.id,
                    turn = ctx.turn,
                    error_kind = failure.error_kind(),
                    error = %failure,
                    raw_preview = %truncate_str(raw, RAW_PREVIEW_CHARS),
                    "discarding undecodable payload"
                );
                return self.timeline.absorb(ctx, &failure);
            }
        };

        if let StreamEvent::SearchError { error } = &event {
            info!(session_id = %self.id, turn = ctx.turn, error = %error, "search failed upstream");
        }
        let tag = event.tag();
        let reduction = self.timeline.reduce(ctx, event);

        match &reduction {
            Reduction::Checkpoint(token) => {
                self.checkpoints.store(token.clone());
                debug!(session_id = %self.id, "checkpoint stored");
            }
            Reduction::Rejected(err) => {
                warn!(session_id = %self.id, tag, error = %err, "activity transition rejected");
            }
            Reduction::Finished => {
                info!(
                    session_id = %self.id,
                    turn = self.turns,
                    "turn finalized"
                );
            }
            Reduction::Applied | Reduction::Discarded | Reduction::Ignored => {}
        }
        if reduction.changed_timeline() {
            self.publish();
        }
        reduction
    }

    /// submitted|streaming → failed on a channel error.
    pub fn channel_failed(&mut self, err: ChannelError) {
        let Some(ctx) = self.turn.as_mut() else {
            return;
        };
        if ctx.phase.is_terminal() {
            debug!(session_id = %self.id, error = %err, "channel error after turn ended");
            return;
        }
        error!(
            session_id = %self.id,
            turn = ctx.turn,
            error_kind = err.error_kind(),
            error = %err,
            "event channel failed"
        );
        if !self.timeline.fail_turn(ctx, CHANNEL_FAILURE_NOTICE) {
            warn!(session_id = %self.id, turn = ctx.turn, "keeping partial answer after channel failure");
        }
        self.publish();
    }

    /// submitted → failed when the channel could not be constructed.
    pub fn setup_failed(&mut self, failure: SetupFailure) {
        let Some(ctx) = self.turn.as_mut() else {
            return;
        };
        if ctx.phase.is_terminal() {
            return;
        }
        error!(
            session_id = %self.id,
            turn = ctx.turn,
            error = %failure,
            "event channel setup failed"
        );
        self.timeline.fail_turn(ctx, SETUP_FAILURE_NOTICE);
        self.publish();
    }

    /// Run one turn to completion: submit, open, pump every payload, close.
    ///
    /// Channel errors end the turn; nothing is retried. A channel that ends
    /// without an `end` event counts as [`ChannelError::Closed`].
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn run_turn<O>(&mut self, opener: &O, input: &str) -> Result<TurnReport, SubmitRejected>
    where
        O: ChannelOpener + ?Sized,
    {
        let address = match self.begin_turn(input)? {
            TurnStart::Connect(address) => address,
            TurnStart::Failed(_) => return Ok(self.report().unwrap_or_default()),
        };

        let mut channel = match opener.open(&address).await {
            Ok(channel) => channel,
            Err(OpenError::Setup(failure)) => {
                self.setup_failed(failure);
                return Ok(self.report().unwrap_or_default());
            }
            Err(OpenError::Channel(err)) => {
                self.channel_failed(err);
                return Ok(self.report().unwrap_or_default());
            }
        };
        self.channel_opened();

        while let Some(item) = channel.next().await {
            match item {
                Ok(raw) => {
                    if matches!(self.handle_payload(&raw), Reduction::Finished) {
                        break;
                    }
                }
                Err(err) => {
                    self.channel_failed(err);
                    break;
                }
            }
        }
        if self.phase().is_active() {
            self.channel_failed(ChannelError::Closed);
        }
        drop(channel);

        Ok(self.report().unwrap_or_default())
    }

    fn publish(&self) {
        self.publisher.send_replace(self.timeline.snapshot());
    }
}
