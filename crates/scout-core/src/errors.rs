use crate::turn::TurnPhase;

/// A raw payload that could not be turned into a [`StreamEvent`](crate::events::StreamEvent).
/// Always non-fatal: the payload is logged and dropped, the turn continues.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("payload is not valid JSON: {0}")]
    NotJson(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no string `type` field")]
    MissingTag,
    #[error("unrecognized event type `{0}`")]
    UnknownTag(String),
    #[error("malformed `{tag}` event: {reason}")]
    MalformedPayload { tag: &'static str, reason: String },
    /// The string-encoded `urls` field of `search_results` failed its nested parse.
    #[error("malformed search results: {0}")]
    MalformedResults(String),
}

impl DecodeFailure {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotJson(_) => "not_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingTag => "missing_tag",
            Self::UnknownTag(_) => "unknown_tag",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::MalformedResults(_) => "malformed_results",
        }
    }
}

/// Failure reported by an open channel. Fatal to the current turn.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected content type `{0}`")]
    ContentType(String),
    #[error("stream interrupted: {0}")]
    Interrupted(String),
    #[error("stream closed before the end event")]
    Closed,
}

impl ChannelError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Status { .. } => "status",
            Self::ContentType(_) => "content_type",
            Self::Interrupted(_) => "interrupted",
            Self::Closed => "closed",
        }
    }
}

/// The channel could not be constructed at all.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetupFailure {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to build client: {0}")]
    Client(String),
}

/// A submission that was refused before any turn state changed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("input is empty")]
    EmptyInput,
    #[error("a turn is already {phase}")]
    TurnInProgress { phase: TurnPhase },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failure_kinds() {
        assert_eq!(DecodeFailure::MissingTag.error_kind(), "missing_tag");
        assert_eq!(DecodeFailure::UnknownTag("x".into()).error_kind(), "unknown_tag");
        assert_eq!(
            DecodeFailure::MalformedResults("eof".into()).error_kind(),
            "malformed_results"
        );
    }

    #[test]
    fn decode_failure_display() {
        let err = DecodeFailure::MalformedPayload {
            tag: "content",
            reason: "missing field `content`".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed `content` event: missing field `content`"
        );
    }

    #[test]
    fn channel_error_kinds() {
        assert_eq!(ChannelError::Closed.error_kind(), "closed");
        let err = ChannelError::Status { status: 502, body: "bad gateway".into() };
        assert_eq!(err.error_kind(), "status");
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn submit_rejected_names_phase() {
        let err = SubmitRejected::TurnInProgress { phase: TurnPhase::Streaming };
        assert_eq!(err.to_string(), "a turn is already streaming");
    }
}
