use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::checkpoint::CheckpointToken;
use crate::errors::DecodeFailure;

/// One decoded payload from the backend stream.
///
/// Every raw payload is a JSON object tagged by `type`. Anything outside
/// this closed set is rejected by [`StreamEvent::decode`] and never reaches
/// the reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Checkpoint { checkpoint_id: CheckpointToken },
    Content { content: String },
    SearchStart { query: String },
    SearchResults { urls: Vec<String> },
    SearchError { error: String },
    End,
}

impl StreamEvent {
    /// Decode one raw payload. Pure; the same input always yields the same output.
    pub fn decode(raw: &str) -> Result<Self, DecodeFailure> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| DecodeFailure::NotJson(e.to_string()))?;
        if !value.is_object() {
            return Err(DecodeFailure::NotAnObject);
        }
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeFailure::MissingTag)?
            .to_owned();

        match tag.as_str() {
            "checkpoint" => {
                let f: CheckpointFields = fields("checkpoint", value)?;
                Ok(Self::Checkpoint {
                    checkpoint_id: CheckpointToken::new(f.checkpoint_id),
                })
            }
            "content" => {
                let f: ContentFields = fields("content", value)?;
                Ok(Self::Content { content: f.content })
            }
            "search_start" => {
                let f: SearchStartFields = fields("search_start", value)?;
                Ok(Self::SearchStart { query: f.query })
            }
            "search_results" => {
                let f: SearchResultsFields = fields("search_results", value)?;
                Ok(Self::SearchResults {
                    urls: f.urls.normalize()?,
                })
            }
            "search_error" => {
                let f: SearchErrorFields = fields("search_error", value)?;
                Ok(Self::SearchError { error: f.error })
            }
            "end" => Ok(Self::End),
            _ => Err(DecodeFailure::UnknownTag(tag)),
        }
    }

    /// Wire tag this event was decoded from.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Checkpoint { .. } => "checkpoint",
            Self::Content { .. } => "content",
            Self::SearchStart { .. } => "search_start",
            Self::SearchResults { .. } => "search_results",
            Self::SearchError { .. } => "search_error",
            Self::End => "end",
        }
    }
}

fn fields<T: DeserializeOwned>(tag: &'static str, value: Value) -> Result<T, DecodeFailure> {
    serde_json::from_value(value).map_err(|e| DecodeFailure::MalformedPayload {
        tag,
        reason: e.to_string(),
    })
}

// --- Per-tag field shapes ---

#[derive(Deserialize)]
struct CheckpointFields {
    checkpoint_id: String,
}

#[derive(Deserialize)]
struct ContentFields {
    content: String,
}

#[derive(Deserialize)]
struct SearchStartFields {
    query: String,
}

#[derive(Deserialize)]
struct SearchResultsFields {
    urls: UrlsField,
}

#[derive(Deserialize)]
struct SearchErrorFields {
    error: String,
}

/// `search_results.urls` arrives either as an array or as a string holding
/// a JSON-encoded array.
#[derive(Deserialize)]
#[serde(untagged)]
enum UrlsField {
    List(Vec<String>),
    Encoded(String),
}

impl UrlsField {
    fn normalize(self) -> Result<Vec<String>, DecodeFailure> {
        match self {
            Self::List(urls) => Ok(urls),
            Self::Encoded(raw) => serde_json::from_str(&raw)
                .map_err(|e| DecodeFailure::MalformedResults(e.to_string())),
        }
    }
}
