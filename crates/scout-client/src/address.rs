use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use scout_core::checkpoint::CheckpointToken;
use scout_core::errors::SetupFailure;

/// Query parameter that carries the checkpoint token to the backend.
pub const CHECKPOINT_PARAM: &str = "checkpoint_id";

/// Characters left bare in the checkpoint value: the unreserved set of a URI
/// component, so a space becomes `%20` rather than `+`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

/// Validated backend location. Builds one request address per turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
    stream_path: Vec<String>,
}

impl Endpoint {
    pub fn parse(base_url: &str, stream_path: &str) -> Result<Self, SetupFailure> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| SetupFailure::InvalidEndpoint(format!("{base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SetupFailure::InvalidEndpoint(format!(
                "{base_url}: unsupported scheme `{}`",
                base.scheme()
            )));
        }
        if base.cannot_be_a_base() {
            return Err(SetupFailure::InvalidEndpoint(format!(
                "{base_url}: cannot carry a path"
            )));
        }
        let stream_path = stream_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self { base, stream_path })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `{base}/{stream_path}/{input}` with `input` percent-encoded as a single
    /// path segment, plus `?checkpoint_id=` when a non-empty token is given.
    pub fn request_url(
        &self,
        input: &str,
        checkpoint: Option<&CheckpointToken>,
    ) -> Result<Url, SetupFailure> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                SetupFailure::InvalidEndpoint(format!("{}: cannot carry a path", self.base))
            })?;
            segments.pop_if_empty();
            segments.extend(&self.stream_path);
            segments.push(input);
        }
        if let Some(token) = checkpoint.filter(|t| !t.is_empty()) {
            let value = utf8_percent_encode(token.as_str(), COMPONENT);
            url.set_query(Some(&format!("{CHECKPOINT_PARAM}={value}")));
        }
        Ok(url)
    }
}
