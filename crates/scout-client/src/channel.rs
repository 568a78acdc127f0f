use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use scout_core::errors::{ChannelError, SetupFailure};

use crate::sse;

/// A one-way stream of raw payloads for one turn. Dropping it closes the channel.
pub type EventChannel = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

/// Why [`ChannelOpener::open`] produced no channel.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    /// The channel could not be constructed at all.
    #[error(transparent)]
    Setup(#[from] SetupFailure),
    /// The channel was constructed but failed before delivering anything.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Opens the per-turn event channel.
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    async fn open(&self, address: &Url) -> Result<EventChannel, OpenError>;
}

/// `text/event-stream` over HTTP GET.
pub struct HttpChannelOpener {
    client: Client,
}

impl HttpChannelOpener {
    pub fn new(connect_timeout: Duration) -> Result<Self, SetupFailure> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SetupFailure::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChannelOpener for HttpChannelOpener {
    #[instrument(skip(self), fields(address = %address))]
    async fn open(&self, address: &Url) -> Result<EventChannel, OpenError> {
        let resp = self
            .client
            .get(address.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    OpenError::Setup(SetupFailure::Client(e.to_string()))
                } else {
                    OpenError::Channel(ChannelError::Connect(e.to_string()))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return Err(ChannelError::ContentType(content_type).into());
        }

        debug!(status = status.as_u16(), "event channel open");
        Ok(Box::pin(sse::payload_stream(Box::pin(resp.bytes_stream()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
    }

    #[tokio::test]
    async fn streams_payloads_then_closes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat_stream/hello"))
            .and(query_param("checkpoint_id", "abc"))
            .and(header("accept", "text/event-stream"))
            .respond_with(sse_response(
                "data: {\"type\":\"content\",\"content\":\"hi\"}\n\ndata: {\"type\":\"end\"}\n\n",
            ))
            .mount(&server)
            .await;

        let opener = HttpChannelOpener::new(Duration::from_secs(5)).unwrap();
        let address = Url::parse(&format!("{}/chat_stream/hello?checkpoint_id=abc", server.uri())).unwrap();
        let channel = opener.open(&address).await.unwrap();
        let items: Vec<_> = channel.collect().await;

        assert_eq!(
            items,
            vec![
                Ok(r#"{"type":"content","content":"hi"}"#.to_string()),
                Ok(r#"{"type":"end"}"#.to_string()),
                Err(ChannelError::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let opener = HttpChannelOpener::new(Duration::from_secs(5)).unwrap();
        let address = Url::parse(&format!("{}/chat_stream/q", server.uri())).unwrap();
        let err = opener.open(&address).await.err().unwrap();

        assert_eq!(
            err,
            OpenError::Channel(ChannelError::Status {
                status: 503,
                body: "overloaded".into()
            })
        );
    }

    #[tokio::test]
    async fn wrong_content_type_is_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
            )
            .mount(&server)
            .await;

        let opener = HttpChannelOpener::new(Duration::from_secs(5)).unwrap();
        let address = Url::parse(&format!("{}/chat_stream/q", server.uri())).unwrap();
        let err = opener.open(&address).await.err().unwrap();
        assert!(matches!(err, OpenError::Channel(ChannelError::ContentType(ct)) if ct == "application/json"));
    }

    #[tokio::test]
    async fn unreachable_host_is_connect_error() {
        let opener = HttpChannelOpener::new(Duration::from_secs(1)).unwrap();
        let address = Url::parse("http://127.0.0.1:9/chat_stream/q").unwrap();
        let err = opener.open(&address).await.err().unwrap();
        assert!(matches!(err, OpenError::Channel(ChannelError::Connect(_))), "got {err:?}");
    }
}
