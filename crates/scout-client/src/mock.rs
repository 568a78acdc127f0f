use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use scout_core::errors::ChannelError;

use crate::channel::{ChannelOpener, EventChannel, OpenError};

/// Pre-programmed channel for deterministic tests without a backend.
pub enum ScriptedChannel {
    /// Yield these items, then end the stream.
    Items(Vec<Result<String, ChannelError>>),
    /// Refuse to open.
    Refuse(OpenError),
    /// Yield whatever the paired sender pushes, until it is dropped.
    Live(mpsc::Receiver<Result<String, ChannelError>>),
}

impl ScriptedChannel {
    /// Convenience: a channel that delivers these raw payloads in order.
    pub fn payloads<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Items(payloads.into_iter().map(|p| Ok(p.into())).collect())
    }

    /// Convenience: deliver `payloads`, then fail with `error`.
    pub fn payloads_then_error<I, S>(payloads: I, error: ChannelError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<_> = payloads.into_iter().map(|p| Ok(p.into())).collect();
        items.push(Err(error));
        Self::Items(items)
    }

    /// A channel fed by the returned sender.
    pub fn live(buffer: usize) -> (Self, mpsc::Sender<Result<String, ChannelError>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::Live(rx), tx)
    }
}

/// Opener that hands out scripted channels in sequence and records every
/// address it was asked to open.
pub struct ScriptedChannelOpener {
    channels: Mutex<VecDeque<ScriptedChannel>>,
    opened: Mutex<Vec<Url>>,
}

impl ScriptedChannelOpener {
    pub fn new(channels: Vec<ScriptedChannel>) -> Self {
        Self {
            channels: Mutex::new(channels.into()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }
}

#[async_trait]
impl ChannelOpener for ScriptedChannelOpener {
    async fn open(&self, address: &Url) -> Result<EventChannel, OpenError> {
        let idx = {
            let mut opened = self.opened.lock();
            opened.push(address.clone());
            opened.len() - 1
        };

        let Some(channel) = self.channels.lock().pop_front() else {
            return Err(ChannelError::Connect(format!(
                "ScriptedChannelOpener: no channel configured for open {idx}"
            ))
            .into());
        };

        match channel {
            ScriptedChannel::Items(items) => Ok(Box::pin(stream::iter(items))),
            ScriptedChannel::Refuse(err) => Err(err),
            ScriptedChannel::Live(rx) => Ok(Box::pin(ReceiverStream::new(rx))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use scout_core::errors::SetupFailure;

    fn address(q: &str) -> Url {
        Url::parse(&format!("http://localhost:8000/chat_stream/{q}")).unwrap()
    }

    #[tokio::test]
    async fn hands_out_channels_in_order() {
        let opener = ScriptedChannelOpener::new(vec![
            ScriptedChannel::payloads(["a"]),
            ScriptedChannel::Refuse(SetupFailure::Client("boom".into()).into()),
        ]);

        let first: Vec<_> = opener.open(&address("1")).await.unwrap().collect().await;
        assert_eq!(first, vec![Ok("a".to_string())]);

        let second = opener.open(&address("2")).await.err().unwrap();
        assert!(matches!(second, OpenError::Setup(_)));

        assert_eq!(opener.open_count(), 2);
        assert_eq!(opener.opened()[1], address("2"));
    }

    #[tokio::test]
    async fn exhausted_script_is_connect_error() {
        let opener = ScriptedChannelOpener::new(vec![]);
        let err = opener.open(&address("x")).await.err().unwrap();
        assert!(matches!(err, OpenError::Channel(ChannelError::Connect(_))));
    }

    #[tokio::test]
    async fn live_channel_follows_sender() {
        let (channel, tx) = ScriptedChannel::live(4);
        let opener = ScriptedChannelOpener::new(vec![channel]);
        let mut stream = opener.open(&address("live")).await.unwrap();

        tx.send(Ok("one".into())).await.unwrap();
        assert_eq!(stream.next().await, Some(Ok("one".to_string())));
        drop(tx);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn payloads_then_error_appends_failure() {
        let opener = ScriptedChannelOpener::new(vec![ScriptedChannel::payloads_then_error(
            ["x"],
            ChannelError::Interrupted("eof".into()),
        )]);
        let items: Vec<_> = opener.open(&address("e")).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
