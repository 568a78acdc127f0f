use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Opaque continuation token issued by the backend. Never inspected.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointToken(String);

impl CheckpointToken {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CheckpointToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-scoped holder of the latest checkpoint token.
///
/// Created with the session and shared with its controller. Each store
/// overwrites the previous token; there is no way to clear it, so a token
/// survives failed turns until the session is dropped.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    token: RwLock<Option<CheckpointToken>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored token, returning the one it overwrote.
    pub fn store(&self, token: CheckpointToken) -> Option<CheckpointToken> {
        self.token.write().replace(token)
    }

    pub fn current(&self) -> Option<CheckpointToken> {
        self.token.read().clone()
    }
}
